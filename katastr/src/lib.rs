//! # katastr
//!
//! Parcelles du katastr nemovitostí (ČÚZK): téléchargement par katastrální
//! území, jointure avec les číselníky, stylisation et export.
//!
//! ## Features
//!
//! - Annuaire des unités et číselníky druhů pozemků / způsobů využití
//! - Jointure `PARCELY_KN_P` ⋈ `PARCELY_KN_DEF` avec compteurs de lignes écartées
//! - Reprojection S-JTSK ↔ WGS 84 en Rust pur (PROJ en option)
//! - Export CSV, GeoJSON et GeoPackage
//! - Cache mémoire avec durée de validité
//!
//! ## Usage CLI
//!
//! ```bash
//! katastr municipalities --filter praha
//! katastr units -m "Praha (500054)"
//! katastr show -m "Praha (500054)" -u "Praha 1" --attribute land-use
//! katastr export -m "Praha (500054)" -u "Praha 1" --format gpkg --crs wgs84
//! ```

pub mod cache;
pub mod config;
pub mod directory;
pub mod error;
pub mod export;
pub mod map;
pub mod parcels;
pub mod pipeline;
pub mod report;
pub mod reproject_lite;
pub mod selection;
pub mod session;
pub mod source;
pub mod style;
pub mod table;

pub use cache::{CacheKey, CacheService};
pub use config::{Config, FailurePolicy};
pub use directory::{CadastralUnitDirectory, CadastralUnitRecord, CodeDirectory, CodeEntry};
pub use error::{KatastrError, Result};
pub use export::{export_to, ExportFile, ExportFormat, TargetCrs};
pub use map::{LayerGroup, MapLayer, ParcelStyle};
pub use parcels::{join_unit, JoinStats, JoinedUnit, ParcelRecord, NO_LAND_USE};
pub use pipeline::Pipeline;
pub use report::{SelectionReport, SelectionStatus, UnitFailure};
pub use selection::{Progress, UnifiedParcelSet};
pub use session::Session;
pub use source::{CadastreSource, Dataset, HttpSource, UnitLayers};
pub use style::{assign_colors, categorize, DisplayAttribute, Legend, LegendEntry, TAB20};
pub use table::ParcelTable;
