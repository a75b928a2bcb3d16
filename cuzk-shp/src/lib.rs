//! # cuzk-shp
//!
//! Lecture des archives shapefile publiées par le ČÚZK (katastr nemovitostí).
//!
//! ## Features
//!
//! - Extraction ZIP en mémoire (archives par katastrální území et číselníky)
//! - Parsing SHP (formes ESRI) et DBF (dBASE III) sans dépendance GDAL
//! - Détection d'encodage `.cpg` / LDID avec `encoding_rs` (cp1250 par défaut)
//! - Types `geo` pour l'interopérabilité avec l'écosystème Rust géospatial
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cuzk_shp::{read_layer, LayerOptions};
//!
//! let bytes = std::fs::read("727024.zip")?;
//! let layer = read_layer(&bytes, "PARCELY_KN_P", &LayerOptions::default())?;
//! println!("{}: {} features", layer.name, layer.len());
//! ```

pub mod archive;
pub mod error;
pub mod parser;
pub mod rings;
pub mod types;

#[cfg(test)]
mod fixtures;

pub use archive::{LayerOptions, ShpArchive};
pub use error::CuzkShpError;
pub use types::{Feature, FieldDescriptor, FieldType, FieldValue, Layer, Projection};

/// Lit une couche nommée depuis une archive ZIP en mémoire
pub fn read_layer(
    archive: &[u8],
    name: &str,
    options: &LayerOptions,
) -> Result<Layer, CuzkShpError> {
    ShpArchive::from_bytes(archive)?.read_layer(name, options)
}

/// Lit la couche unique d'une archive (cas des číselníky: un `.dbf` par archive)
pub fn read_single_layer(archive: &[u8], options: &LayerOptions) -> Result<Layer, CuzkShpError> {
    ShpArchive::from_bytes(archive)?.read_first_layer(options)
}
