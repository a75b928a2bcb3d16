//! Exports téléchargeables (CSV, GeoJSON, GeoPackage)
//!
//! Le CSV est la table d'aperçu sans géométrie; GeoJSON et GeoPackage sont
//! reprojetés dans le système cible et portent sa définition. Pour une même
//! entrée la sortie est identique octet pour octet.

pub mod csv;
pub mod geojson;
pub mod gpkg;
#[cfg(feature = "reproject")]
pub mod reproject;

#[cfg(feature = "reproject")]
pub use reproject::Reprojector;

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use geo::orient::{Direction, Orient};
use geo::Geometry;

use crate::error::{KatastrError, Result};
use crate::reproject_lite::{SmartReprojector, EPSG_SJTSK, EPSG_WGS84};
use crate::selection::UnifiedParcelSet;
use crate::table::ParcelTable;

/// Nom de base des fichiers téléchargés
pub const FILE_STEM: &str = "parcely_kn";

/// Format d'export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Csv,
    GeoJson,
    GeoPackage,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [Self::Csv, Self::GeoJson, Self::GeoPackage];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Csv => "CSV",
            Self::GeoJson => "GeoJSON",
            Self::GeoPackage => "GeoPackage",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => ".csv",
            Self::GeoJson => ".geojson",
            Self::GeoPackage => ".gpkg",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::GeoJson => "application/geo+json",
            Self::GeoPackage => "application/geopackage+sqlite3",
        }
    }

    /// `parcely_kn.csv`, `parcely_kn.geojson`, ...
    pub fn file_name(&self) -> String {
        format!("{}{}", FILE_STEM, self.extension())
    }

    /// Vrai si le format contient les géométries
    pub fn has_geometry(&self) -> bool {
        !matches!(self, Self::Csv)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExportFormat {
    type Err = KatastrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "geojson" | "json" => Ok(Self::GeoJson),
            "gpkg" | "geopackage" => Ok(Self::GeoPackage),
            other => Err(KatastrError::Config(format!(
                "Unknown export format: {}. Use: csv, geojson, gpkg",
                other
            ))),
        }
    }
}

/// Système de coordonnées cible
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TargetCrs {
    /// S-JTSK / Krovak East North
    #[default]
    Sjtsk,
    /// WGS 84 géographique
    Wgs84,
}

impl TargetCrs {
    pub fn epsg(&self) -> u32 {
        match self {
            Self::Sjtsk => EPSG_SJTSK,
            Self::Wgs84 => EPSG_WGS84,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Sjtsk => "S-JTSK",
            Self::Wgs84 => "WGS 84",
        }
    }
}

impl fmt::Display for TargetCrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (EPSG:{})", self.label(), self.epsg())
    }
}

impl FromStr for TargetCrs {
    type Err = KatastrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace(' ', "").as_str() {
            "s-jtsk" | "sjtsk" | "5514" | "epsg:5514" => Ok(Self::Sjtsk),
            "wgs84" | "wgs-84" | "4326" | "epsg:4326" => Ok(Self::Wgs84),
            other => Err(KatastrError::Config(format!(
                "Unknown CRS: {}. Use: s-jtsk, wgs84",
                other
            ))),
        }
    }
}

/// Fichier prêt au téléchargement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub name: String,
    pub mime: &'static str,
    pub bytes: Bytes,
}

impl ExportFile {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Encode l'ensemble dans le format et le système demandés
///
/// `crs` est ignoré pour le CSV, qui ne contient aucune géométrie.
pub fn export_to(
    set: &UnifiedParcelSet,
    format: ExportFormat,
    crs: TargetCrs,
    viewer_url: &str,
) -> Result<ExportFile> {
    let bytes = match format {
        ExportFormat::Csv => {
            let table = ParcelTable::overview(&set.parcels, viewer_url);
            csv::to_csv_bytes(&table)?
        }
        ExportFormat::GeoJson => {
            let table = ParcelTable::for_export(&set.parcels, viewer_url);
            let geometries = target_geometries(set, crs)?;
            geojson::to_geojson_bytes(&table, &geometries, crs)?
        }
        ExportFormat::GeoPackage => {
            let table = ParcelTable::for_export(&set.parcels, viewer_url);
            let geometries = target_geometries(set, crs)?;
            gpkg::to_gpkg_bytes(&table, &geometries, crs)?
        }
    };

    tracing::info!(
        format = format.name(),
        crs = %crs,
        parcels = set.len(),
        bytes = bytes.len(),
        "Export encoded"
    );

    Ok(ExportFile {
        name: format.file_name(),
        mime: format.mime(),
        bytes: Bytes::from(bytes),
    })
}

/// Géométries de l'ensemble dans le système cible, orientées selon RFC 7946
///
/// Les géométries d'affichage sont déjà en WGS 84; elles ne sont recalculées
/// que si elles manquent.
fn target_geometries(set: &UnifiedParcelSet, crs: TargetCrs) -> Result<Vec<Geometry>> {
    let geometries = match crs {
        TargetCrs::Sjtsk => set.parcels.iter().map(|p| p.geometry.clone()).collect(),
        TargetCrs::Wgs84 if set.display.len() == set.parcels.len() => set.display.clone(),
        TargetCrs::Wgs84 => {
            let reprojector = SmartReprojector::new(EPSG_SJTSK, crs.epsg())?;
            set.parcels
                .iter()
                .map(|p| reprojector.transform_geometry(&p.geometry))
                .collect::<Result<Vec<_>>>()?
        }
    };
    Ok(geometries.into_iter().map(orient).collect())
}

/// Extérieurs anti-horaires, trous horaires (les anneaux ESRI sont inversés)
fn orient(geometry: Geometry) -> Geometry {
    match geometry {
        Geometry::Polygon(p) => Geometry::Polygon(p.orient(Direction::Default)),
        Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(mp.orient(Direction::Default)),
        other => other,
    }
}
