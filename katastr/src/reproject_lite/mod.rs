//! Reprojection légère en Rust pur (sans dépendances externes)
//!
//! Supporte les systèmes du katastr ČÚZK :
//! - S-JTSK / Krovak East North (EPSG:5514) - données sources
//! - WGS84 (EPSG:4326) - affichage et export
//!
//! Le changement de datum utilise la transformation de Helmert à 7 paramètres
//! S-JTSK → WGS84 (précision de l'ordre du mètre).

mod ellipsoid;
mod helmert;
mod krovak;
mod smart;

pub use ellipsoid::{Bessel1841, Ellipsoid, WGS84};
pub use helmert::TOWGS84;
pub use krovak::Krovak;
pub use smart::SmartReprojector;

use geo::{Coord, Geometry, MapCoords};

use crate::error::{KatastrError, Result};

pub const EPSG_SJTSK: u32 = 5514;
pub const EPSG_WGS84: u32 = 4326;

/// Reprojection légère S-JTSK ↔ WGS84
#[derive(Debug, Clone, Copy)]
pub struct ReprojectorLite {
    source_epsg: u32,
    target_epsg: u32,
    krovak: Krovak,
}

impl ReprojectorLite {
    /// Crée un nouveau reprojector
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        if !Self::is_supported(source_epsg, target_epsg) {
            return Err(KatastrError::Reprojection(format!(
                "EPSG:{} → EPSG:{} not supported. Supported pairs: 5514 ↔ 4326",
                source_epsg, target_epsg
            )));
        }

        Ok(Self {
            source_epsg,
            target_epsg,
            krovak: Krovak::new(),
        })
    }

    /// Vérifie si la reprojection est supportée
    pub fn is_supported(source: u32, target: u32) -> bool {
        matches!(
            (source, target),
            (EPSG_SJTSK, EPSG_WGS84) | (EPSG_WGS84, EPSG_SJTSK)
        )
    }

    pub fn source_epsg(&self) -> u32 {
        self.source_epsg
    }

    pub fn target_epsg(&self) -> u32 {
        self.target_epsg
    }

    /// Transforme un point (x, y) de la source vers la cible
    pub fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let (tx, ty) = if self.source_epsg == EPSG_SJTSK {
            // Křovák inverse sur Bessel, puis datum → WGS84
            let (lon, lat) = self.krovak.inverse(x, y);
            let (lon, lat) = helmert::bessel_to_wgs84(lon, lat);
            (lon.to_degrees(), lat.to_degrees())
        } else {
            if !(-180.0..=180.0).contains(&x) || !(-90.0..=90.0).contains(&y) {
                return Err(KatastrError::Reprojection(format!(
                    "coordinate ({}, {}) outside geographic range",
                    x, y
                )));
            }
            let (lon, lat) = helmert::wgs84_to_bessel(x.to_radians(), y.to_radians());
            self.krovak.forward(lon, lat)
        };

        if !tx.is_finite() || !ty.is_finite() {
            return Err(KatastrError::Reprojection(format!(
                "coordinate ({}, {}) cannot be projected from EPSG:{} to EPSG:{}",
                x, y, self.source_epsg, self.target_epsg
            )));
        }
        Ok((tx, ty))
    }

    /// Transforme une géométrie
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
        geom.try_map_coords(|c: Coord| {
            let (x, y) = self.transform_point(c.x, c.y)?;
            Ok::<_, KatastrError>(Coord { x, y })
        })
    }
}
