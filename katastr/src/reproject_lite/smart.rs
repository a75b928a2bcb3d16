//! Reprojection intelligente : reproject_lite en priorité, fallback sur proj
//!
//! Utilise automatiquement la meilleure option disponible.

use geo::Geometry;

use super::ReprojectorLite;
use crate::error::Result;

/// Reprojection intelligente
///
/// Essaie d'abord reproject_lite (pure Rust), puis fallback sur proj si disponible.
#[derive(Debug)]
pub enum SmartReprojector {
    /// Reprojection légère (pure Rust)
    Lite(ReprojectorLite),
    /// Reprojection via PROJ (si feature activée)
    #[cfg(feature = "reproject")]
    Proj(crate::export::reproject::Reprojector),
    /// Pas de reprojection (source == cible)
    Identity,
}

impl SmartReprojector {
    /// Crée un nouveau reprojector
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        if source_epsg == target_epsg {
            return Ok(Self::Identity);
        }

        if ReprojectorLite::is_supported(source_epsg, target_epsg) {
            return Ok(Self::Lite(ReprojectorLite::new(source_epsg, target_epsg)?));
        }

        #[cfg(feature = "reproject")]
        {
            let proj = crate::export::reproject::Reprojector::new(source_epsg, target_epsg)?;
            Ok(Self::Proj(proj))
        }

        #[cfg(not(feature = "reproject"))]
        Err(crate::error::KatastrError::Reprojection(format!(
            "EPSG:{} → EPSG:{} not supported without PROJ (supported: 5514 ↔ 4326). \
             Build with: cargo build --features reproject",
            source_epsg, target_epsg
        )))
    }

    /// Transforme une géométrie
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
        match self {
            Self::Identity => Ok(geom.clone()),
            Self::Lite(lite) => lite.transform_geometry(geom),
            #[cfg(feature = "reproject")]
            Self::Proj(proj) => proj.transform_geometry(geom),
        }
    }

    /// Retourne une description du reprojector utilisé
    pub fn description(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Lite(_) => "reproject_lite (pure Rust Krovak + Helmert)",
            #[cfg(feature = "reproject")]
            Self::Proj(_) => "proj (PROJ library)",
        }
    }
}
