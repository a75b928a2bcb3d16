//! Reprojection de géométries avec PROJ
//!
//! Ce module est disponible uniquement avec le feature `reproject`; il sert de
//! repli à `SmartReprojector` pour les couples EPSG hors S-JTSK ↔ WGS84.

use geo::{Coord, Geometry, MapCoords};
use proj::Proj;

use crate::error::{KatastrError, Result};

/// Reprojection de géométries entre deux systèmes de coordonnées
pub struct Reprojector {
    proj: Proj,
    source_epsg: u32,
    target_epsg: u32,
}

impl std::fmt::Debug for Reprojector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reprojector")
            .field("source_epsg", &self.source_epsg)
            .field("target_epsg", &self.target_epsg)
            .finish()
    }
}

impl Reprojector {
    /// Crée un nouveau reprojector entre deux EPSG
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        let source = format!("EPSG:{}", source_epsg);
        let target = format!("EPSG:{}", target_epsg);

        let proj = Proj::new_known_crs(&source, &target, None).map_err(|e| {
            KatastrError::Reprojection(format!(
                "Failed to create projection from {} to {}: {}",
                source, target, e
            ))
        })?;

        Ok(Self {
            proj,
            source_epsg,
            target_epsg,
        })
    }

    pub fn source_epsg(&self) -> u32 {
        self.source_epsg
    }

    pub fn target_epsg(&self) -> u32 {
        self.target_epsg
    }

    /// Transforme une géométrie
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
        if self.source_epsg == self.target_epsg {
            return Ok(geom.clone());
        }
        geom.try_map_coords(|c: Coord| {
            let (x, y) = self
                .proj
                .convert((c.x, c.y))
                .map_err(|e| KatastrError::Reprojection(e.to_string()))?;
            Ok::<_, KatastrError>(Coord { x, y })
        })
    }
}
