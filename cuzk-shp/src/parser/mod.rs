//! Parsers pour les fichiers d'une couche shapefile

pub mod cpg;
pub mod dbf;
pub mod prj;
pub mod shp;
