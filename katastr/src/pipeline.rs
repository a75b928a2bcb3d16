//! Pipeline de chargement: číselníky, jointure par unité, ensemble unifié
//!
//! Toutes les étapes coûteuses passent par le [`CacheService`]; les unités
//! sont traitées une par une, dans l'ordre demandé.

use std::sync::Arc;
use std::time::Instant;

use geo::Geometry;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CacheService};
use crate::config::{Config, FailurePolicy};
use crate::directory::{CadastralUnitDirectory, CodeDirectory};
use crate::error::{KatastrError, Result};
use crate::export::{export_to, ExportFile, ExportFormat, TargetCrs};
use crate::parcels::{join_unit, JoinStats, JoinedUnit, ParcelRecord};
use crate::reproject_lite::{SmartReprojector, EPSG_SJTSK, EPSG_WGS84};
use crate::report::SelectionReport;
use crate::selection::{Progress, UnifiedParcelSet};
use crate::source::{CadastreSource, Dataset};

/// Pipeline paramétré par sa source de données
#[derive(Debug)]
pub struct Pipeline<S> {
    source: S,
    cache: Arc<CacheService>,
    config: Config,
}

impl<S: CadastreSource> Pipeline<S> {
    /// Pipeline avec un cache neuf (TTL et capacité de la configuration)
    pub fn new(source: S, config: Config) -> Self {
        let cache = Arc::new(CacheService::new(config.cache_ttl(), config.cache_capacity()));
        Self::with_cache(source, config, cache)
    }

    /// Pipeline partageant un cache existant
    pub fn with_cache(source: S, config: Config, cache: Arc<CacheService>) -> Self {
        Self {
            source,
            cache,
            config,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> &Arc<CacheService> {
        &self.cache
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Annuaire SC_SEZNAMKUKRA_DOTAZ
    pub async fn load_cadastral_unit_directory(&self) -> Result<Arc<CadastralUnitDirectory>> {
        let dataset = Dataset::UnitDirectory;
        self.cache
            .get_or_fetch(CacheKey::new("load_directory", dataset.name()), || async move {
                let layer = self.source.directory_layer(dataset).await?;
                CadastralUnitDirectory::from_layer(&layer)
            })
            .await
    }

    /// Číselník SC_D_POZEMKU
    pub async fn load_land_type_directory(&self) -> Result<Arc<CodeDirectory>> {
        self.load_code_directory(Dataset::LandTypes).await
    }

    /// Číselník SC_ZP_VYUZITI_POZ
    pub async fn load_land_use_directory(&self) -> Result<Arc<CodeDirectory>> {
        self.load_code_directory(Dataset::LandUses).await
    }

    async fn load_code_directory(&self, dataset: Dataset) -> Result<Arc<CodeDirectory>> {
        self.cache
            .get_or_fetch(CacheKey::new("load_directory", dataset.name()), || async move {
                let layer = self.source.directory_layer(dataset).await?;
                CodeDirectory::from_layer(dataset.name(), &layer)
            })
            .await
    }

    /// Télécharge et joint les parcelles d'une unité (mémoïsé par code)
    pub async fn fetch_and_join(&self, unit_code: i64) -> Result<Arc<JoinedUnit>> {
        self.cache
            .get_or_fetch(CacheKey::new("fetch_and_join", unit_code), || async move {
                let land_types = self.load_land_type_directory().await?;
                let land_uses = self.load_land_use_directory().await?;
                let layers = self.source.unit_layers(unit_code).await?;
                join_unit(unit_code, &layers, &land_types, &land_uses)
            })
            .await
    }

    /// Concatène les unités demandées, dans l'ordre
    ///
    /// `progress` est appelé après chaque unité traitée. Une sélection vide
    /// ne déclenche aucun téléchargement.
    pub async fn build_unified_set(
        &self,
        unit_codes: &[i64],
        mut progress: impl FnMut(Progress),
    ) -> Result<UnifiedParcelSet> {
        if unit_codes.is_empty() {
            info!("Empty selection, nothing to fetch");
            return Ok(UnifiedParcelSet::empty());
        }

        let started = Instant::now();
        let mut report = SelectionReport::new(unit_codes);
        let total = unit_codes.len();

        if total > self.config.soft_unit_limit {
            let message = format!(
                "{} units selected (more than {}); loading may be slow",
                total, self.config.soft_unit_limit
            );
            warn!(units = total, limit = self.config.soft_unit_limit, "Large selection");
            report.record_warning(message);
        }

        info!(units = total, policy = ?self.config.failure_policy, "Building parcel set");

        let directory = self.load_cadastral_unit_directory().await?;
        let reprojector = SmartReprojector::new(EPSG_SJTSK, EPSG_WGS84)?;
        debug!(reprojector = reprojector.description(), "Display reprojection");

        let mut set = UnifiedParcelSet::default();

        for (i, &unit_code) in unit_codes.iter().enumerate() {
            match self.load_unit(unit_code, &directory, &reprojector).await {
                Ok((parcels, display, stats)) => {
                    report.record_unit(unit_code, stats);
                    set.unit_codes.push(unit_code);
                    set.parcels.extend(parcels);
                    set.display.extend(display);
                }
                Err(err) => match self.config.failure_policy {
                    FailurePolicy::Abort => {
                        warn!(unit = unit_code, error = %err, "Unit failed, aborting selection");
                        return Err(err);
                    }
                    FailurePolicy::Skip => {
                        warn!(unit = unit_code, error = %err, "Unit failed, skipping");
                        report.record_unit_failure(unit_code, &err);
                    }
                },
            }

            let step = Progress {
                completed: i + 1,
                total,
                unit_code,
            };
            info!(
                unit = unit_code,
                completed = step.completed,
                total = step.total,
                "Unit processed"
            );
            progress(step);
        }

        report.set_duration(started.elapsed());
        report.finalize();
        info!(summary = %report.summary(), "Parcel set built");

        set.report = report;
        Ok(set)
    }

    /// Parcelles d'une unité avec le code d'obec et les géométries WGS 84
    async fn load_unit(
        &self,
        unit_code: i64,
        directory: &CadastralUnitDirectory,
        reprojector: &SmartReprojector,
    ) -> Result<(Vec<ParcelRecord>, Vec<Geometry>, JoinStats)> {
        let municipality_code = directory
            .get(unit_code)
            .map(|unit| unit.municipality_code)
            .ok_or(KatastrError::UnknownUnit(unit_code))?;

        let joined = self.fetch_and_join(unit_code).await?;

        let display = joined
            .parcels
            .iter()
            .map(|p| reprojector.transform_geometry(&p.geometry))
            .collect::<Result<Vec<_>>>()?;

        let parcels = joined
            .parcels
            .iter()
            .map(|p| ParcelRecord {
                municipality_code: Some(municipality_code),
                ..p.clone()
            })
            .collect();

        Ok((parcels, display, joined.stats))
    }

    /// Export mémoïsé par (format, CRS, empreinte de l'ensemble)
    pub async fn export(
        &self,
        set: &UnifiedParcelSet,
        format: ExportFormat,
        crs: TargetCrs,
    ) -> Result<Arc<ExportFile>> {
        // Le CRS n'influe pas sur le CSV
        let crs_key = if format.has_geometry() { crs.epsg() } else { 0 };
        let key = CacheKey::new(
            "export",
            format!("{}:{}:{}", format.extension(), crs_key, set.fingerprint()),
        );
        self.cache
            .get_or_fetch(key, || async move {
                export_to(set, format, crs, &self.config.viewer_url)
            })
            .await
    }
}
