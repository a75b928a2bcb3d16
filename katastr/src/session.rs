//! État d'une session interactive et ses gestionnaires d'événements
//!
//! Chaque interaction (choix des obce, des unités, de l'attribut, export)
//! est un appel explicite; rien n'est recalculé implicitement.

use std::sync::Arc;

use tracing::info;

use crate::directory::CadastralUnitDirectory;
use crate::error::Result;
use crate::export::{ExportFile, ExportFormat, TargetCrs};
use crate::map::MapLayer;
use crate::pipeline::Pipeline;
use crate::selection::{Progress, UnifiedParcelSet};
use crate::source::CadastreSource;
use crate::style::{DisplayAttribute, Legend};
use crate::table::ParcelTable;

#[derive(Debug)]
pub struct Session<S> {
    pipeline: Pipeline<S>,
    directory: Option<Arc<CadastralUnitDirectory>>,
    municipalities: Vec<String>,
    unit_names: Vec<String>,
    attribute: DisplayAttribute,
    set: Option<UnifiedParcelSet>,
}

impl<S: CadastreSource> Session<S> {
    pub fn new(pipeline: Pipeline<S>) -> Self {
        Self {
            pipeline,
            directory: None,
            municipalities: Vec::new(),
            unit_names: Vec::new(),
            attribute: DisplayAttribute::default(),
            set: None,
        }
    }

    pub fn pipeline(&self) -> &Pipeline<S> {
        &self.pipeline
    }

    /// Charge l'annuaire et retourne les libellés d'obce
    pub async fn load_directory(&mut self) -> Result<Vec<String>> {
        let directory = self.pipeline.load_cadastral_unit_directory().await?;
        let labels = directory.municipality_labels();
        info!(municipalities = labels.len(), "Directory loaded");
        self.directory = Some(directory);
        Ok(labels)
    }

    /// Choisit les obce; retourne les noms d'unités proposés
    ///
    /// Les unités déjà choisies qui n'appartiennent plus aux obce sont retirées.
    pub fn choose_municipalities<T: AsRef<str>>(&mut self, labels: &[T]) -> Vec<String> {
        self.municipalities = labels.iter().map(|l| l.as_ref().to_string()).collect();
        let available = self.available_units();
        self.unit_names.retain(|name| available.contains(name));
        available
    }

    /// Noms d'unités proposés pour les obce choisies
    pub fn available_units(&self) -> Vec<String> {
        self.directory
            .as_ref()
            .map(|d| d.unit_names(&self.municipalities))
            .unwrap_or_default()
    }

    /// Choisit les unités par nom; retourne les codes KÚ résolus
    pub fn choose_units<T: AsRef<str>>(&mut self, names: &[T]) -> Vec<i64> {
        self.unit_names = names.iter().map(|n| n.as_ref().to_string()).collect();
        self.selected_units()
    }

    /// Codes KÚ de la sélection courante, dans l'ordre de l'annuaire
    pub fn selected_units(&self) -> Vec<i64> {
        self.directory
            .as_ref()
            .map(|d| d.resolve_units(&self.municipalities, &self.unit_names))
            .unwrap_or_default()
    }

    pub fn choose_attribute(&mut self, attribute: DisplayAttribute) {
        self.attribute = attribute;
    }

    pub fn attribute(&self) -> DisplayAttribute {
        self.attribute
    }

    /// Reconstruit l'ensemble de parcelles pour la sélection courante
    ///
    /// En cas d'échec l'ensemble précédent est conservé et l'erreur retournée.
    pub async fn refresh(&mut self, progress: impl FnMut(Progress)) -> Result<&UnifiedParcelSet> {
        let codes = self.selected_units();
        let set = self.pipeline.build_unified_set(&codes, progress).await?;
        Ok(&*self.set.insert(set))
    }

    /// Dernier ensemble construit avec succès
    pub fn current_set(&self) -> Option<&UnifiedParcelSet> {
        self.set.as_ref()
    }

    fn loaded_set(&self) -> Option<&UnifiedParcelSet> {
        self.set.as_ref().filter(|s| !s.is_empty())
    }

    pub fn legend(&self) -> Option<Legend> {
        self.loaded_set()
            .map(|set| Legend::build(&set.parcels, self.attribute))
    }

    pub fn map_layer(&self) -> Option<MapLayer> {
        self.loaded_set()
            .and_then(|set| MapLayer::build(set, self.attribute))
    }

    pub fn table(&self) -> Option<ParcelTable> {
        self.loaded_set()
            .map(|set| ParcelTable::overview(&set.parcels, &self.pipeline.config().viewer_url))
    }

    /// Fichier à télécharger; None si aucune parcelle n'est chargée
    pub async fn export(
        &self,
        format: ExportFormat,
        crs: TargetCrs,
    ) -> Result<Option<Arc<ExportFile>>> {
        match self.loaded_set() {
            Some(set) => Ok(Some(self.pipeline.export(set, format, crs).await?)),
            None => Ok(None),
        }
    }
}
