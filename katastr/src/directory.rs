//! Číselníky ČÚZK: annuaire des katastrální území, druhy pozemků, způsoby využití

use std::collections::{BTreeMap, BTreeSet, HashSet};

use cuzk_shp::{Feature, Layer};
use serde::Serialize;

use crate::error::{KatastrError, Result};

const UNIT_COLUMNS: [&str; 4] = ["KU_KOD", "KU_NAZEV", "OBEC_KOD", "OBEC_NAZEV"];
const CODE_COLUMNS: [&str; 3] = ["KOD", "NAZEV", "ZKRATKA"];

/// Une ligne de l'annuaire SC_SEZNAMKUKRA_DOTAZ
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CadastralUnitRecord {
    /// KU_KOD
    pub unit_code: i64,
    /// KU_NAZEV
    pub unit_name: String,
    /// OBEC_KOD
    pub municipality_code: i64,
    /// OBEC_NAZEV
    pub municipality_name: String,
}

impl CadastralUnitRecord {
    /// Libellé de sélection "<nom de la obec> (<code>)"
    pub fn label(&self) -> String {
        format!("{} ({})", self.municipality_name, self.municipality_code)
    }
}

/// Annuaire des unités cadastrales, dans l'ordre du fichier source
#[derive(Debug, Clone, Default)]
pub struct CadastralUnitDirectory {
    units: Vec<CadastralUnitRecord>,
}

impl CadastralUnitDirectory {
    pub fn new(units: Vec<CadastralUnitRecord>) -> Self {
        Self { units }
    }

    /// Construit l'annuaire depuis la couche DBF
    pub fn from_layer(layer: &Layer) -> Result<Self> {
        const DATASET: &str = "SC_SEZNAMKUKRA_DOTAZ";
        require_columns(DATASET, layer, &UNIT_COLUMNS)?;

        let units = layer
            .features
            .iter()
            .map(|feature| {
                Ok(CadastralUnitRecord {
                    unit_code: integer_column(DATASET, feature, "KU_KOD")?,
                    unit_name: text_column(DATASET, feature, "KU_NAZEV")?,
                    municipality_code: integer_column(DATASET, feature, "OBEC_KOD")?,
                    municipality_name: text_column(DATASET, feature, "OBEC_NAZEV")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(units = units.len(), "Cadastral unit directory loaded");
        Ok(Self { units })
    }

    pub fn units(&self) -> &[CadastralUnitRecord] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Libellés uniques des obce, triés (options du premier sélecteur)
    pub fn municipality_labels(&self) -> Vec<String> {
        self.units
            .iter()
            .map(CadastralUnitRecord::label)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Libellés contenant `query` (nom ou code, insensible à la casse)
    pub fn filter_labels(&self, query: &str) -> Vec<String> {
        let query = query.trim().to_lowercase();
        self.municipality_labels()
            .into_iter()
            .filter(|label| label.to_lowercase().contains(&query))
            .collect()
    }

    /// Unités appartenant aux obce choisies, dans l'ordre de l'annuaire
    pub fn units_of<S: AsRef<str>>(&self, labels: &[S]) -> Vec<&CadastralUnitRecord> {
        let wanted: HashSet<&str> = labels.iter().map(AsRef::as_ref).collect();
        self.units
            .iter()
            .filter(|unit| wanted.contains(unit.label().as_str()))
            .collect()
    }

    /// Noms d'unités uniques des obce choisies (options du second sélecteur)
    pub fn unit_names<S: AsRef<str>>(&self, labels: &[S]) -> Vec<String> {
        let mut seen = HashSet::new();
        self.units_of(labels)
            .into_iter()
            .filter(|unit| seen.insert(unit.unit_name.as_str()))
            .map(|unit| unit.unit_name.clone())
            .collect()
    }

    /// Codes des unités nommées dans les obce choisies, dans l'ordre de l'annuaire
    ///
    /// Un même nom présent dans deux obce choisies donne deux codes.
    pub fn resolve_units<S: AsRef<str>, N: AsRef<str>>(&self, labels: &[S], names: &[N]) -> Vec<i64> {
        let wanted: HashSet<&str> = names.iter().map(AsRef::as_ref).collect();
        self.units_of(labels)
            .into_iter()
            .filter(|unit| wanted.contains(unit.unit_name.as_str()))
            .map(|unit| unit.unit_code)
            .collect()
    }

    /// Recherche par code KÚ
    pub fn get(&self, unit_code: i64) -> Option<&CadastralUnitRecord> {
        self.units.iter().find(|unit| unit.unit_code == unit_code)
    }
}

/// Une entrée d'un číselník de codes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeEntry {
    pub code: i64,
    pub name: String,
    pub abbreviation: Option<String>,
}

/// Číselník code → (nom, abréviation)
#[derive(Debug, Clone, Default)]
pub struct CodeDirectory {
    dataset: String,
    entries: BTreeMap<i64, CodeEntry>,
}

impl CodeDirectory {
    pub fn new(dataset: impl Into<String>, entries: impl IntoIterator<Item = CodeEntry>) -> Self {
        Self {
            dataset: dataset.into(),
            entries: entries.into_iter().map(|e| (e.code, e)).collect(),
        }
    }

    /// Construit le číselník depuis la couche DBF (KOD normalisé en entier)
    pub fn from_layer(dataset: &str, layer: &Layer) -> Result<Self> {
        require_columns(dataset, layer, &CODE_COLUMNS)?;

        let mut entries = BTreeMap::new();
        for feature in &layer.features {
            let entry = CodeEntry {
                code: integer_column(dataset, feature, "KOD")?,
                name: text_column(dataset, feature, "NAZEV")?,
                abbreviation: feature.text("ZKRATKA"),
            };
            if entries.contains_key(&entry.code) {
                tracing::warn!(dataset, code = entry.code, "Duplicate code, keeping the first one");
                continue;
            }
            entries.insert(entry.code, entry);
        }

        tracing::debug!(dataset, codes = entries.len(), "Code directory loaded");
        Ok(Self {
            dataset: dataset.to_string(),
            entries,
        })
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn get(&self, code: i64) -> Option<&CodeEntry> {
        self.entries.get(&code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CodeEntry> {
        self.entries.values()
    }
}

fn require_columns(dataset: &str, layer: &Layer, columns: &[&str]) -> Result<()> {
    match layer.missing_field(columns) {
        Some(column) => Err(KatastrError::schema(
            dataset,
            format!("missing column {}", column),
        )),
        None => Ok(()),
    }
}

fn integer_column(dataset: &str, feature: &Feature, column: &str) -> Result<i64> {
    feature.integer(column).ok_or_else(|| {
        KatastrError::schema(
            dataset,
            format!(
                "record {}: {} is not an integer ({:?})",
                feature.record,
                column,
                feature.get(column)
            ),
        )
    })
}

fn text_column(dataset: &str, feature: &Feature, column: &str) -> Result<String> {
    feature.text(column).ok_or_else(|| {
        KatastrError::schema(
            dataset,
            format!("record {}: {} is empty", feature.record, column),
        )
    })
}
