//! Rapport de construction d'une sélection
//!
//! Ce module collecte les compteurs de jointure par unité, les unités en
//! échec et les avertissements, puis les affiche ou les sauvegarde en JSON.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use crate::error::KatastrError;
use crate::parcels::JoinStats;

/// Statut global de la sélection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SelectionStatus {
    /// Toutes les unités ont été chargées
    Success,
    /// Certaines unités ont échoué (politique `skip`)
    PartialSuccess,
    /// Aucune unité n'a pu être chargée
    Failed,
    /// Aucune unité sélectionnée
    Empty,
}

/// Unité en échec
#[derive(Debug, Clone, Serialize)]
pub struct UnitFailure {
    pub unit_code: i64,
    pub message: String,
    /// Échec réseau (par opposition à un contenu d'archive inattendu)
    pub network: bool,
}

/// Rapport complet d'une sélection
#[derive(Debug, Clone, Serialize)]
pub struct SelectionReport {
    /// Codes KÚ demandés, dans l'ordre
    pub requested_units: Vec<i64>,
    /// Durée de la construction
    pub duration_secs: f64,
    /// Statut global
    pub status: SelectionStatus,

    /// Nombre d'unités traitées (succès + échecs)
    pub units_processed: usize,
    /// Nombre d'unités en échec
    pub units_failed: usize,
    /// Nombre de parcelles dans l'ensemble unifié
    pub parcels_loaded: usize,

    /// Compteurs de jointure par unité
    pub by_unit: BTreeMap<i64, JoinStats>,

    pub failures: Vec<UnitFailure>,
    pub warnings: Vec<String>,
}

impl Default for SelectionReport {
    fn default() -> Self {
        Self {
            requested_units: Vec::new(),
            duration_secs: 0.0,
            status: SelectionStatus::Empty,
            units_processed: 0,
            units_failed: 0,
            parcels_loaded: 0,
            by_unit: BTreeMap::new(),
            failures: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl SelectionReport {
    /// Crée un rapport pour une liste d'unités
    pub fn new(requested_units: &[i64]) -> Self {
        Self {
            requested_units: requested_units.to_vec(),
            ..Default::default()
        }
    }

    /// Enregistre une unité chargée avec succès
    pub fn record_unit(&mut self, unit_code: i64, stats: JoinStats) {
        self.units_processed += 1;
        self.parcels_loaded += stats.joined;
        self.by_unit.insert(unit_code, stats);
    }

    /// Enregistre une unité en échec
    pub fn record_unit_failure(&mut self, unit_code: i64, error: &KatastrError) {
        self.units_processed += 1;
        self.units_failed += 1;
        self.failures.push(UnitFailure {
            unit_code,
            message: error.to_string(),
            network: error.is_network(),
        });
    }

    /// Enregistre un avertissement
    pub fn record_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Définit la durée de la construction
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        let loaded = self.units_processed - self.units_failed;

        self.status = if self.requested_units.is_empty() {
            SelectionStatus::Empty
        } else if self.units_failed == 0 {
            SelectionStatus::Success
        } else if loaded > 0 {
            SelectionStatus::PartialSuccess
        } else {
            SelectionStatus::Failed
        };
    }

    /// Total des lignes écartées par les jointures internes
    pub fn total_dropped(&self) -> usize {
        self.by_unit.values().map(JoinStats::dropped).sum()
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("SELECTION REPORT - {} unit(s)", self.requested_units.len());
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SUMMARY ---");
        println!(
            "Units: {} processed, {} failed",
            self.units_processed, self.units_failed
        );
        println!(
            "Parcels: {} loaded, {} dropped by join",
            self.parcels_loaded,
            self.total_dropped()
        );

        if !self.by_unit.is_empty() {
            println!("\n--- BY UNIT ---");
            for (unit, stats) in &self.by_unit {
                println!(
                    "  {}: {} joined / {} geometries, {} without detail, {} unknown land type, {} without land use",
                    unit,
                    stats.joined,
                    stats.geometry_rows,
                    stats.missing_detail,
                    stats.unknown_land_type,
                    stats.unresolved_land_use
                );
            }
        }

        if !self.warnings.is_empty() {
            println!("\n--- WARNINGS ({}) ---", self.warnings.len());
            for w in &self.warnings {
                println!("  {}", w);
            }
        }

        if !self.failures.is_empty() {
            println!("\n--- FAILURES ({}) ---", self.failures.len());
            for f in self.failures.iter().take(20) {
                println!("  [{}] {}", f.unit_code, f.message);
            }
            if self.failures.len() > 20 {
                println!("  ... and {} more", self.failures.len() - 20);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{:?}: {} parcels from {}/{} units, {} dropped, {} failed",
            self.status,
            self.parcels_loaded,
            self.units_processed - self.units_failed,
            self.requested_units.len(),
            self.total_dropped(),
            self.units_failed
        )
    }
}
