//! Erreurs du pipeline katastr

use thiserror::Error;

/// Erreurs pouvant survenir lors du chargement, de la jointure ou de l'export
#[derive(Debug, Error)]
pub enum KatastrError {
    /// Serveur injoignable, timeout, corps illisible
    #[error("Network failure fetching {url}: {reason}")]
    Network { url: String, reason: String },

    /// Réponse HTTP en erreur (archive absente, serveur en panne)
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    /// Archive téléchargée illisible
    #[error("Archive error in {source_name}: {error}")]
    Archive {
        source_name: String,
        #[source]
        error: cuzk_shp::CuzkShpError,
    },

    /// Contenu d'archive inattendu (colonne manquante, valeur invalide)
    #[error("Schema error in {dataset}: {reason}")]
    Schema { dataset: String, reason: String },

    /// Code d'unité cadastrale absent de l'annuaire
    #[error("Unknown cadastral unit: {0}")]
    UnknownUnit(i64),

    /// Échec de reprojection
    #[error("Reprojection failed: {0}")]
    Reprojection(String),

    /// Échec d'encodage d'un export
    #[error("Export failed: {0}")]
    Export(String),

    /// Configuration invalide
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KatastrError {
    pub fn schema(dataset: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            dataset: dataset.into(),
            reason: reason.into(),
        }
    }

    pub fn archive(source_name: impl Into<String>, error: cuzk_shp::CuzkShpError) -> Self {
        Self::Archive {
            source_name: source_name.into(),
            error,
        }
    }

    /// Vrai pour les échecs réseau (injoignable ou statut HTTP)
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::HttpStatus { .. })
    }
}

impl From<csv::Error> for KatastrError {
    fn from(err: csv::Error) -> Self {
        Self::Export(format!("CSV: {}", err))
    }
}

impl From<rusqlite::Error> for KatastrError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Export(format!("GeoPackage: {}", err))
    }
}

impl From<std::io::Error> for KatastrError {
    fn from(err: std::io::Error) -> Self {
        Self::Export(format!("I/O: {}", err))
    }
}

impl From<serde_json::Error> for KatastrError {
    fn from(err: serde_json::Error) -> Self {
        Self::Export(format!("JSON: {}", err))
    }
}

pub type Result<T, E = KatastrError> = std::result::Result<T, E>;
