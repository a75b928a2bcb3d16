//! Types d'erreurs pour le crate cuzk-shp

use thiserror::Error;

/// Erreurs pouvant survenir lors de la lecture d'une archive ČÚZK
#[derive(Debug, Error)]
pub enum CuzkShpError {
    /// Erreur d'I/O lors de la lecture de l'archive
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive ZIP corrompue ou format invalide
    #[error("Invalid archive format: {0}")]
    InvalidArchive(String),

    /// Fichier manquant dans l'archive
    #[error("Missing required file: {0}")]
    MissingFile(String),

    /// Erreur de parsing d'un fichier
    #[error("Parse error in {file}: {reason}")]
    ParseError { file: String, reason: String },

    /// Type de forme shapefile non géré
    #[error("Unsupported shape type {shape_type} in {file}")]
    UnsupportedShape { file: String, shape_type: i32 },

    /// Encodage non supporté (label .cpg inconnu)
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),
}

impl CuzkShpError {
    /// Crée une erreur de parsing avec contexte
    pub fn parse_error(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ParseError {
            file: file.into(),
            reason: reason.into(),
        }
    }
}

impl From<zip::result::ZipError> for CuzkShpError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Self::Io(e),
            other => Self::InvalidArchive(other.to_string()),
        }
    }
}
