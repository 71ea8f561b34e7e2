//! Types d'erreurs pour le crate geonames

use std::path::PathBuf;

use thiserror::Error;

/// Erreurs pouvant survenir lors de la lecture d'un fichier geonames
///
/// Une ligne malformée n'est jamais une erreur : elle est comptée puis ignorée.
#[derive(Debug, Error)]
pub enum GeonamesError {
    /// Erreur d'I/O lors de la lecture du fichier
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fichier introuvable
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Disposition de colonnes incohérente
    #[error("Invalid column layout: {0}")]
    InvalidLayout(String),
}

impl GeonamesError {
    /// Crée une erreur de disposition avec contexte
    pub fn invalid_layout(reason: impl Into<String>) -> Self {
        Self::InvalidLayout(reason.into())
    }
}
