//! Types d'erreurs du pipeline d'ingestion

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Échec du chargement des polygones de pays
#[derive(Debug, Error)]
pub enum CacheError {
    /// Erreur d'I/O sur une source locale
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Erreur réseau ou HTTP
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Délai dépassé
    #[error("Country source timed out after {0:?}")]
    Timeout(Duration),

    /// Réponse qui n'est pas du GeoJSON exploitable
    #[error("Malformed country payload: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Réponse GeoJSON valide mais inutilisable (aucun pays, pas une collection...)
    #[error("Invalid country payload: {0}")]
    InvalidPayload(String),

    /// Chargement en cours à l'appel, terminé en échec : seul son initiateur
    /// reçoit l'erreur d'origine
    #[error("Country load attempt {attempt} failed: {message}")]
    AttemptFailed { attempt: u64, message: String },
}

/// Erreurs du pipeline remontées à l'appelant
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Requête sans fichier
    #[error("Invalid request: no file given")]
    EmptyRequest,

    /// Fichier inexistant, la requête est rejetée avant tout traitement
    #[error("Invalid request: file not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// Le contexte de publication est arrêté
    #[error("Publisher context is closed")]
    PublisherClosed,

    /// Le worker d'ingestion est arrêté
    #[error("Ingest worker is stopped")]
    WorkerStopped,

    /// Tâche de fond interrompue
    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
