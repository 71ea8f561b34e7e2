//! Rapport d'ingestion avec graceful degradation
//!
//! Une erreur sur un fichier (lecture, chargement des pays) n'interrompt pas
//! la requête : elle est consignée ici et les fichiers suivants sont traités.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use crate::aggregate::CountryEntry;

/// Statut global de l'ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IngestStatus {
    /// Tous les fichiers lus et attribués
    Success,
    /// Des fichiers ou une attribution en erreur, mais des points publiés
    PartialSuccess,
    /// Requête annulée
    Cancelled,
    /// Aucun point publié et des erreurs
    Failed,
}

/// Statistiques d'un fichier
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileStats {
    pub path: String,
    /// Lignes lues
    pub lines: u64,
    /// Enregistrements publiés
    pub records: u64,
    /// Lignes ignorées (colonnes manquantes, coordonnées illisibles)
    pub skipped: u64,
    pub batches: u64,
    pub attributed: u64,
    pub unattributed: u64,
    /// Échec du chargement des pays pendant ce fichier
    pub cache_failure: Option<String>,
    /// Erreur de lecture, le fichier est abandonné
    pub io_error: Option<String>,
    pub cancelled: bool,
}

impl FileStats {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.display().to_string(),
            ..Default::default()
        }
    }

    /// Enregistre un lot publié et son attribution
    pub fn record_batch(&mut self, hits: &[Option<String>]) {
        let attributed = hits.iter().filter(|hit| hit.is_some()).count() as u64;
        self.batches += 1;
        self.records += hits.len() as u64;
        self.attributed += attributed;
        self.unattributed += hits.len() as u64 - attributed;
    }

    pub fn has_error(&self) -> bool {
        self.cache_failure.is_some() || self.io_error.is_some()
    }
}

/// Rapport complet d'une requête d'ingestion
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Durée de la requête
    pub duration_secs: f64,
    /// Statut global
    pub status: IngestStatus,

    // Compteurs globaux
    pub files_processed: usize,
    pub files_failed: usize,
    pub records_published: u64,
    pub records_attributed: u64,
    pub lines_skipped: u64,
    /// Chargements des pays en échec (un par fichier au plus)
    pub cache_failures: usize,
    /// Requête annulée avant le fichier suivant
    pub cancelled: bool,

    /// Détail par fichier, dans l'ordre de la requête
    pub files: Vec<FileStats>,
}

impl Default for IngestReport {
    fn default() -> Self {
        Self {
            duration_secs: 0.0,
            status: IngestStatus::Success,
            files_processed: 0,
            files_failed: 0,
            records_published: 0,
            records_attributed: 0,
            lines_skipped: 0,
            cache_failures: 0,
            cancelled: false,
            files: Vec::new(),
        }
    }
}

impl IngestReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre un fichier terminé
    pub fn record_file(&mut self, stats: FileStats) {
        self.files_processed += 1;
        if stats.has_error() {
            self.files_failed += 1;
        }
        if stats.cache_failure.is_some() {
            self.cache_failures += 1;
        }
        self.records_published += stats.records;
        self.records_attributed += stats.attributed;
        self.lines_skipped += stats.skipped;
        self.files.push(stats);
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled || self.files.iter().any(|f| f.cancelled)
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        let has_errors = self.files.iter().any(FileStats::has_error);

        self.status = if self.is_cancelled() {
            IngestStatus::Cancelled
        } else if has_errors && self.records_published > 0 {
            IngestStatus::PartialSuccess
        } else if has_errors {
            IngestStatus::Failed
        } else {
            IngestStatus::Success
        };
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("INGEST REPORT");
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SUMMARY ---");
        println!(
            "Files: {} processed, {} failed",
            self.files_processed, self.files_failed
        );
        println!(
            "Records: {} published, {} attributed, {} lines skipped",
            self.records_published, self.records_attributed, self.lines_skipped
        );

        if !self.files.is_empty() {
            println!("\n--- BY FILE ---");
            for file in &self.files {
                println!(
                    "  {}: {} lines, {} records in {} batches, {} attributed, {} skipped",
                    file.path, file.lines, file.records, file.batches, file.attributed, file.skipped
                );
            }
        }

        let errors: Vec<_> = self
            .files
            .iter()
            .flat_map(|f| {
                f.io_error
                    .iter()
                    .map(move |e| format!("[{}] read: {}", f.path, e))
                    .chain(
                        f.cache_failure
                            .iter()
                            .map(move |e| format!("[{}] countries: {}", f.path, e)),
                    )
            })
            .collect();
        if !errors.is_empty() {
            println!("\n--- ERRORS ({}) ---", errors.len());
            for e in errors.iter().take(20) {
                println!("  {}", e);
            }
            if errors.len() > 20 {
                println!("  ... and {} more", errors.len() - 20);
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
            "{:?}: {} files, {} records published, {} attributed, {} errors",
            self.status,
            self.files_processed,
            self.records_published,
            self.records_attributed,
            self.files_failed
        )
    }
}

/// Tableau des compteurs par pays, dans l'ordre du snapshot, avec le total
pub fn format_statistics(entries: &[CountryEntry], only_hits: bool) -> String {
    let rows: Vec<_> = entries
        .iter()
        .filter(|e| !only_hits || e.hit_count > 0)
        .collect();
    let name_width = rows.iter().map(|e| e.name.chars().count()).max().unwrap_or(0).max(7);
    let id_width = rows.iter().map(|e| e.country_id.chars().count()).max().unwrap_or(0).max(2);

    let mut out = format!(
        "{:<nw$}  {:<iw$}  {:>10}\n",
        "Country",
        "Id",
        "Hits",
        nw = name_width,
        iw = id_width
    );
    for entry in &rows {
        out.push_str(&format!(
            "{:<nw$}  {:<iw$}  {:>10}\n",
            entry.name,
            entry.country_id,
            entry.hit_count,
            nw = name_width,
            iw = id_width
        ));
    }
    let total: u64 = entries.iter().map(|e| e.hit_count).sum();
    out.push_str(&format!(
        "{:<nw$}  {:<iw$}  {:>10}\n",
        "Total",
        "",
        total,
        nw = name_width,
        iw = id_width
    ));
    out
}
