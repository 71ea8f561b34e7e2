//! # geonames-stats
//!
//! Attribution de points geonames aux polygones de pays et comptage par pays.
//!
//! ## Features
//!
//! - Lecture en flux par lots (crate `geonames`) en tâche de fond
//! - Polygones de pays chargés une seule fois, au premier usage (HTTP ou fichier)
//! - Attribution parallèle (rayon), reprojection vers le système de chaque pays
//! - Publication par un contexte unique : compteurs, visibilité, notifications
//! - Rapport d'ingestion et export GeoJSON des pays visibles
//!
//! ## Usage CLI
//!
//! ```bash
//! # Ingestion avec le service ArcGIS par défaut
//! geonames-stats ingest cities.txt
//!
//! # Pays depuis un fichier local, dump geonames (latitude en colonne 4)
//! geonames-stats ingest --countries world.geojson --lat-lon allCountries.txt
//!
//! # Lecture à blanc
//! geonames-stats check allCountries.txt.bz2
//! ```

pub mod aggregate;
pub mod attribution;
pub mod config;
pub mod country;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod report;
#[cfg(feature = "reproject")]
pub mod reproject;
pub mod reproject_lite;

pub use aggregate::{CountryEntry, HitCountAggregator, IncrementOutcome};
pub use attribution::{SpatialAttributor, SpatialPoint};
pub use config::Config;
pub use country::{CountryFeature, CountryPolygonCache, CountrySet, CountrySource};
pub use error::{CacheError, PipelineError};
pub use pipeline::{IngestionHandle, IngestionPipeline, PipelineOptions, PipelineState, PublicationSink};
pub use report::{IngestReport, IngestStatus};
