//! # geonames
//!
//! Parser en flux pour les fichiers geonames délimités (une ligne = un point).
//!
//! ## Features
//!
//! - Découpage SIMD des tokens avec `memchr`, validation UTF-8 avec `simdutf8`
//! - Nombres en notation invariante avec `fast-float`
//! - Repli Windows-1252 (`encoding_rs`) pour les lignes non UTF-8
//! - Décompression `.bz2` à la volée
//! - Lecture paresseuse en mémoire constante, regroupée en lots de taille fixe
//!
//! ## Usage
//!
//! ```rust,ignore
//! use geonames::{open_batches, LineParser};
//! use std::num::NonZeroUsize;
//! use std::path::Path;
//!
//! let size = NonZeroUsize::new(10_000).unwrap();
//! for batch in open_batches(Path::new("allCountries.txt"), LineParser::default(), size)? {
//!     println!("{} records", batch?.len());
//! }
//! ```

pub mod batch;
pub mod error;
pub mod parser;
pub mod source;
pub mod types;

pub use batch::{BatchExt, Batches};
pub use error::GeonamesError;
pub use parser::{parse_line, LineParser, RecordStream};
pub use source::SourceReader;
pub use types::{ColumnLayout, GeonamesRecord, ParseStats, DEFAULT_BATCH_SIZE, WGS84_EPSG};

use std::num::NonZeroUsize;
use std::path::Path;

/// Ouvre un fichier et retourne le flux d'enregistrements
pub fn open_records(
    path: &Path,
    parser: LineParser,
) -> Result<RecordStream<SourceReader>, GeonamesError> {
    let reader = source::open(path)?;
    Ok(RecordStream::with_parser(reader, parser))
}

/// Ouvre un fichier et retourne ses lots d'enregistrements
pub fn open_batches(
    path: &Path,
    parser: LineParser,
    size: NonZeroUsize,
) -> Result<Batches<RecordStream<SourceReader>>, GeonamesError> {
    Ok(open_records(path, parser)?.batched(size))
}

/// Résultat d'un parcours à blanc
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub stats: ParseStats,
    pub batches: u64,
}

/// Parcourt un fichier sans rien conserver (comptage des lignes et des lots)
pub fn scan(
    path: &Path,
    parser: LineParser,
    size: NonZeroUsize,
) -> Result<ScanSummary, GeonamesError> {
    let mut batches = open_batches(path, parser, size)?;
    let mut count = 0;
    for batch in batches.by_ref() {
        batch?;
        count += 1;
    }

    Ok(ScanSummary {
        stats: batches.get_ref().stats(),
        batches: count,
    })
}
