//! Flux paresseux d'enregistrements sur un `BufRead`
//!
//! Une seule passe, mémoire constante : le tampon de ligne est réutilisé.

use std::io::BufRead;

use tracing::trace;

use super::line::LineParser;
use crate::types::{GeonamesRecord, ParseStats};
use crate::GeonamesError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Itérateur d'enregistrements. Les lignes malformées sont comptées puis ignorées,
/// seules les erreurs d'I/O remontent (et terminent le flux).
pub struct RecordStream<R> {
    reader: R,
    parser: LineParser,
    buffer: Vec<u8>,
    stats: ParseStats,
    done: bool,
}

impl<R: BufRead> RecordStream<R> {
    pub fn new(reader: R) -> Self {
        Self::with_parser(reader, LineParser::default())
    }

    pub fn with_parser(reader: R, parser: LineParser) -> Self {
        Self {
            reader,
            parser,
            buffer: Vec::with_capacity(512),
            stats: ParseStats::default(),
            done: false,
        }
    }

    /// Compteurs courants
    pub fn stats(&self) -> ParseStats {
        self.stats
    }
}

impl<R: BufRead> Iterator for RecordStream<R> {
    type Item = Result<GeonamesRecord, GeonamesError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buffer.clear();
            let read = match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(read) => read,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            };
            if read == 0 {
                self.done = true;
                break;
            }

            self.stats.lines += 1;
            let line = if self.stats.lines == 1 {
                self.buffer.strip_prefix(UTF8_BOM).unwrap_or(&self.buffer[..])
            } else {
                &self.buffer[..]
            };

            match self.parser.parse(line) {
                Some(record) => {
                    self.stats.records += 1;
                    return Some(Ok(record));
                }
                None => {
                    self.stats.skipped += 1;
                    trace!(line = self.stats.lines, "Skipping malformed line");
                }
            }
        }
        None
    }
}

/// Crée un flux sur un lecteur avec la disposition par défaut
pub fn parse<R: BufRead>(reader: R) -> RecordStream<R> {
    RecordStream::new(reader)
}
