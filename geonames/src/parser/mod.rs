//! Parsing des lignes geonames

pub mod line;
pub mod stream;

pub use line::{parse_line, LineParser, TAB};
pub use stream::RecordStream;
