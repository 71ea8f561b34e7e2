//! Découpage et validation d'une ligne

use std::borrow::Cow;

use memchr::memchr_iter;

use crate::types::{ColumnLayout, GeonamesRecord};
use crate::GeonamesError;

/// Séparateur par défaut
pub const TAB: u8 = b'\t';

/// Parseur d'une ligne délimitée vers un `GeonamesRecord`
#[derive(Debug, Clone, Copy)]
pub struct LineParser {
    layout: ColumnLayout,
    delimiter: u8,
}

impl Default for LineParser {
    fn default() -> Self {
        Self {
            layout: ColumnLayout::DEFAULT,
            delimiter: TAB,
        }
    }
}

impl LineParser {
    /// Crée un parseur. Le séparateur doit être un octet ASCII.
    pub fn new(layout: ColumnLayout, delimiter: u8) -> Result<Self, GeonamesError> {
        if !delimiter.is_ascii() {
            return Err(GeonamesError::invalid_layout(format!(
                "delimiter 0x{:02x} is not ASCII",
                delimiter
            )));
        }
        Ok(Self { layout, delimiter })
    }

    pub fn layout(&self) -> ColumnLayout {
        self.layout
    }

    /// Parse une ligne brute (avec ou sans fin de ligne).
    ///
    /// Retourne `None` si la ligne n'a pas toutes les colonnes attendues ou si
    /// une coordonnée n'est pas un nombre fini.
    pub fn parse(&self, line: &[u8]) -> Option<GeonamesRecord> {
        let text = decode(trim_line_end(line));
        let bytes = text.as_bytes();
        let layout = &self.layout;
        let last = layout.last_index();

        let mut id = None;
        let mut name = None;
        let mut longitude = None;
        let mut latitude = None;

        let mut start = 0;
        let ends = memchr_iter(self.delimiter, bytes).chain(std::iter::once(bytes.len()));
        for (index, end) in ends.enumerate() {
            let token = &text[start..end];
            if index == layout.id {
                id = Some(token);
            }
            if index == layout.name {
                name = Some(token);
            }
            if index == layout.longitude {
                longitude = Some(token);
            }
            if index == layout.latitude {
                latitude = Some(token);
            }
            if index == last {
                break;
            }
            start = end + 1;
        }

        let longitude = parse_coordinate(longitude?)?;
        let latitude = parse_coordinate(latitude?)?;

        Some(GeonamesRecord {
            id: id?.to_string(),
            name: name?.to_string(),
            latitude,
            longitude,
        })
    }
}

/// Parse une ligne avec la disposition par défaut
pub fn parse_line(line: &[u8]) -> Option<GeonamesRecord> {
    LineParser::default().parse(line)
}

/// Parse une coordonnée en notation invariante (signe, point décimal, exposant)
pub fn parse_coordinate(token: &str) -> Option<f64> {
    let token = token.trim_matches(|c: char| c.is_ascii_whitespace());
    let unsigned = match token.strip_prefix('+') {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit() || c == '.') => rest,
        Some(_) => return None,
        None => token,
    };
    if unsigned.is_empty() {
        return None;
    }

    let value: f64 = fast_float::parse(unsigned).ok()?;
    value.is_finite().then_some(value)
}

/// Décode la ligne : UTF-8 si valide, sinon Windows-1252
fn decode(line: &[u8]) -> Cow<'_, str> {
    match simdutf8::basic::from_utf8(line) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(line);
            text
        }
    }
}

/// Retire `\n` et `\r\n` en fin de ligne
fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
