//! Ouverture des fichiers geonames (texte brut ou .bz2)

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use bzip2::read::BzDecoder;

use crate::GeonamesError;

const READ_BUFFER: usize = 64 * 1024;

/// Lecteur bufferisé sur un fichier geonames
pub type SourceReader = Box<dyn BufRead + Send>;

/// Ouvre un fichier geonames, décompressé à la volée si l'extension est `.bz2`
pub fn open(path: &Path) -> Result<SourceReader, GeonamesError> {
    if !path.is_file() {
        return Err(GeonamesError::NotFound(path.to_path_buf()));
    }

    let file = File::open(path)?;
    if is_bzip2(path) {
        Ok(Box::new(BufReader::with_capacity(
            READ_BUFFER,
            BzDecoder::new(file),
        )))
    } else {
        Ok(Box::new(BufReader::with_capacity(READ_BUFFER, file)))
    }
}

fn is_bzip2(path: &Path) -> bool {
    path.extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("bz2"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file() {
        let result = open(Path::new("nonexistent-geonames.txt"));
        assert!(matches!(result, Err(GeonamesError::NotFound(_))));
    }

    #[test]
    fn test_bzip2_detection() {
        assert!(is_bzip2(Path::new("allCountries.txt.bz2")));
        assert!(is_bzip2(Path::new("cities.BZ2")));
        assert!(!is_bzip2(Path::new("cities15000.txt")));
    }
}
