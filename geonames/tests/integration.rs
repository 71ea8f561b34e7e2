//! Tests d'intégration sur de vrais fichiers temporaires

use std::io::Write;
use std::num::NonZeroUsize;

use geonames::{open_batches, open_records, scan, ColumnLayout, GeonamesError, LineParser};

fn write_lines(lines: usize) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for i in 0..lines {
        writeln!(file, "{i}\tPlace {i}\tplace\t\t{}\t{}", i % 180, i % 90).unwrap();
    }
    file.flush().unwrap();
    file
}

#[test]
fn test_batches_from_file() {
    let file = write_lines(25_000);
    let size = NonZeroUsize::new(10_000).unwrap();

    let sizes: Vec<usize> = open_batches(file.path(), LineParser::default(), size)
        .unwrap()
        .map(|b| b.unwrap().len())
        .collect();

    assert_eq!(sizes, vec![10_000, 10_000, 5_000]);
}

#[test]
fn test_records_keep_file_order() {
    let file = write_lines(3);
    let ids: Vec<String> = open_records(file.path(), LineParser::default())
        .unwrap()
        .map(|r| r.unwrap().id)
        .collect();
    assert_eq!(ids, vec!["0", "1", "2"]);
}

#[test]
fn test_scan_counts_skipped_lines() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "1\tAlice\t\t\t10.0\t50.0\n2\tBob\t\t\t-200\tabc\n").unwrap();
    file.flush().unwrap();

    let summary = scan(
        file.path(),
        LineParser::default(),
        NonZeroUsize::new(10).unwrap(),
    )
    .unwrap();

    assert_eq!(summary.batches, 1);
    assert_eq!(summary.stats.lines, 2);
    assert_eq!(summary.stats.records, 1);
    assert_eq!(summary.stats.skipped, 1);
}

#[test]
fn test_bzip2_file() {
    use bzip2::write::BzEncoder;
    use bzip2::Compression;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cities.txt.bz2");
    let file = std::fs::File::create(&path).unwrap();
    let mut encoder = BzEncoder::new(file, Compression::default());
    encoder
        .write_all(b"1\tParis\t\t\t48.85\t2.35\n2\tLyon\t\t\t45.76\t4.83\n")
        .unwrap();
    encoder.finish().unwrap();

    let parser = LineParser::new(ColumnLayout::GEONAMES_DUMP, b'\t').unwrap();
    let records: Vec<_> = open_records(&path, parser)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].latitude, 48.85);
    assert_eq!(records[1].longitude, 4.83);
}

#[test]
fn test_missing_file_is_reported() {
    let result = open_records(
        std::path::Path::new("/definitely/not/here.txt"),
        LineParser::default(),
    );
    assert!(matches!(result, Err(GeonamesError::NotFound(_))));
}
