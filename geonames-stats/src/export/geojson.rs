//! Export des pays visibles vers GeoJSON avec geozero (streaming)
//!
//! Chaque pays ayant reçu au moins un point est écrit avec ses attributs
//! d'origine et un attribut `HitCount`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use geo::Geometry;
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;

use crate::aggregate::CountryEntry;
use crate::country::{CountryFeature, CountrySet};

/// Attribut ajouté à chaque pays exporté
pub const HIT_COUNT_PROPERTY: &str = "HitCount";

/// Exporte les pays visibles et leur compteur. Retourne le nombre de pays écrits.
pub fn export_statistics(
    countries: &CountrySet,
    entries: &[CountryEntry],
    output_path: &Path,
) -> Result<usize> {
    let file = File::create(output_path)
        .context(format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);

    let written = write_statistics(&mut writer, countries, entries)?;
    writer.flush()?;

    Ok(written)
}

fn write_statistics<W: Write>(
    writer: &mut W,
    countries: &CountrySet,
    entries: &[CountryEntry],
) -> Result<usize> {
    let hits: HashMap<&str, u64> = entries
        .iter()
        .map(|e| (e.country_id.as_str(), e.hit_count))
        .collect();

    // Header FeatureCollection avec CRS (celui du premier pays)
    let epsg = countries.features().first().map_or(4326, |f| f.epsg);
    write!(
        writer,
        r#"{{"type":"FeatureCollection","crs":{{"type":"name","properties":{{"name":"urn:ogc:def:crs:EPSG::{}"}}}},"features":["#,
        epsg
    )?;

    let mut written = 0;
    for feature in countries.features() {
        let hit_count = hits.get(feature.country_id.as_str()).copied().unwrap_or(0);
        if hit_count == 0 || !feature.is_visible() {
            continue;
        }
        if written > 0 {
            write!(writer, ",")?;
        }
        write_feature(writer, feature, hit_count)?;
        written += 1;
    }

    // Footer
    write!(writer, "]}}")?;
    Ok(written)
}

/// Écrit un pays en GeoJSON
fn write_feature<W: Write>(writer: &mut W, feature: &CountryFeature, hit_count: u64) -> Result<()> {
    write!(
        writer,
        r#"{{"type":"Feature","id":"{}","#,
        escape_json(&feature.country_id)
    )?;

    write!(writer, r#""geometry":"#)?;
    let mut geom_buf = Vec::new();
    let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
    Geometry::MultiPolygon(feature.boundary.clone()).process_geom(&mut geom_writer)?;
    writer.write_all(&geom_buf)?;

    write!(writer, r#","properties":{{"#)?;
    for (key, value) in &feature.properties {
        if key == HIT_COUNT_PROPERTY {
            continue;
        }
        write!(writer, r#""{}":{},"#, escape_json(key), value)?;
    }
    write!(writer, r#""{}":{}}}}}"#, HIT_COUNT_PROPERTY, hit_count)?;

    Ok(())
}

/// Échappe une chaîne pour JSON
fn escape_json(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};
    use serde_json::{json, Value};

    fn countries() -> CountrySet {
        let square = |x: f64| {
            MultiPolygon::new(vec![polygon![
                (x: x, y: 0.0),
                (x: x + 1.0, y: 0.0),
                (x: x + 1.0, y: 1.0),
                (x: x, y: 0.0),
            ]])
        };
        let mut properties = serde_json::Map::new();
        properties.insert("COUNTRY".into(), json!("Quote \"land\""));
        properties.insert("FID".into(), json!(1));

        CountrySet::new(vec![
            CountryFeature::new("1", "Quote land", square(0.0), 4326).with_properties(properties),
            CountryFeature::new("2", "Empty", square(2.0), 4326),
        ])
    }

    fn entries() -> Vec<CountryEntry> {
        vec![
            CountryEntry {
                country_id: "2".into(),
                name: "Empty".into(),
                hit_count: 0,
            },
            CountryEntry {
                country_id: "1".into(),
                name: "Quote land".into(),
                hit_count: 3,
            },
        ]
    }

    #[test]
    fn test_only_visible_countries_are_written() {
        let countries = countries();
        countries.get("1").unwrap().mark_visible();

        let mut buffer = Vec::new();
        let written = write_statistics(&mut buffer, &countries, &entries()).unwrap();
        assert_eq!(written, 1);

        let json: Value = serde_json::from_slice(&buffer).unwrap();
        let features = json["features"].as_array().unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0]["id"], "1");
        assert_eq!(features[0]["properties"]["HitCount"], 3);
        assert_eq!(features[0]["properties"]["COUNTRY"], "Quote \"land\"");
        assert_eq!(features[0]["geometry"]["type"], "MultiPolygon");
        assert!(json["crs"]["properties"]["name"]
            .as_str()
            .unwrap()
            .ends_with("EPSG::4326"));
    }

    #[test]
    fn test_export_to_file() {
        let countries = countries();
        countries.get("1").unwrap().mark_visible();
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("stats.geojson");

        assert_eq!(export_statistics(&countries, &entries(), &output).unwrap(), 1);
        let content = std::fs::read_to_string(&output).unwrap();
        assert!(content.contains(r#""type":"FeatureCollection""#));
    }

    #[test]
    fn test_escape_json() {
        assert_eq!(escape_json("hello"), "hello");
        assert_eq!(escape_json("hello\"world"), "hello\\\"world");
        assert_eq!(escape_json("line\nbreak"), "line\\nbreak");
    }
}
