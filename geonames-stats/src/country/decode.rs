//! Décodage d'une FeatureCollection GeoJSON en pays

use std::collections::HashSet;

use geo::{MultiPolygon, Polygon};
use geojson::{FeatureCollection, GeoJson, Geometry};
use geonames::WGS84_EPSG;
use serde_json::Value;
use tracing::{debug, warn};

use super::{AttributeFields, CountryFeature};
use crate::error::CacheError;

/// Décode le texte d'une FeatureCollection.
///
/// Les features sans géométrie surfacique, sans identifiant ou dont
/// l'identifiant est déjà vu sont ignorées. Une collection sans aucun
/// pays exploitable est une erreur.
pub fn decode_features(
    text: &str,
    fields: &AttributeFields,
) -> Result<Vec<CountryFeature>, CacheError> {
    let geojson: GeoJson = text.parse()?;
    let collection = FeatureCollection::try_from(geojson)?;

    let epsg = collection
        .foreign_members
        .as_ref()
        .and_then(|members| members.get("crs"))
        .and_then(crs_epsg)
        .unwrap_or(WGS84_EPSG);

    let mut seen = HashSet::new();
    let mut features = Vec::with_capacity(collection.features.len());
    let mut skipped = 0usize;

    for feature in collection.features {
        let Some(boundary) = feature.geometry.as_ref().and_then(to_multi_polygon) else {
            skipped += 1;
            continue;
        };

        let Some(country_id) = feature.property(&fields.id).and_then(attribute_text) else {
            skipped += 1;
            continue;
        };

        if !seen.insert(country_id.clone()) {
            warn!(country_id = %country_id, "Duplicate country id, feature ignored");
            continue;
        }

        let name = match feature.property(&fields.name).and_then(attribute_text) {
            Some(name) => name,
            None => {
                debug!(country_id = %country_id, field = %fields.name, "Missing name, using id");
                country_id.clone()
            }
        };

        let properties = feature.properties.unwrap_or_default();
        features.push(CountryFeature::new(country_id, name, boundary, epsg).with_properties(properties));
    }

    if skipped > 0 {
        warn!(
            skipped,
            id_field = %fields.id,
            "Features without polygon geometry or id ignored"
        );
    }

    if features.is_empty() {
        return Err(CacheError::InvalidPayload(format!(
            "no country feature with a polygon and a '{}' attribute",
            fields.id
        )));
    }

    debug!(count = features.len(), epsg, "Country features decoded");
    Ok(features)
}

/// Convertit une géométrie Polygon ou MultiPolygon
fn to_multi_polygon(geometry: &Geometry) -> Option<MultiPolygon<f64>> {
    match &geometry.value {
        geojson::Value::Polygon(_) => Polygon::<f64>::try_from(geometry)
            .ok()
            .map(|polygon| MultiPolygon::new(vec![polygon])),
        geojson::Value::MultiPolygon(_) => MultiPolygon::<f64>::try_from(geometry).ok(),
        _ => None,
    }
}

/// Valeur attributaire textuelle (les nombres sont convertis)
fn attribute_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Lit le membre `crs` (ancienne convention GeoJSON 2008)
///
/// Formes reconnues : `EPSG:3857`, `urn:ogc:def:crs:EPSG::3857`,
/// `urn:ogc:def:crs:OGC:1.3:CRS84`.
fn crs_epsg(crs: &Value) -> Option<u32> {
    let name = crs.get("properties")?.get("name")?.as_str()?;
    if name.ends_with("CRS84") {
        return Some(WGS84_EPSG);
    }
    name.rsplit(':').next()?.trim().parse().ok()
}
