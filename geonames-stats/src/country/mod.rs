//! Polygones de pays : modèle, décodage GeoJSON, sources et cache

pub mod cache;
pub mod decode;
pub mod source;

pub use cache::{CacheLifecycle, CountryPolygonCache, DEFAULT_LOAD_TIMEOUT};
pub use decode::decode_features;
pub use source::{source_for, CountrySource, GeoJsonFileSource, HttpCountrySource};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use geo::{BoundingRect, MultiPolygon, Rect};
use geonames::{GeonamesRecord, WGS84_EPSG};
use serde_json::{Map, Value};

use crate::attribution::{SpatialAttributor, SpatialPoint};

/// Champs attributaires portant l'identifiant et le nom du pays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeFields {
    pub id: String,
    pub name: String,
}

impl Default for AttributeFields {
    fn default() -> Self {
        Self {
            id: "FID".to_string(),
            name: "COUNTRY".to_string(),
        }
    }
}

/// Un pays : polygone(s), système de coordonnées et attributs
#[derive(Debug)]
pub struct CountryFeature {
    /// Identifiant stable, unique dans le cache
    pub country_id: String,

    /// Nom affiché
    pub name: String,

    /// Frontière (Polygon et MultiPolygon sont normalisés en MultiPolygon)
    pub boundary: MultiPolygon<f64>,

    /// Code EPSG des coordonnées de la frontière
    pub epsg: u32,

    /// Tous les attributs de la source
    pub properties: Map<String, Value>,

    extent: Option<Rect<f64>>,
    visible: AtomicBool,
}

impl CountryFeature {
    pub fn new(
        country_id: impl Into<String>,
        name: impl Into<String>,
        boundary: MultiPolygon<f64>,
        epsg: u32,
    ) -> Self {
        let extent = boundary.bounding_rect();
        Self {
            country_id: country_id.into(),
            name: name.into(),
            boundary,
            epsg,
            properties: Map::new(),
            extent,
            visible: AtomicBool::new(false),
        }
    }

    pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties = properties;
        self
    }

    /// Emprise de la frontière (None si la frontière est vide)
    pub fn extent(&self) -> Option<Rect<f64>> {
        self.extent
    }

    /// Vrai dès qu'au moins un point a été attribué à ce pays
    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    /// Rend le pays visible. Retourne vrai s'il ne l'était pas encore.
    pub(crate) fn mark_visible(&self) -> bool {
        !self.visible.swap(true, Ordering::AcqRel)
    }
}

/// Ensemble des pays chargés, dans l'ordre de la source
#[derive(Debug)]
pub struct CountrySet {
    features: Vec<CountryFeature>,
    index: HashMap<String, usize>,
    attributor: SpatialAttributor,
}

impl CountrySet {
    pub fn new(features: Vec<CountryFeature>) -> Self {
        let index = features
            .iter()
            .enumerate()
            .map(|(i, f)| (f.country_id.clone(), i))
            .collect();
        let attributor = SpatialAttributor::new(&features, WGS84_EPSG);

        Self {
            features,
            index,
            attributor,
        }
    }

    pub fn features(&self) -> &[CountryFeature] {
        &self.features
    }

    pub fn get(&self, country_id: &str) -> Option<&CountryFeature> {
        self.index.get(country_id).map(|&i| &self.features[i])
    }

    /// Rang du pays dans l'ordre de la source
    pub fn position(&self, country_id: &str) -> Option<usize> {
        self.index.get(country_id).copied()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Pays contenant l'enregistrement (premier dans l'ordre de la source)
    pub fn locate(&self, record: &GeonamesRecord) -> Option<&CountryFeature> {
        self.attributor
            .locate(&SpatialPoint::from(record), &self.features)
    }

    pub fn attributor(&self) -> &SpatialAttributor {
        &self.attributor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn square(id: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> CountryFeature {
        let poly = polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
            (x: x0, y: y0),
        ];
        CountryFeature::new(id, id.to_lowercase(), MultiPolygon::new(vec![poly]), 4326)
    }

    #[test]
    fn test_mark_visible_once() {
        let feature = square("A", 0.0, 0.0, 1.0, 1.0);
        assert!(!feature.is_visible());
        assert!(feature.mark_visible());
        assert!(!feature.mark_visible());
        assert!(feature.is_visible());
    }

    #[test]
    fn test_extent_is_computed() {
        let feature = square("A", 0.0, 40.0, 20.0, 60.0);
        let extent = feature.extent().unwrap();
        assert_eq!(extent.min().x, 0.0);
        assert_eq!(extent.max().y, 60.0);
    }

    #[test]
    fn test_set_lookup_and_locate() {
        let set = CountrySet::new(vec![
            square("A", 0.0, 40.0, 20.0, 60.0),
            square("B", 20.0, 40.0, 40.0, 60.0),
        ]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("B").unwrap().name, "b");
        assert!(set.get("C").is_none());

        let record = GeonamesRecord {
            id: "1".into(),
            name: "Alice".into(),
            latitude: 50.0,
            longitude: 30.0,
        };
        assert_eq!(set.locate(&record).unwrap().country_id, "B");
        assert_eq!(set.position("B"), Some(1));
        assert_eq!(set.position("C"), None);
    }

    #[test]
    fn test_set_debug_names_countries() {
        let set = CountrySet::new(vec![square("FR", 0.0, 40.0, 10.0, 50.0)]);
        let debug = format!("{:?}", set);
        assert!(debug.contains("CountrySet"));
        assert!(debug.contains("\"FR\""));
    }
}
