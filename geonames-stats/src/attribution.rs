//! Attribution d'un point au pays qui le contient
//!
//! Parcours linéaire des pays dans l'ordre de la source : le premier dont la
//! frontière contient le point (bord inclus) gagne. Chaque pays est d'abord
//! filtré par son emprise. Le point est reprojeté dans le système de chaque
//! pays, une seule fois par système et par appel.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use geo::{Intersects, Point, Rect};
use geonames::{GeonamesRecord, WGS84_EPSG};
use tracing::{trace, warn};

use crate::country::CountryFeature;
use crate::reproject_lite::PointTransform;

/// Point à attribuer, avec son système de coordonnées
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialPoint {
    pub x: f64,
    pub y: f64,
    pub epsg: u32,
}

impl SpatialPoint {
    pub fn new(x: f64, y: f64, epsg: u32) -> Self {
        Self { x, y, epsg }
    }

    /// Point WGS84 (x = longitude, y = latitude)
    pub fn wgs84(longitude: f64, latitude: f64) -> Self {
        Self::new(longitude, latitude, WGS84_EPSG)
    }
}

impl From<&GeonamesRecord> for SpatialPoint {
    fn from(record: &GeonamesRecord) -> Self {
        Self::wgs84(record.longitude, record.latitude)
    }
}

type Pair = (u32, u32);

/// Attribution spatiale, partagée entre threads
///
/// Les reprojections (source → système du pays) sont construites une fois et
/// mémorisées. Un système injoignable est signalé une seule fois et ses pays
/// sont exclus.
#[derive(Debug)]
pub struct SpatialAttributor {
    reprojectors: RwLock<HashMap<Pair, Option<Arc<PointTransform>>>>,
}

impl SpatialAttributor {
    /// Prépare les reprojections depuis `point_epsg` vers chaque système présent
    pub fn new(features: &[CountryFeature], point_epsg: u32) -> Self {
        let attributor = Self {
            reprojectors: RwLock::new(HashMap::new()),
        };
        for feature in features {
            attributor.reprojector(point_epsg, feature.epsg);
        }
        attributor
    }

    /// Premier pays (ordre de `features`) contenant le point
    pub fn locate<'a>(
        &self,
        point: &SpatialPoint,
        features: &'a [CountryFeature],
    ) -> Option<&'a CountryFeature> {
        if !point.x.is_finite() || !point.y.is_finite() {
            return None;
        }

        let mut projected: Vec<(u32, Option<Point<f64>>)> = Vec::new();

        for feature in features {
            let Some(candidate) = self.point_in(feature.epsg, point, &mut projected) else {
                continue;
            };

            if let Some(extent) = feature.extent() {
                if !extent_covers(&extent, candidate) {
                    continue;
                }
            }

            if feature.boundary.intersects(&candidate) {
                return Some(feature);
            }
        }

        None
    }

    /// Vrai si les pays en `epsg` peuvent recevoir des points en `point_epsg`
    pub fn is_reachable(&self, point_epsg: u32, epsg: u32) -> bool {
        self.reprojector(point_epsg, epsg).is_some()
    }

    fn point_in(
        &self,
        epsg: u32,
        point: &SpatialPoint,
        projected: &mut Vec<(u32, Option<Point<f64>>)>,
    ) -> Option<Point<f64>> {
        if epsg == point.epsg {
            return Some(Point::new(point.x, point.y));
        }
        if let Some((_, cached)) = projected.iter().find(|(e, _)| *e == epsg) {
            return *cached;
        }

        let result = self.reprojector(point.epsg, epsg).and_then(|transform| {
            match transform.apply(Point::new(point.x, point.y)) {
                Ok(projected) => Some(projected),
                Err(e) => {
                    trace!(x = point.x, y = point.y, epsg, error = %e, "Point not reprojectable");
                    None
                }
            }
        });
        projected.push((epsg, result));
        result
    }

    fn reprojector(&self, source: u32, target: u32) -> Option<Arc<PointTransform>> {
        if let Some(known) = self
            .reprojectors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(source, target))
        {
            return known.clone();
        }

        let mut reprojectors = self
            .reprojectors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        reprojectors
            .entry((source, target))
            .or_insert_with(|| match PointTransform::new(source, target) {
                Ok(transform) => {
                    trace!(
                        source_epsg = source,
                        target_epsg = target,
                        backend = transform.backend(),
                        "Transform ready"
                    );
                    Some(Arc::new(transform))
                }
                Err(e) => {
                    warn!(
                        source_epsg = source,
                        target_epsg = target,
                        error = %e,
                        "Countries in this CRS are excluded from attribution"
                    );
                    None
                }
            })
            .clone()
    }
}

/// Test d'emprise, bord inclus
fn extent_covers(extent: &Rect<f64>, point: Point<f64>) -> bool {
    let (min, max) = (extent.min(), extent.max());
    point.x() >= min.x && point.x() <= max.x && point.y() >= min.y && point.y() <= max.y
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn square(id: &str, x0: f64, y0: f64, x1: f64, y1: f64, epsg: u32) -> CountryFeature {
        let poly = polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
            (x: x0, y: y0),
        ];
        CountryFeature::new(id, id, MultiPolygon::new(vec![poly]), epsg)
    }

    fn locate_id(features: &[CountryFeature], lon: f64, lat: f64) -> Option<String> {
        let attributor = SpatialAttributor::new(features, WGS84_EPSG);
        attributor
            .locate(&SpatialPoint::wgs84(lon, lat), features)
            .map(|f| f.country_id.clone())
    }

    #[test]
    fn test_point_inside() {
        let features = vec![square("A", 0.0, 40.0, 20.0, 60.0, 4326)];
        assert_eq!(locate_id(&features, 10.0, 50.0).as_deref(), Some("A"));
    }

    #[test]
    fn test_point_outside() {
        let features = vec![square("A", 0.0, 40.0, 20.0, 60.0, 4326)];
        assert_eq!(locate_id(&features, 0.0, 90.0), None);
        assert_eq!(locate_id(&features, -10.0, 50.0), None);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let features = vec![square("A", 0.0, 40.0, 20.0, 60.0, 4326)];
        assert_eq!(locate_id(&features, 20.0, 50.0).as_deref(), Some("A"));
        assert_eq!(locate_id(&features, 0.0, 40.0).as_deref(), Some("A"));
    }

    #[test]
    fn test_first_match_wins_on_shared_edge() {
        let features = vec![
            square("A", 0.0, 40.0, 20.0, 60.0, 4326),
            square("B", 20.0, 40.0, 40.0, 60.0, 4326),
        ];
        assert_eq!(locate_id(&features, 20.0, 50.0).as_deref(), Some("A"));

        let reversed = vec![
            square("B", 20.0, 40.0, 40.0, 60.0, 4326),
            square("A", 0.0, 40.0, 20.0, 60.0, 4326),
        ];
        assert_eq!(locate_id(&reversed, 20.0, 50.0).as_deref(), Some("B"));
    }

    #[test]
    fn test_hole_is_excluded() {
        let ring = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0), (x: 0.0, y: 0.0)],
            interiors: [[(x: 4.0, y: 4.0), (x: 6.0, y: 4.0), (x: 6.0, y: 6.0), (x: 4.0, y: 6.0), (x: 4.0, y: 4.0)]]
        );
        let features = vec![CountryFeature::new("R", "ring", MultiPolygon::new(vec![ring]), 4326)];
        assert_eq!(locate_id(&features, 5.0, 5.0), None);
        assert_eq!(locate_id(&features, 2.0, 2.0).as_deref(), Some("R"));
    }

    #[test]
    fn test_web_mercator_feature() {
        // Carré 0..1 000 000 m en Web Mercator, soit environ 0..8.98° de longitude
        let features = vec![square("M", 0.0, 0.0, 1_000_000.0, 1_000_000.0, 3857)];
        assert_eq!(locate_id(&features, 5.0, 5.0).as_deref(), Some("M"));
        assert_eq!(locate_id(&features, 10.0, 5.0), None);
    }

    #[cfg(not(feature = "reproject"))]
    #[test]
    fn test_unreachable_crs_is_excluded() {
        let features = vec![
            square("X", -180.0, -90.0, 180.0, 90.0, 27572),
            square("A", 0.0, 40.0, 20.0, 60.0, 4326),
        ];
        let attributor = SpatialAttributor::new(&features, WGS84_EPSG);
        assert!(!attributor.is_reachable(WGS84_EPSG, 27572));
        assert_eq!(locate_id(&features, 10.0, 50.0).as_deref(), Some("A"));
    }

    #[test]
    fn test_non_finite_point() {
        let features = vec![square("A", 0.0, 40.0, 20.0, 60.0, 4326)];
        assert_eq!(locate_id(&features, f64::NAN, 50.0), None);
    }
}
