//! Projection Web Mercator (EPSG:3857)
//!
//! Modèle sphérique sur le rayon équatorial WGS84, utilisé par la plupart des
//! services de tuiles et par les services d'entités ArcGIS (wkid 102100).

use super::ellipsoid::WGS84;
use super::Geographic;

/// Latitude maximale représentable (carré du monde)
const MAX_LATITUDE_DEG: f64 = 85.051_128_779_806_59;

/// Coordonnées géographiques vers Web Mercator
pub fn geographic_to_web_mercator(geo: Geographic) -> (f64, f64) {
    let r = WGS84.a;
    let max_lat = MAX_LATITUDE_DEG.to_radians();
    let lat = geo.lat.clamp(-max_lat, max_lat);

    let x = r * geo.lon;
    let y = r * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();

    (x, y)
}

/// Web Mercator vers coordonnées géographiques
pub fn web_mercator_to_geographic(x: f64, y: f64) -> Geographic {
    let r = WGS84.a;
    let lon = x / r;
    let lat = 2.0 * (y / r).exp().atan() - std::f64::consts::FRAC_PI_2;

    Geographic::new(lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paris_to_web_mercator() {
        let (x, y) = geographic_to_web_mercator(Geographic::from_degrees(2.35, 48.85));

        assert!((x - 261600.0).abs() < 1000.0, "x={}", x);
        assert!((y - 6250000.0).abs() < 10000.0, "y={}", y);
    }

    #[test]
    fn test_roundtrip() {
        let (x, y) = geographic_to_web_mercator(Geographic::from_degrees(-73.98, 40.75));
        let (lon, lat) = web_mercator_to_geographic(x, y).to_degrees();

        assert!((lon + 73.98).abs() < 1e-9, "lon={}", lon);
        assert!((lat - 40.75).abs() < 1e-9, "lat={}", lat);
    }

    #[test]
    fn test_pole_is_clamped() {
        let (_, y) = geographic_to_web_mercator(Geographic::from_degrees(0.0, 90.0));
        assert!(y.is_finite());
        assert!((y - 20037508.34).abs() < 1.0, "y={}", y);
    }
}
