//! Projection Lambert 93 (EPSG:2154)
//!
//! Conique conforme de Lambert à 2 parallèles standards sur GRS80.

use super::ellipsoid::GRS80;
use super::Geographic;

/// Paramètres Lambert 93
struct Lambert93 {
    lon0: f64,
    lat0: f64,
    lat1: f64,
    lat2: f64,
    x0: f64,
    y0: f64,
}

const LAMBERT93: Lambert93 = Lambert93 {
    lon0: 3.0 * std::f64::consts::PI / 180.0,
    lat0: 46.5 * std::f64::consts::PI / 180.0,
    lat1: 44.0 * std::f64::consts::PI / 180.0,
    lat2: 49.0 * std::f64::consts::PI / 180.0,
    x0: 700000.0,
    y0: 6600000.0,
};

/// Constantes dérivées de la projection
struct Cone {
    /// Exposant
    n: f64,
    /// Constante C
    c: f64,
    /// Rayon à l'origine
    r0: f64,
}

fn cone() -> Cone {
    let p = &LAMBERT93;
    let (a, e, e2) = (GRS80.a, GRS80.e(), GRS80.e2());

    let n1 = grande_normale(p.lat1, a, e2);
    let n2 = grande_normale(p.lat2, a, e2);
    let iso1 = isometric_latitude(p.lat1, e);
    let iso2 = isometric_latitude(p.lat2, e);
    let iso0 = isometric_latitude(p.lat0, e);

    let n = ((n1 * p.lat1.cos()).ln() - (n2 * p.lat2.cos()).ln()) / (iso2 - iso1);
    let c = (n1 * p.lat1.cos() / n) * (n * iso1).exp();
    let r0 = c * (-n * iso0).exp();

    Cone { n, c, r0 }
}

/// Latitude isométrique
fn isometric_latitude(lat: f64, e: f64) -> f64 {
    let sin_lat = lat.sin();
    let term = ((1.0 - e * sin_lat) / (1.0 + e * sin_lat)).powf(e / 2.0);
    ((std::f64::consts::FRAC_PI_4 + lat / 2.0).tan() * term).ln()
}

/// Latitude depuis la latitude isométrique (itératif)
fn latitude_from_isometric(iso_lat: f64, e: f64) -> f64 {
    let mut lat = 2.0 * iso_lat.exp().atan() - std::f64::consts::FRAC_PI_2;

    for _ in 0..10 {
        let sin_lat = lat.sin();
        let term = ((1.0 + e * sin_lat) / (1.0 - e * sin_lat)).powf(e / 2.0);
        let next = 2.0 * (iso_lat.exp() * term).atan() - std::f64::consts::FRAC_PI_2;

        if (next - lat).abs() < 1e-12 {
            return next;
        }
        lat = next;
    }
    lat
}

/// Grande normale
fn grande_normale(lat: f64, a: f64, e2: f64) -> f64 {
    a / (1.0 - e2 * lat.sin().powi(2)).sqrt()
}

/// Géographique vers Lambert 93
pub fn geographic_to_lambert93(geo: Geographic) -> (f64, f64) {
    let p = &LAMBERT93;
    let Cone { n, c, r0 } = cone();

    let r = c * (-n * isometric_latitude(geo.lat, GRS80.e())).exp();
    let gamma = n * (geo.lon - p.lon0);

    (p.x0 + r * gamma.sin(), p.y0 + r0 - r * gamma.cos())
}

/// Lambert 93 vers géographique
pub fn lambert93_to_geographic(x: f64, y: f64) -> Geographic {
    let p = &LAMBERT93;
    let Cone { n, c, r0 } = cone();

    let dx = x - p.x0;
    let dy = y - p.y0;

    let r = (dx.powi(2) + (r0 - dy).powi(2)).sqrt();
    let r = if n < 0.0 { -r } else { r };
    let gamma = (dx / (r0 - dy)).atan();

    let iso_lat = -(r / c).ln() / n;
    let lat = latitude_from_isometric(iso_lat, GRS80.e());
    let lon = p.lon0 + gamma / n;

    Geographic::new(lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eiffel_tower_inverse() {
        let (lon, lat) = lambert93_to_geographic(648237.0, 6862107.0).to_degrees();

        assert!((lon - 2.2945).abs() < 0.01, "lon={}", lon);
        assert!((lat - 48.8584).abs() < 0.01, "lat={}", lat);
    }

    #[test]
    fn test_origin_maps_to_false_origin() {
        let (x, y) = geographic_to_lambert93(Geographic::from_degrees(3.0, 46.5));

        assert!((x - 700000.0).abs() < 0.01, "x={}", x);
        assert!((y - 6600000.0).abs() < 0.01, "y={}", y);
    }

    #[test]
    fn test_marseille_roundtrip() {
        let (x, y) = geographic_to_lambert93(Geographic::from_degrees(5.37, 43.30));
        let (lon, lat) = lambert93_to_geographic(x, y).to_degrees();

        assert!((lon - 5.37).abs() < 1e-8, "lon={}", lon);
        assert!((lat - 43.30).abs() < 1e-8, "lat={}", lat);
    }
}
