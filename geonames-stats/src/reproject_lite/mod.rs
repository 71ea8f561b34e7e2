//! Reprojection légère en Rust pur (sans dépendances externes)
//!
//! Systèmes supportés, dans les deux sens :
//! - WGS84 (EPSG:4326)
//! - Web Mercator (EPSG:3857, alias 900913 / 102100)
//! - Lambert 93 (EPSG:2154)
//! - UTM WGS84 nord (EPSG:32601..32660) et sud (EPSG:32701..32760)

mod ellipsoid;
mod lambert;
mod mercator;
mod smart;
mod utm;

pub use ellipsoid::{Ellipsoid, GRS80, WGS84};
pub use smart::PointTransform;

use anyhow::{bail, Result};

/// Point en coordonnées géographiques (radians)
#[derive(Debug, Clone, Copy)]
pub struct Geographic {
    /// Longitude en radians
    pub lon: f64,
    /// Latitude en radians
    pub lat: f64,
}

impl Geographic {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Convertit en degrés
    pub fn to_degrees(self) -> (f64, f64) {
        (self.lon.to_degrees(), self.lat.to_degrees())
    }

    /// Crée depuis des degrés
    pub fn from_degrees(lon_deg: f64, lat_deg: f64) -> Self {
        Self {
            lon: lon_deg.to_radians(),
            lat: lat_deg.to_radians(),
        }
    }
}

/// Système de coordonnées connu de reproject_lite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    Wgs84,
    WebMercator,
    Lambert93,
    Utm { zone: u32, south: bool },
}

impl Crs {
    /// Résout un code EPSG
    pub fn from_epsg(epsg: u32) -> Option<Self> {
        match epsg {
            4326 => Some(Self::Wgs84),
            3857 | 900913 | 102100 => Some(Self::WebMercator),
            2154 => Some(Self::Lambert93),
            32601..=32660 => Some(Self::Utm {
                zone: epsg - 32600,
                south: false,
            }),
            32701..=32760 => Some(Self::Utm {
                zone: epsg - 32700,
                south: true,
            }),
            _ => None,
        }
    }

    fn unproject(self, x: f64, y: f64) -> Geographic {
        match self {
            Self::Wgs84 => Geographic::from_degrees(x, y),
            Self::WebMercator => mercator::web_mercator_to_geographic(x, y),
            Self::Lambert93 => lambert::lambert93_to_geographic(x, y),
            Self::Utm { zone, south } => utm::utm_to_geographic(x, y, zone, south),
        }
    }

    fn project(self, geo: Geographic) -> (f64, f64) {
        match self {
            Self::Wgs84 => geo.to_degrees(),
            Self::WebMercator => mercator::geographic_to_web_mercator(geo),
            Self::Lambert93 => lambert::geographic_to_lambert93(geo),
            Self::Utm { zone, south } => utm::geographic_to_utm(geo, zone, south),
        }
    }
}

/// Reprojection légère entre deux systèmes connus
#[derive(Debug, Clone, Copy)]
pub struct ReprojectorLite {
    source: Crs,
    target: Crs,
}

impl ReprojectorLite {
    /// Crée un nouveau reprojector
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        let Some(source) = Crs::from_epsg(source_epsg) else {
            bail!(
                "EPSG:{} non supporté. Supportés: 4326, 3857, 2154, 326zz, 327zz",
                source_epsg
            );
        };
        let Some(target) = Crs::from_epsg(target_epsg) else {
            bail!(
                "EPSG:{} non supporté. Supportés: 4326, 3857, 2154, 326zz, 327zz",
                target_epsg
            );
        };

        Ok(Self { source, target })
    }

    /// Vérifie si la reprojection est supportée
    pub fn is_supported(source: u32, target: u32) -> bool {
        Crs::from_epsg(source).is_some() && Crs::from_epsg(target).is_some()
    }

    /// Transforme un point (x, y) de la source vers la cible
    pub fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if !x.is_finite() || !y.is_finite() {
            bail!("Coordonnées non finies: ({}, {})", x, y);
        }

        // Source → Géographique → Cible
        let geo = self.source.unproject(x, y);
        let (tx, ty) = self.target.project(geo);

        if !tx.is_finite() || !ty.is_finite() {
            bail!("Reprojection hors domaine pour ({}, {})", x, y);
        }
        Ok((tx, ty))
    }
}
