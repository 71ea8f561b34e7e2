//! Choix de la transformation d'un point vers le système d'un pays

use anyhow::Result;
use geo::Point;

use super::ReprojectorLite;

/// Transformation d'un point vers un système cible
///
/// Rust pur quand les deux systèmes sont connus, PROJ sinon (feature `reproject`).
#[derive(Debug)]
pub enum PointTransform {
    /// Même système
    Identity,
    Lite(ReprojectorLite),
    /// `Proj` n'est pas `Sync`, d'où le verrou
    #[cfg(feature = "reproject")]
    Proj(std::sync::Mutex<crate::reproject::ProjTransform>),
}

impl PointTransform {
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        if source_epsg == target_epsg {
            return Ok(Self::Identity);
        }
        if ReprojectorLite::is_supported(source_epsg, target_epsg) {
            return ReprojectorLite::new(source_epsg, target_epsg).map(Self::Lite);
        }
        Self::fallback(source_epsg, target_epsg)
    }

    #[cfg(feature = "reproject")]
    fn fallback(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        let proj = crate::reproject::ProjTransform::new(source_epsg, target_epsg)?;
        Ok(Self::Proj(std::sync::Mutex::new(proj)))
    }

    #[cfg(not(feature = "reproject"))]
    fn fallback(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        anyhow::bail!(
            "EPSG:{} -> EPSG:{} unavailable without the `reproject` feature",
            source_epsg,
            target_epsg
        )
    }

    /// Point exprimé dans le système cible
    pub fn apply(&self, point: Point<f64>) -> Result<Point<f64>> {
        match self {
            Self::Identity => Ok(point),
            Self::Lite(lite) => lite.transform_point(point.x(), point.y()).map(Point::from),
            #[cfg(feature = "reproject")]
            Self::Proj(proj) => proj
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .apply(point),
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Lite(_) => "lite",
            #[cfg(feature = "reproject")]
            Self::Proj(_) => "proj",
        }
    }
}
