//! Transformation de points via PROJ, pour les systèmes hors reproject_lite
//!
//! Disponible avec le feature `reproject`.

use std::fmt;

use anyhow::{Context, Result};
use geo::Point;
use proj::Proj;

pub struct ProjTransform {
    proj: Proj,
    source_epsg: u32,
    target_epsg: u32,
}

impl fmt::Debug for ProjTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjTransform")
            .field("source_epsg", &self.source_epsg)
            .field("target_epsg", &self.target_epsg)
            .finish_non_exhaustive()
    }
}

impl ProjTransform {
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        let proj = Proj::new_known_crs(
            &format!("EPSG:{}", source_epsg),
            &format!("EPSG:{}", target_epsg),
            None,
        )
        .with_context(|| format!("No PROJ pipeline for EPSG:{} -> EPSG:{}", source_epsg, target_epsg))?;

        Ok(Self {
            proj,
            source_epsg,
            target_epsg,
        })
    }

    /// x = longitude ou est, y = latitude ou nord
    pub fn apply(&self, point: Point<f64>) -> Result<Point<f64>> {
        let (x, y) = self
            .proj
            .convert((point.x(), point.y()))
            .context("PROJ transformation failed")?;
        Ok(Point::new(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_mercator_origin() {
        // Mercator ellipsoïdal, hors reproject_lite
        let t = ProjTransform::new(4326, 3395).unwrap();
        let p = t.apply(Point::new(0.0, 0.0)).unwrap();
        assert!(p.x().abs() < 1.0 && p.y().abs() < 1.0, "{:?}", p);
    }

    #[test]
    fn test_unknown_code() {
        assert!(ProjTransform::new(99999, 4326).is_err());
    }
}
