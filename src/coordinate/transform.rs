//! Coordinate transformation between EPSG codes
//!
//! Transformations run through `proj4rs`. Geographic systems take and
//! return degrees at this API; `proj4rs` itself works in radians, so the
//! conversion happens here on the way in and out.

use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use super::bbox::BoundingBox;
use super::crs::Crs;
use crate::error::{CrsError, CrsResult};

/// Reusable transformer from one CRS to another
///
/// Building a transformer parses both PROJ definitions once; callers that
/// project many points (the warper) should hold on to it.
pub struct CoordinateTransformer {
    source: Crs,
    target: Crs,
    projections: Option<(Proj, Proj)>,
}

impl CoordinateTransformer {
    /// Creates a transformer; equal systems give an identity transformer
    pub fn new(source: &Crs, target: &Crs) -> CrsResult<Self> {
        let projections = if source == target {
            None
        } else {
            Some((parse_proj(source)?, parse_proj(target)?))
        };

        Ok(CoordinateTransformer {
            source: source.clone(),
            target: target.clone(),
            projections,
        })
    }

    pub fn source(&self) -> &Crs {
        &self.source
    }

    pub fn target(&self) -> &Crs {
        &self.target
    }

    pub fn is_identity(&self) -> bool {
        self.projections.is_none()
    }

    /// Transforms a single point
    ///
    /// # Errors
    /// `CrsError::Transform` if the projection fails or yields a
    /// non-finite coordinate (for example a pole in Web Mercator)
    pub fn transform(&self, x: f64, y: f64) -> CrsResult<(f64, f64)> {
        let (source_proj, target_proj) = match &self.projections {
            None => return Ok((x, y)),
            Some(pair) => pair,
        };

        let mut point = if self.source.is_geographic() {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        transform(source_proj, target_proj, &mut point).map_err(|e| {
            CrsError::Transform(format!(
                "({}, {}) from {} to {}: {:?}",
                x, y, self.source, self.target, e
            ))
        })?;

        let (out_x, out_y) = if self.target.is_geographic() {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        if !out_x.is_finite() || !out_y.is_finite() {
            return Err(CrsError::Transform(format!(
                "({}, {}) has no finite image in {}",
                x, y, self.target
            )));
        }
        Ok((out_x, out_y))
    }

    /// Transforms the two defining corners of a box independently
    ///
    /// The result is built from the transformed minimum and maximum corners
    /// as-is; for the conformal targets used for display this preserves
    /// the corner ordering.
    pub fn transform_bbox(&self, bbox: &BoundingBox) -> CrsResult<BoundingBox> {
        let (min_x, min_y) = self.transform(bbox.min_x, bbox.min_y)?;
        let (max_x, max_y) = self.transform(bbox.max_x, bbox.max_y)?;
        Ok(BoundingBox::new(min_x, min_y, max_x, max_y))
    }
}

fn parse_proj(crs: &Crs) -> CrsResult<Proj> {
    Proj::from_proj_string(crs.proj4())
        .map_err(|e| CrsError::UnsupportedCrs(format!("cannot build projection for {}: {:?}", crs, e)))
}

/// Transforms a point between two systems
pub fn reproject_point(x: f64, y: f64, source: &Crs, target: &Crs) -> CrsResult<(f64, f64)> {
    CoordinateTransformer::new(source, target)?.transform(x, y)
}

/// Transforms a bounding box by its two corners
pub fn reproject_bbox(bounds: &BoundingBox, source: &Crs, target: &Crs) -> CrsResult<BoundingBox> {
    CoordinateTransformer::new(source, target)?.transform_bbox(bounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::crs::{WEB_MERCATOR, WGS84};

    const EARTH_RADIUS: f64 = 6378137.0;

    fn mercator(lon: f64, lat: f64) -> (f64, f64) {
        let x = lon.to_radians() * EARTH_RADIUS;
        let y = (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln() * EARTH_RADIUS;
        (x, y)
    }

    #[test]
    fn test_identity_returns_input_exactly() {
        let crs = Crs::from_epsg(2180).unwrap();
        let transformer = CoordinateTransformer::new(&crs, &crs).unwrap();
        assert!(transformer.is_identity());
        assert_eq!(transformer.transform(500000.25, 300000.75).unwrap(), (500000.25, 300000.75));
    }

    #[test]
    fn test_wgs84_bbox_to_web_mercator() {
        let wgs84 = Crs::from_epsg(WGS84).unwrap();
        let bounds = BoundingBox::new(14.0, 50.0, 14.1, 50.1);
        let projected = reproject_bbox(&bounds, &wgs84, &Crs::web_mercator()).unwrap();

        let (min_x, min_y) = mercator(14.0, 50.0);
        let (max_x, max_y) = mercator(14.1, 50.1);
        assert!(projected.approx_eq(&BoundingBox::new(min_x, min_y, max_x, max_y), 0.01));
        assert!(projected.min_x < projected.max_x && projected.min_y < projected.max_y);
    }

    #[test]
    fn test_round_trip_through_web_mercator() {
        let wgs84 = Crs::from_epsg(WGS84).unwrap();
        let mercator_crs = Crs::from_epsg(WEB_MERCATOR).unwrap();

        let (x, y) = reproject_point(21.0, 52.2, &wgs84, &mercator_crs).unwrap();
        let (lon, lat) = reproject_point(x, y, &mercator_crs, &wgs84).unwrap();
        assert!((lon - 21.0).abs() < 1e-9);
        assert!((lat - 52.2).abs() < 1e-9);
    }

    #[test]
    fn test_utm_to_wgs84_lands_in_zone() {
        let utm33 = Crs::from_epsg(32633).unwrap();
        let wgs84 = Crs::from_epsg(WGS84).unwrap();

        // False easting of the zone sits on the central meridian (15E)
        let (lon, lat) = reproject_point(500000.0, 5540000.0, &utm33, &wgs84).unwrap();
        assert!((lon - 15.0).abs() < 1e-6);
        assert!(lat > 49.0 && lat < 51.0);
    }
}
