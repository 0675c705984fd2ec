//! Nearest-neighbour reprojection of a raster grid
//!
//! A `WarpPlan` is computed once per conversion: it fixes the destination
//! grid and records, for every destination pixel, which source pixel it
//! samples. Applying the plan to a band is then a plain gather, so every
//! band of a raster is warped identically.

use log::{debug, warn};

use crate::coordinate::{BoundingBox, CoordinateTransformer, GeoTransform};
use crate::error::{ConversionError, ConversionResult, CrsError};

/// Points sampled along each edge of the source raster
const EDGE_SAMPLES: usize = 21;

/// Marks destination pixels outside the source footprint
const OUTSIDE: u32 = u32::MAX;

/// Destination grid plus the source index behind each of its pixels
#[derive(Debug, Clone)]
pub struct WarpPlan {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    lookup: Vec<u32>,
}

impl WarpPlan {
    /// Plans the warp of a `src_width` x `src_height` grid
    ///
    /// # Arguments
    /// * `src_transform` - Pixel-to-world transform of the source
    /// * `forward` - Source CRS to target CRS
    /// * `inverse` - Target CRS back to the source CRS
    ///
    /// The destination extent is the envelope of the densified source
    /// edges; its resolution keeps the pixel count along the diagonal.
    pub fn plan(
        src_width: usize,
        src_height: usize,
        src_transform: &GeoTransform,
        forward: &CoordinateTransformer,
        inverse: &CoordinateTransformer,
    ) -> ConversionResult<Self> {
        let extent = Self::target_extent(src_width, src_height, src_transform, forward)?;

        let src_diagonal = ((src_width * src_width + src_height * src_height) as f64).sqrt();
        let resolution = extent.diagonal() / src_diagonal;
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(ConversionError::Reproject(CrsError::Transform(format!(
                "degenerate target extent {}",
                extent
            ))));
        }

        let width = ((extent.width() / resolution).ceil() as usize).max(1);
        let height = ((extent.height() / resolution).ceil() as usize).max(1);
        let transform = GeoTransform::north_up(extent.min_x, extent.max_y, resolution, -resolution);
        debug!(
            "Warp plan: {}x{} -> {}x{} at {:.6} units/pixel",
            src_width, src_height, width, height, resolution
        );

        let lookup = Self::build_lookup(width, height, &transform, src_width, src_height, src_transform, inverse)?;
        Ok(WarpPlan {
            width,
            height,
            transform,
            lookup,
        })
    }

    /// Envelope of the projected source edges
    fn target_extent(
        src_width: usize,
        src_height: usize,
        src_transform: &GeoTransform,
        forward: &CoordinateTransformer,
    ) -> ConversionResult<BoundingBox> {
        let (w, h) = (src_width as f64, src_height as f64);
        let mut edge_points = Vec::with_capacity(EDGE_SAMPLES * 4);
        for i in 0..EDGE_SAMPLES {
            let t = i as f64 / (EDGE_SAMPLES - 1) as f64;
            edge_points.push((t * w, 0.0));
            edge_points.push((t * w, h));
            edge_points.push((0.0, t * h));
            edge_points.push((w, t * h));
        }

        let projected = edge_points
            .into_iter()
            .map(|(col, row)| src_transform.apply(col, row))
            .filter_map(|(x, y)| forward.transform(x, y).ok());

        BoundingBox::enclosing(projected).ok_or_else(|| {
            ConversionError::Reproject(CrsError::Transform(format!(
                "no edge of the source projects into {}",
                forward.target()
            )))
        })
    }

    fn build_lookup(
        width: usize,
        height: usize,
        transform: &GeoTransform,
        src_width: usize,
        src_height: usize,
        src_transform: &GeoTransform,
        inverse: &CoordinateTransformer,
    ) -> ConversionResult<Vec<u32>> {
        let to_source_pixel = src_transform.invert().ok_or_else(|| {
            ConversionError::Reproject(CrsError::Transform("source geotransform is not invertible".to_string()))
        })?;

        let mut lookup = vec![OUTSIDE; width * height];
        let mut outside = 0usize;
        for row in 0..height {
            for col in 0..width {
                let (x, y) = transform.apply(col as f64 + 0.5, row as f64 + 0.5);
                let index = inverse
                    .transform(x, y)
                    .ok()
                    .map(|(sx, sy)| to_source_pixel.apply(sx, sy))
                    .and_then(|(c, r)| source_index(c, r, src_width, src_height));
                match index {
                    Some(index) => lookup[row * width + col] = index,
                    None => outside += 1,
                }
            }
        }

        if outside == lookup.len() {
            warn!("No destination pixel maps back into the source raster");
        }
        Ok(lookup)
    }

    /// Samples a band through the plan; pixels outside the source are 0
    pub fn apply(&self, band: &[u8]) -> Vec<u8> {
        self.lookup
            .iter()
            .map(|&index| if index == OUTSIDE { 0 } else { band[index as usize] })
            .collect()
    }

    /// Destination pixels that sample the source
    pub fn covered_pixels(&self) -> usize {
        self.lookup.iter().filter(|&&index| index != OUTSIDE).count()
    }
}

fn source_index(col: f64, row: f64, width: usize, height: usize) -> Option<u32> {
    if !(col >= 0.0 && row >= 0.0) {
        return None;
    }
    let (c, r) = (col.floor() as usize, row.floor() as usize);
    if c >= width || r >= height {
        return None;
    }
    u32::try_from(r * width + c).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::Crs;

    fn transformers(source: u32, target: u32) -> (CoordinateTransformer, CoordinateTransformer) {
        let source = Crs::from_epsg(source).unwrap();
        let target = Crs::from_epsg(target).unwrap();
        (
            CoordinateTransformer::new(&source, &target).unwrap(),
            CoordinateTransformer::new(&target, &source).unwrap(),
        )
    }

    #[test]
    fn test_identity_plan_keeps_grid() {
        let (forward, inverse) = transformers(3857, 3857);
        let src = GeoTransform::north_up(1000.0, 2000.0, 10.0, -10.0);
        let plan = WarpPlan::plan(4, 2, &src, &forward, &inverse).unwrap();

        assert_eq!((plan.width, plan.height), (4, 2));
        assert_eq!(plan.covered_pixels(), 8);
        let band: Vec<u8> = (1..=8).collect();
        assert_eq!(plan.apply(&band), band);
    }

    #[test]
    fn test_geographic_to_mercator_plan() {
        let (forward, inverse) = transformers(4326, 3857);
        let src = GeoTransform::north_up(14.0, 50.1, 0.001, -0.001);
        let plan = WarpPlan::plan(100, 100, &src, &forward, &inverse).unwrap();

        // Mercator stretches latitude by 1/cos(50 deg)
        assert!(plan.height > plan.width);
        assert!((70..=85).contains(&plan.width), "width {}", plan.width);
        assert!((110..=125).contains(&plan.height), "height {}", plan.height);
        assert!((plan.transform.origin_x - 1558472.87).abs() < 1.0);
        assert!((plan.transform.origin_y - 6463612.12).abs() < 1.0);

        // Nearly the whole destination lies inside the source
        assert!(plan.covered_pixels() as f64 > 0.95 * (plan.width * plan.height) as f64);
    }

    #[test]
    fn test_apply_samples_nearest_source_pixel() {
        let (forward, inverse) = transformers(4326, 3857);
        let src = GeoTransform::north_up(14.0, 50.1, 0.05, -0.05);
        let plan = WarpPlan::plan(2, 2, &src, &forward, &inverse).unwrap();

        let warped = plan.apply(&[10, 20, 30, 40]);
        assert_eq!(warped.len(), plan.width * plan.height);
        assert_eq!(warped[0], 10);
        assert!(warped.contains(&40));
        assert!(warped.iter().all(|v| [0, 10, 20, 30, 40].contains(v)));
    }

    #[test]
    fn test_source_index_bounds() {
        assert_eq!(source_index(0.2, 0.9, 3, 2), Some(0));
        assert_eq!(source_index(2.9, 1.0, 3, 2), Some(5));
        assert_eq!(source_index(3.0, 0.0, 3, 2), None);
        assert_eq!(source_index(-0.1, 0.0, 3, 2), None);
        assert_eq!(source_index(f64::NAN, 0.0, 3, 2), None);
    }
}
