//! Affine pixel-to-world transform
//!
//! Coefficients follow the usual six-term layout:
//! `x = origin_x + col * pixel_width + row * row_rotation`,
//! `y = origin_y + col * col_rotation + row * pixel_height`.

use super::bbox::BoundingBox;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform with square or rectangular pixels
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        GeoTransform {
            origin_x,
            pixel_width,
            row_rotation: 0.0,
            origin_y,
            col_rotation: 0.0,
            pixel_height,
        }
    }

    /// Identity mapping, used when a raster carries no georeferencing
    pub fn identity() -> Self {
        GeoTransform::north_up(0.0, 0.0, 1.0, 1.0)
    }

    pub fn from_coefficients(c: [f64; 6]) -> Self {
        GeoTransform {
            origin_x: c[0],
            pixel_width: c[1],
            row_rotation: c[2],
            origin_y: c[3],
            col_rotation: c[4],
            pixel_height: c[5],
        }
    }

    pub fn coefficients(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Maps fractional pixel coordinates to world coordinates
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }

    /// Inverse transform, or `None` if the matrix is singular
    pub fn invert(&self) -> Option<GeoTransform> {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det.abs() < f64::EPSILON * 1e-6 || !det.is_finite() {
            return None;
        }

        let a = self.pixel_height / det;
        let b = -self.row_rotation / det;
        let d = -self.col_rotation / det;
        let e = self.pixel_width / det;

        Some(GeoTransform {
            origin_x: -(a * self.origin_x + b * self.origin_y),
            pixel_width: a,
            row_rotation: b,
            origin_y: -(d * self.origin_x + e * self.origin_y),
            col_rotation: d,
            pixel_height: e,
        })
    }

    /// Whether the raster has no rotation terms
    pub fn is_north_up(&self) -> bool {
        self.row_rotation == 0.0 && self.col_rotation == 0.0
    }

    /// World extent covered by a `width` x `height` raster
    pub fn bounds(&self, width: u64, height: u64) -> BoundingBox {
        let (w, h) = (width as f64, height as f64);
        let corners = [self.apply(0.0, 0.0), self.apply(w, 0.0), self.apply(0.0, h), self.apply(w, h)];
        // Four corners are always present
        BoundingBox::enclosing(corners).unwrap_or_else(|| BoundingBox::new(0.0, 0.0, 0.0, 0.0))
    }
}
