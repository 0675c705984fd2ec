//! Bounding box structure for raster extents

use std::fmt;
use std::str::FromStr;

/// An axis-aligned extent in some coordinate system
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox { min_x, min_y, max_x, max_y }
    }

    /// Smallest box enclosing all given points, or `None` for no points
    pub fn enclosing<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        points.into_iter().fold(None, |acc, (x, y)| {
            Some(match acc {
                None => BoundingBox::new(x, y, x, y),
                Some(b) => BoundingBox::new(b.min_x.min(x), b.min_y.min(y), b.max_x.max(x), b.max_y.max(y)),
            })
        })
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Length of the diagonal from the min corner to the max corner
    pub fn diagonal(&self) -> f64 {
        self.width().hypot(self.height())
    }

    /// Whether every component is finite
    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite() && self.min_y.is_finite() && self.max_x.is_finite() && self.max_y.is_finite()
    }

    /// Component-wise comparison within an absolute tolerance
    pub fn approx_eq(&self, other: &BoundingBox, tolerance: f64) -> bool {
        (self.min_x - other.min_x).abs() <= tolerance
            && (self.min_y - other.min_y).abs() <= tolerance
            && (self.max_x - other.max_x).abs() <= tolerance
            && (self.max_y - other.max_y).abs() <= tolerance
    }
}

/// Renders as `minx,miny,maxx,maxy`
impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

/// Parses `minx,miny,maxx,maxy`
impl FromStr for BoundingBox {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 4 {
            return Err(format!("Bounding box must have 4 comma-separated values, got '{}'", s));
        }

        let mut values = [0.0f64; 4];
        for (slot, (part, name)) in values
            .iter_mut()
            .zip(parts.iter().zip(["min_x", "min_y", "max_x", "max_y"]))
        {
            *slot = part
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("Invalid {} value '{}'", name, part.trim()))?;
        }

        Ok(BoundingBox::new(values[0], values[1], values[2], values[3]))
    }
}
