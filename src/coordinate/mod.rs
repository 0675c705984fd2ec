//! Coordinate handling for geospatial data
//!
//! Bounding boxes, coordinate reference systems, affine geotransforms and
//! point/bbox reprojection between EPSG codes.

pub mod bbox;
pub mod crs;
pub mod geotransform;
pub mod transform;

pub use self::bbox::BoundingBox;
pub use self::crs::{Crs, CrsKind};
pub use self::geotransform::GeoTransform;
pub use self::transform::{reproject_bbox, reproject_point, CoordinateTransformer};
