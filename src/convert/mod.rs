//! Tiled-output conversion
//!
//! Turns a validated raster into an 8-bit, JPEG-compressed, tiled GeoTIFF
//! with overviews in the display CRS. Each band runs through the same
//! small pipeline: read, rescale to bytes, optionally warp; the bands are
//! then interleaved and written in one pass.

pub mod converter;
pub mod rescale;
pub mod warp;

pub use converter::{CogConverter, RasterConverter, TiledOutput, DEFAULT_TILE_SIZE};
pub use rescale::rescale_to_byte;
pub use warp::WarpPlan;
