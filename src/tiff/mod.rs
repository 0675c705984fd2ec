//! TIFF file format module
//!
//! Reading TIFF/BigTIFF directories and samples, GeoTIFF georeferencing,
//! and writing tiled JPEG GeoTIFF output.

pub mod constants;
pub mod decoder;
pub mod geo_keys;
pub mod ifd;
pub mod reader;
pub mod types;
pub mod writer;
#[cfg(test)]
pub(crate) mod tests;

pub use crate::io::byte_order::{ByteOrder, ByteOrderHandler};
pub use decoder::{BandDecoder, PixelType, SampleLayout};
pub use geo_keys::{DeclaredCrs, GeoReference};
pub use ifd::{IFDEntry, TagValue, IFD};
pub use reader::TiffReader;
pub use types::TIFF;
pub use writer::{EncodedLevel, TiledTiffWriter};
