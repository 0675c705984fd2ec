//! Compression handling for TIFF files
//!
//! Decoders for the chunk compressions accepted on input, and the JPEG
//! encoder used for output tiles.

mod handler;
mod uncompressed;
mod deflate;
mod factory;
mod lzw;
mod zstd;
mod jpeg;

pub use handler::{CompressionHandler, TileEncoder};
pub use uncompressed::UncompressedHandler;
pub use deflate::DeflateHandler;
pub use factory::CompressionFactory;
pub use lzw::LzwHandler;
pub use zstd::ZstdHandler;
pub use jpeg::{JpegHandler, JpegTileEncoder, DEFAULT_JPEG_QUALITY};
