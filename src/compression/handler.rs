//! Compression handler trait definitions

use crate::error::{ConversionResult, FormatResult};

/// Strategy trait for decoding compressed strips and tiles
pub trait CompressionHandler: Send + Sync {
    /// Decompress one chunk
    fn decompress(&self, data: &[u8]) -> FormatResult<Vec<u8>>;

    /// Get the name of this compression method
    fn name(&self) -> &'static str;

    /// Get the compression code
    fn code(&self) -> u16;
}

/// Strategy trait for encoding 8-bit output tiles
pub trait TileEncoder: Send + Sync {
    /// Encode a full tile of interleaved 8-bit samples
    ///
    /// # Arguments
    /// * `pixels` - `width * height * samples` bytes, row-major, chunky
    /// * `width`, `height` - Tile dimensions in pixels
    /// * `samples` - Samples per pixel
    fn encode_tile(&self, pixels: &[u8], width: u32, height: u32, samples: usize) -> ConversionResult<Vec<u8>>;

    /// Compression code written to the TIFF directory
    fn code(&self) -> u16;

    /// Photometric interpretation matching the encoded stream
    fn photometric(&self, samples: usize) -> u16;

    fn name(&self) -> &'static str;
}
