//! Pass-through for strips and tiles stored without compression

use super::handler::CompressionHandler;
use crate::error::FormatResult;
use crate::tiff::constants::compression;

/// Compression code 1: chunk bytes are the samples themselves
pub struct UncompressedHandler;

impl CompressionHandler for UncompressedHandler {
    fn code(&self) -> u16 {
        compression::NONE
    }

    fn name(&self) -> &'static str {
        "None"
    }

    fn decompress(&self, data: &[u8]) -> FormatResult<Vec<u8>> {
        Ok(data.to_vec())
    }
}
