//! Factory for creating compression handlers

use super::deflate::DeflateHandler;
use super::handler::{CompressionHandler, TileEncoder};
use super::jpeg::{JpegHandler, JpegTileEncoder};
use super::lzw::LzwHandler;
use super::uncompressed::UncompressedHandler;
use super::zstd::ZstdHandler;
use crate::error::{FormatError, FormatResult};
use crate::tiff::constants::compression;

/// Factory for creating compression handlers
pub struct CompressionFactory;

impl CompressionFactory {
    /// Create a decoder for the given compression code
    ///
    /// # Errors
    /// `FormatError::UnsupportedCompression` for codes without a decoder
    pub fn create_handler(code: u64) -> FormatResult<Box<dyn CompressionHandler>> {
        let code16 = u16::try_from(code).map_err(|_| FormatError::UnsupportedCompression(code))?;
        match code16 {
            compression::NONE => Ok(Box::new(UncompressedHandler)),
            compression::LZW => Ok(Box::new(LzwHandler)),
            compression::ADOBE_DEFLATE | compression::DEFLATE => Ok(Box::new(DeflateHandler::new(code16))),
            compression::ZSTD => Ok(Box::new(ZstdHandler)),
            compression::JPEG => Ok(Box::new(JpegHandler)),
            _ => Err(FormatError::UnsupportedCompression(code)),
        }
    }

    /// Whether `create_handler` would succeed for this code
    pub fn is_supported(code: u64) -> bool {
        Self::create_handler(code).is_ok()
    }

    /// Encoder for output tiles at the given JPEG quality
    pub fn create_tile_encoder(quality: u8) -> Box<dyn TileEncoder> {
        Box::new(JpegTileEncoder::new(quality))
    }
}
