//! Handler for Deflate compressed data

use std::io::Read;

use flate2::read::ZlibDecoder;

use super::handler::CompressionHandler;
use crate::error::{FormatError, FormatResult};
use crate::tiff::constants::compression;

/// Deflate (zlib) handler for both the Adobe code (8) and the legacy code (32946)
pub struct DeflateHandler {
    code: u16,
}

impl DeflateHandler {
    pub fn new(code: u16) -> Self {
        DeflateHandler { code }
    }
}

impl Default for DeflateHandler {
    fn default() -> Self {
        DeflateHandler::new(compression::ADOBE_DEFLATE)
    }
}

impl CompressionHandler for DeflateHandler {
    fn decompress(&self, data: &[u8]) -> FormatResult<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| FormatError::NotARaster(format!("corrupt deflate chunk: {}", e)))?;
        Ok(decompressed)
    }

    fn name(&self) -> &'static str {
        "Deflate"
    }

    fn code(&self) -> u16 {
        self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_decompress_zlib_stream() {
        let original: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&original).unwrap();
        let compressed = encoder.finish().unwrap();

        let handler = DeflateHandler::default();
        assert_eq!(handler.decompress(&compressed).unwrap(), original);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let handler = DeflateHandler::default();
        assert!(matches!(
            handler.decompress(&[1, 2, 3, 4, 5]),
            Err(FormatError::NotARaster(_))
        ));
    }
}
