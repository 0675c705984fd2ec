//! Handler for ZSTD compressed data

use log::warn;

use super::handler::CompressionHandler;
use crate::error::{FormatError, FormatResult};
use crate::tiff::constants::compression;

/// ZSTD compression handler (compression code 50000)
pub struct ZstdHandler;

impl CompressionHandler for ZstdHandler {
    fn decompress(&self, data: &[u8]) -> FormatResult<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }

        zstd::decode_all(data).map_err(|e| {
            warn!("ZSTD decompression error: {}", e);
            FormatError::NotARaster(format!("corrupt zstd chunk: {}", e))
        })
    }

    fn name(&self) -> &'static str {
        "ZSTD"
    }

    fn code(&self) -> u16 {
        compression::ZSTD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decompress_frame() {
        let original = vec![7u8; 10_000];
        let compressed = zstd::encode_all(&original[..], 3).unwrap();
        assert_eq!(ZstdHandler.decompress(&compressed).unwrap(), original);
    }
}
