//! JPEG tiles: encoder for output, decoder for reading them back
//!
//! Three-band tiles are written as a YCbCr JPEG stream without chroma
//! subsampling, so the TIFF directory declares photometric YCbCr with a
//! 1x1 subsampling factor. Single-band tiles are plain greyscale JPEG.
//! The decoder handles self-contained streams only (no shared
//! `JPEGTables`), which is what the encoder produces.

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageFormat};

use super::handler::{CompressionHandler, TileEncoder};
use crate::error::{ConversionError, ConversionResult, FormatError, FormatResult};
use crate::tiff::constants::{compression, photometric};

/// JPEG quality used when none is configured
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

pub struct JpegTileEncoder {
    quality: u8,
}

impl JpegTileEncoder {
    pub fn new(quality: u8) -> Self {
        JpegTileEncoder {
            quality: quality.clamp(1, 100),
        }
    }
}

impl Default for JpegTileEncoder {
    fn default() -> Self {
        JpegTileEncoder::new(DEFAULT_JPEG_QUALITY)
    }
}

impl TileEncoder for JpegTileEncoder {
    fn encode_tile(&self, pixels: &[u8], width: u32, height: u32, samples: usize) -> ConversionResult<Vec<u8>> {
        let color = match samples {
            1 => ExtendedColorType::L8,
            3 => ExtendedColorType::Rgb8,
            n => return Err(ConversionError::UnsupportedBandCount(n)),
        };

        let expected = width as usize * height as usize * samples;
        if pixels.len() != expected {
            return Err(ConversionError::Encode(format!(
                "tile buffer holds {} bytes, expected {}",
                pixels.len(),
                expected
            )));
        }

        let mut encoded = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut encoded, self.quality);
        encoder
            .encode(pixels, width, height, color)
            .map_err(|e| ConversionError::Encode(e.to_string()))?;
        Ok(encoded)
    }

    fn code(&self) -> u16 {
        compression::JPEG
    }

    fn photometric(&self, samples: usize) -> u16 {
        if samples == 3 {
            photometric::YCBCR
        } else {
            photometric::BLACK_IS_ZERO
        }
    }

    fn name(&self) -> &'static str {
        "JPEG"
    }
}

/// Decoder for JPEG chunks (compression code 7)
///
/// Greyscale streams yield one sample per pixel; colour streams are
/// converted to interleaved RGB.
pub struct JpegHandler;

impl CompressionHandler for JpegHandler {
    fn decompress(&self, data: &[u8]) -> FormatResult<Vec<u8>> {
        let image = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
            .map_err(|e| FormatError::NotARaster(format!("corrupt JPEG chunk: {}", e)))?;

        Ok(if image.color().channel_count() == 1 {
            image.into_luma8().into_raw()
        } else {
            image.into_rgb8().into_raw()
        })
    }

    fn name(&self) -> &'static str {
        "JPEG"
    }

    fn code(&self) -> u16 {
        compression::JPEG
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_tile_decodes_to_same_size() {
        let encoder = JpegTileEncoder::default();
        let pixels: Vec<u8> = (0..64 * 32 * 3).map(|i| (i % 251) as u8).collect();
        let encoded = encoder.encode_tile(&pixels, 64, 32, 3).unwrap();

        assert_eq!(&encoded[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory_with_format(&encoded, image::ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 32));
    }

    #[test]
    fn test_greyscale_tile() {
        let encoder = JpegTileEncoder::default();
        let encoded = encoder.encode_tile(&[128u8; 16 * 16], 16, 16, 1).unwrap();
        let decoded = image::load_from_memory_with_format(&encoded, image::ImageFormat::Jpeg).unwrap();
        assert_eq!(decoded.color(), image::ColorType::L8);
    }

    #[test]
    fn test_handler_reads_back_encoded_tiles() {
        let encoder = JpegTileEncoder::new(95);
        let grey = encoder.encode_tile(&[200u8; 16 * 16], 16, 16, 1).unwrap();
        let decoded = JpegHandler.decompress(&grey).unwrap();
        assert_eq!(decoded.len(), 16 * 16);
        assert!(decoded.iter().all(|&v| (195..=205).contains(&v)));

        let rgb = encoder.encode_tile(&[90u8; 8 * 8 * 3], 8, 8, 3).unwrap();
        assert_eq!(JpegHandler.decompress(&rgb).unwrap().len(), 8 * 8 * 3);
    }

    #[test]
    fn test_handler_rejects_garbage() {
        assert!(matches!(JpegHandler.decompress(b"not a jpeg"), Err(FormatError::NotARaster(_))));
    }

    #[test]
    fn test_rejects_two_bands() {
        let encoder = JpegTileEncoder::default();
        assert!(matches!(
            encoder.encode_tile(&[0u8; 8], 2, 2, 2),
            Err(ConversionError::UnsupportedBandCount(2))
        ));
    }

    #[test]
    fn test_photometric_follows_band_count() {
        let encoder = JpegTileEncoder::default();
        assert_eq!(encoder.photometric(3), photometric::YCBCR);
        assert_eq!(encoder.photometric(1), photometric::BLACK_IS_ZERO);
    }
}
