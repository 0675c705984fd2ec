//! Band decoding for stripped and tiled TIFF images
//!
//! `SampleLayout` captures everything needed to locate and interpret the
//! samples of one IFD. `BandDecoder` reads a single band at a time into a
//! floating-point buffer, so peak memory is one band plus one chunk.

use std::io::SeekFrom;

use byteorder::{BigEndian, LittleEndian};
use log::debug;

use crate::compression::{CompressionFactory, CompressionHandler};
use crate::error::{FormatError, FormatResult};
use crate::io::byte_order::{ByteOrder, ByteOrderHandler};
use crate::io::seekable::{stream_len, SeekableReader};
use crate::tiff::constants::{compression, planar_config, predictor, sample_format, tags};
use crate::tiff::ifd::IFD;

/// Numeric type of the samples in a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl PixelType {
    /// Maps BitsPerSample and SampleFormat to a pixel type
    pub fn from_tags(bits: u64, format: u64) -> Option<Self> {
        match (format as u16, bits) {
            (sample_format::UNSIGNED, 8) => Some(PixelType::U8),
            (sample_format::SIGNED, 8) => Some(PixelType::I8),
            (sample_format::UNSIGNED, 16) => Some(PixelType::U16),
            (sample_format::SIGNED, 16) => Some(PixelType::I16),
            (sample_format::UNSIGNED, 32) => Some(PixelType::U32),
            (sample_format::SIGNED, 32) => Some(PixelType::I32),
            (sample_format::IEEEFP, 32) => Some(PixelType::F32),
            (sample_format::IEEEFP, 64) => Some(PixelType::F64),
            _ => None,
        }
    }

    /// Size of one sample in bytes
    pub fn bytes(&self) -> usize {
        match self {
            PixelType::U8 | PixelType::I8 => 1,
            PixelType::U16 | PixelType::I16 => 2,
            PixelType::U32 | PixelType::I32 | PixelType::F32 => 4,
            PixelType::F64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, PixelType::F32 | PixelType::F64)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PixelType::U8 => "uint8",
            PixelType::I8 => "int8",
            PixelType::U16 => "uint16",
            PixelType::I16 => "int16",
            PixelType::U32 => "uint32",
            PixelType::I32 => "int32",
            PixelType::F32 => "float32",
            PixelType::F64 => "float64",
        }
    }
}

/// How image data is cut into chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chunking {
    Strips { rows_per_strip: usize },
    Tiles { tile_width: usize, tile_height: usize },
}

/// Location and interpretation of the samples of one image
#[derive(Debug, Clone)]
pub struct SampleLayout {
    pub width: usize,
    pub height: usize,
    pub samples_per_pixel: usize,
    pub pixel_type: PixelType,
    pub planar_configuration: u16,
    pub predictor: u16,
    pub compression: u64,
    pub chunking: Chunking,
    pub offsets: Vec<u64>,
    pub byte_counts: Vec<u64>,
}

impl SampleLayout {
    /// Reads and validates the layout tags of an IFD
    pub fn from_ifd(ifd: &IFD) -> FormatResult<Self> {
        let (width, height) = ifd
            .get_dimensions()
            .ok_or_else(|| FormatError::NotARaster("image dimensions are missing".to_string()))?;
        if width == 0 || height == 0 {
            return Err(FormatError::NotARaster(format!("empty image {}x{}", width, height)));
        }
        let (width, height) = (width as usize, height as usize);
        let samples_per_pixel = ifd.get_samples_per_pixel() as usize;
        if samples_per_pixel == 0 {
            return Err(FormatError::NotARaster("zero samples per pixel".to_string()));
        }

        let pixel_type = Self::read_pixel_type(ifd)?;

        let compression = ifd.get_unsigned(tags::COMPRESSION).unwrap_or(compression::NONE as u64);
        if !CompressionFactory::is_supported(compression) {
            return Err(FormatError::UnsupportedCompression(compression));
        }

        let planar_configuration = ifd
            .get_unsigned(tags::PLANAR_CONFIGURATION)
            .unwrap_or(planar_config::CHUNKY as u64) as u16;
        if planar_configuration != planar_config::CHUNKY && planar_configuration != planar_config::PLANAR {
            return Err(FormatError::UnsupportedLayout(format!(
                "planar configuration {}",
                planar_configuration
            )));
        }

        let predictor = ifd.get_unsigned(tags::PREDICTOR).unwrap_or(predictor::NONE as u64) as u16;
        match predictor {
            predictor::NONE => {}
            predictor::HORIZONTAL_DIFFERENCING if !pixel_type.is_float() => {}
            other => {
                return Err(FormatError::UnsupportedLayout(format!(
                    "predictor {} for {} samples",
                    other,
                    pixel_type.name()
                )))
            }
        }

        let (chunking, offsets_tag, counts_tag) = if ifd.has_tag(tags::TILE_WIDTH) {
            let tile_width = ifd.get_unsigned(tags::TILE_WIDTH).unwrap_or(0) as usize;
            let tile_height = ifd.get_unsigned(tags::TILE_LENGTH).unwrap_or(0) as usize;
            if tile_width == 0 || tile_height == 0 {
                return Err(FormatError::NotARaster("tile dimensions are missing".to_string()));
            }
            (
                Chunking::Tiles { tile_width, tile_height },
                tags::TILE_OFFSETS,
                tags::TILE_BYTE_COUNTS,
            )
        } else {
            let rows_per_strip = ifd
                .get_unsigned(tags::ROWS_PER_STRIP)
                .map(|rows| (rows as usize).clamp(1, height))
                .unwrap_or(height);
            (
                Chunking::Strips { rows_per_strip },
                tags::STRIP_OFFSETS,
                tags::STRIP_BYTE_COUNTS,
            )
        };

        let offsets = ifd
            .get_unsigned_vec(offsets_tag)
            .ok_or_else(|| FormatError::NotARaster("image data offsets are missing".to_string()))?;
        let byte_counts = ifd
            .get_unsigned_vec(counts_tag)
            .ok_or_else(|| FormatError::NotARaster("image data byte counts are missing".to_string()))?;

        let layout = SampleLayout {
            width,
            height,
            samples_per_pixel,
            pixel_type,
            planar_configuration,
            predictor,
            compression,
            chunking,
            offsets,
            byte_counts,
        };

        let expected = layout.chunks_per_plane() * layout.planes();
        if layout.offsets.len() < expected || layout.byte_counts.len() < expected {
            return Err(FormatError::NotARaster(format!(
                "expected {} data chunks, found {} offsets and {} byte counts",
                expected,
                layout.offsets.len(),
                layout.byte_counts.len()
            )));
        }
        Ok(layout)
    }

    fn read_pixel_type(ifd: &IFD) -> FormatResult<PixelType> {
        let bits = ifd.get_unsigned_vec(tags::BITS_PER_SAMPLE).unwrap_or_else(|| vec![1]);
        let formats = ifd
            .get_unsigned_vec(tags::SAMPLE_FORMAT)
            .unwrap_or_else(|| vec![sample_format::UNSIGNED as u64]);

        if bits.windows(2).any(|w| w[0] != w[1]) || formats.windows(2).any(|w| w[0] != w[1]) {
            return Err(FormatError::UnsupportedLayout("bands with mixed sample types".to_string()));
        }
        let (bits, format) = (bits[0], formats.first().copied().unwrap_or(1));

        PixelType::from_tags(bits, format).ok_or_else(|| {
            FormatError::UnsupportedLayout(format!("{}-bit samples with sample format {}", bits, format))
        })
    }

    /// Chunk width, chunk height, chunks across and chunks down
    fn chunk_grid(&self) -> (usize, usize, usize, usize) {
        match self.chunking {
            Chunking::Strips { rows_per_strip } => {
                (self.width, rows_per_strip, 1, self.height.div_ceil(rows_per_strip))
            }
            Chunking::Tiles { tile_width, tile_height } => (
                tile_width,
                tile_height,
                self.width.div_ceil(tile_width),
                self.height.div_ceil(tile_height),
            ),
        }
    }

    pub fn chunks_per_plane(&self) -> usize {
        let (_, _, across, down) = self.chunk_grid();
        across * down
    }

    fn planes(&self) -> usize {
        if self.planar_configuration == planar_config::PLANAR {
            self.samples_per_pixel
        } else {
            1
        }
    }

    /// Samples interleaved per pixel within one chunk
    fn chunk_stride(&self) -> usize {
        if self.planar_configuration == planar_config::PLANAR {
            1
        } else {
            self.samples_per_pixel
        }
    }
}

/// Reads individual bands of an image as `f32`
pub struct BandDecoder<'a> {
    layout: &'a SampleLayout,
    byte_order: ByteOrder,
    handler: Box<dyn ByteOrderHandler>,
    decompressor: Box<dyn CompressionHandler>,
}

impl<'a> BandDecoder<'a> {
    pub fn new(layout: &'a SampleLayout, byte_order: ByteOrder) -> FormatResult<Self> {
        Ok(BandDecoder {
            layout,
            byte_order,
            handler: byte_order.create_handler(),
            decompressor: CompressionFactory::create_handler(layout.compression)?,
        })
    }

    /// Decodes band `band` (0-based) into a row-major buffer
    pub fn read_band(&self, reader: &mut dyn SeekableReader, band: usize) -> FormatResult<Vec<f32>> {
        let layout = self.layout;
        if band >= layout.samples_per_pixel {
            return Err(FormatError::NotARaster(format!(
                "band {} requested from a {}-band image",
                band, layout.samples_per_pixel
            )));
        }

        let file_size = stream_len(reader)?;
        let bytes_per_sample = layout.pixel_type.bytes();
        let stride = layout.chunk_stride();
        let (sample_index, plane) = if layout.planar_configuration == planar_config::PLANAR {
            (0, band)
        } else {
            (band, 0)
        };

        let (chunk_width, chunk_height, across, _) = layout.chunk_grid();
        let chunks_per_plane = layout.chunks_per_plane();
        let row_bytes = chunk_width * stride * bytes_per_sample;
        let mut values = vec![0f32; layout.width * layout.height];

        for chunk in 0..chunks_per_plane {
            let index = plane * chunks_per_plane + chunk;
            let (offset, count) = (layout.offsets[index], layout.byte_counts[index]);
            if count == 0 {
                // Sparse chunk
                continue;
            }
            if offset.saturating_add(count) > file_size {
                return Err(FormatError::NotARaster(format!(
                    "chunk {} at {}+{} lies beyond the end of the file",
                    index, offset, count
                )));
            }

            let mut raw = vec![0u8; count as usize];
            reader.seek(SeekFrom::Start(offset))?;
            reader.read_exact(&mut raw)?;
            let mut data = self.decompressor.decompress(&raw)?;

            if layout.predictor == predictor::HORIZONTAL_DIFFERENCING {
                undo_horizontal_predictor(&mut data, row_bytes, stride, bytes_per_sample, self.byte_order);
            }

            let x0 = (chunk % across) * chunk_width;
            let y0 = (chunk / across) * chunk_height;
            let rows = chunk_height.min(layout.height - y0);
            let cols = chunk_width.min(layout.width - x0);

            for row in 0..rows {
                let target_row = (y0 + row) * layout.width + x0;
                for col in 0..cols {
                    let start = ((row * chunk_width + col) * stride + sample_index) * bytes_per_sample;
                    let sample = data.get(start..start + bytes_per_sample).ok_or_else(|| {
                        FormatError::NotARaster(format!("chunk {} decodes to too few bytes", index))
                    })?;
                    values[target_row + col] = self.decode_sample(sample);
                }
            }
        }

        debug!(
            "Decoded band {} ({} chunks of {})",
            band,
            chunks_per_plane,
            self.decompressor.name()
        );
        Ok(values)
    }

    fn decode_sample(&self, bytes: &[u8]) -> f32 {
        let h = &self.handler;
        match self.layout.pixel_type {
            PixelType::U8 => bytes[0] as f32,
            PixelType::I8 => bytes[0] as i8 as f32,
            PixelType::U16 => h.u16_at(bytes) as f32,
            PixelType::I16 => h.u16_at(bytes) as i16 as f32,
            PixelType::U32 => h.u32_at(bytes) as f32,
            PixelType::I32 => h.u32_at(bytes) as i32 as f32,
            PixelType::F32 => h.f32_at(bytes),
            PixelType::F64 => h.f64_at(bytes) as f32,
        }
    }
}

/// Reverses horizontal differencing, row by row, with wrapping integer sums
fn undo_horizontal_predictor(data: &mut [u8], row_bytes: usize, stride: usize, bytes_per_sample: usize, order: ByteOrder) {
    if row_bytes == 0 {
        return;
    }
    for row in data.chunks_exact_mut(row_bytes) {
        match order {
            ByteOrder::LittleEndian => accumulate_row::<LittleEndian>(row, stride, bytes_per_sample),
            ByteOrder::BigEndian => accumulate_row::<BigEndian>(row, stride, bytes_per_sample),
        }
    }
}

fn accumulate_row<E: byteorder::ByteOrder>(row: &mut [u8], stride: usize, bytes_per_sample: usize) {
    let samples = row.len() / bytes_per_sample;
    for i in stride..samples {
        let (cur, prev) = (i * bytes_per_sample, (i - stride) * bytes_per_sample);
        match bytes_per_sample {
            1 => row[cur] = row[cur].wrapping_add(row[prev]),
            2 => {
                let v = E::read_u16(&row[cur..]).wrapping_add(E::read_u16(&row[prev..]));
                E::write_u16(&mut row[cur..], v);
            }
            4 => {
                let v = E::read_u32(&row[cur..]).wrapping_add(E::read_u32(&row[prev..]));
                E::write_u32(&mut row[cur..], v);
            }
            8 => {
                let v = E::read_u64(&row[cur..]).wrapping_add(E::read_u64(&row[prev..]));
                E::write_u64(&mut row[cur..], v);
            }
            _ => {}
        }
    }
}
