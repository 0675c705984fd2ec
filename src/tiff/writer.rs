//! Tiled TIFF writer for 8-bit output rasters
//!
//! Writes a classic little-endian TIFF laid out for streaming readers:
//! all IFDs first (full resolution, then overviews), then the external
//! tag data, then tile data from the smallest overview up to the full
//! resolution level. Every offset is computed before the first byte is
//! written, so the output only needs `Write`, not `Seek`.

use byteorder::{LittleEndian, WriteBytesExt};
use log::{debug, info};
use std::io::Write;

use crate::compression::TileEncoder;
use crate::error::{ConversionError, ConversionResult};
use crate::tiff::constants::{header, new_subfile_type, photometric, planar_config, sample_format, tags};
use crate::tiff::ifd::{IFDEntry, TagValue, IFD};

/// Bytes available for a value stored inside a classic IFD entry
const INLINE_VALUE_SIZE: usize = 4;

/// One resolution level with its tiles already encoded
#[derive(Debug, Clone)]
pub struct EncodedLevel {
    pub width: u32,
    pub height: u32,
    /// Encoded tiles in row-major tile order
    pub tiles: Vec<Vec<u8>>,
}

impl EncodedLevel {
    /// Cuts an interleaved 8-bit image into padded tiles and encodes each
    ///
    /// Edge tiles are padded with zeros to the full tile size.
    pub fn encode(
        pixels: &[u8],
        width: u32,
        height: u32,
        samples: usize,
        tile_size: u32,
        encoder: &dyn TileEncoder,
    ) -> ConversionResult<Self> {
        let (w, h, t) = (width as usize, height as usize, tile_size as usize);
        let across = w.div_ceil(t);
        let down = h.div_ceil(t);
        let mut tiles = Vec::with_capacity(across * down);
        let mut buffer = vec![0u8; t * t * samples];

        for ty in 0..down {
            for tx in 0..across {
                buffer.fill(0);
                let (x0, y0) = (tx * t, ty * t);
                let cols = t.min(w - x0);
                for row in 0..t.min(h - y0) {
                    let src = ((y0 + row) * w + x0) * samples;
                    let dst = row * t * samples;
                    buffer[dst..dst + cols * samples].copy_from_slice(&pixels[src..src + cols * samples]);
                }
                tiles.push(encoder.encode_tile(&buffer, tile_size, tile_size, samples)?);
            }
        }

        Ok(EncodedLevel { width, height, tiles })
    }

    fn data_size(&self) -> u64 {
        self.tiles.iter().map(|tile| tile.len() as u64).sum()
    }
}

/// Offsets computed for every piece of the output file
struct FileLayout {
    ifd_offsets: Vec<u64>,
    /// External data offset per level and tag
    external_offsets: Vec<Vec<(u16, u64)>>,
    /// Tile offsets per level
    tile_offsets: Vec<Vec<u64>>,
    total_size: u64,
}

/// Writes tiled, optionally overviewed TIFF files
pub struct TiledTiffWriter {
    tile_size: u32,
    samples_per_pixel: usize,
    compression: u16,
    photometric: u16,
    geo_entries: Vec<IFDEntry>,
}

impl TiledTiffWriter {
    pub fn new(tile_size: u32, samples_per_pixel: usize, compression: u16, photometric: u16) -> Self {
        TiledTiffWriter {
            tile_size,
            samples_per_pixel,
            compression,
            photometric,
            geo_entries: Vec::new(),
        }
    }

    /// GeoTIFF tags attached to the full-resolution IFD
    pub fn with_geo_entries(mut self, entries: Vec<IFDEntry>) -> Self {
        self.geo_entries = entries;
        self
    }

    /// Writes a complete file; `levels[0]` is the full-resolution image
    ///
    /// # Returns
    /// Number of bytes written
    pub fn write<W: Write>(&self, writer: &mut W, levels: &[EncodedLevel]) -> ConversionResult<u64> {
        if levels.is_empty() {
            return Err(ConversionError::Encode("no image levels to write".to_string()));
        }

        let mut ifds: Vec<IFD> = levels
            .iter()
            .enumerate()
            .map(|(index, level)| self.build_ifd(index, level))
            .collect();

        let layout = Self::calculate_layout(&ifds, levels);
        if layout.total_size > u32::MAX as u64 {
            return Err(ConversionError::OutputTooLarge(layout.total_size));
        }

        for (ifd, offsets) in ifds.iter_mut().zip(&layout.tile_offsets) {
            let offsets = offsets.iter().map(|&o| o as u32).collect();
            ifd.add_entry(IFDEntry::new(tags::TILE_OFFSETS, TagValue::Long(offsets)));
        }

        let mut position = Self::write_header(writer)?;
        position += Self::write_ifds(writer, &ifds, &layout)?;
        position += Self::write_external_data(writer, &ifds)?;
        position += Self::write_tile_data(writer, levels)?;
        debug_assert_eq!(position, layout.total_size);

        info!(
            "Wrote tiled TIFF: {} levels, {} bytes",
            levels.len(),
            position
        );
        Ok(position)
    }

    /// Directory for one level; TileOffsets holds placeholders until the layout is known
    fn build_ifd(&self, index: usize, level: &EncodedLevel) -> IFD {
        let spp = self.samples_per_pixel;
        let mut ifd = IFD::new(index, 0);
        let subfile = if index == 0 {
            new_subfile_type::FULL_RESOLUTION
        } else {
            new_subfile_type::REDUCED_RESOLUTION
        };

        ifd.add_entry(IFDEntry::new(tags::NEW_SUBFILE_TYPE, TagValue::Long(vec![subfile])));
        ifd.add_entry(IFDEntry::new(tags::IMAGE_WIDTH, TagValue::Long(vec![level.width])));
        ifd.add_entry(IFDEntry::new(tags::IMAGE_LENGTH, TagValue::Long(vec![level.height])));
        ifd.add_entry(IFDEntry::new(tags::BITS_PER_SAMPLE, TagValue::Short(vec![8; spp])));
        ifd.add_entry(IFDEntry::new(tags::COMPRESSION, TagValue::Short(vec![self.compression])));
        ifd.add_entry(IFDEntry::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            TagValue::Short(vec![self.photometric]),
        ));
        ifd.add_entry(IFDEntry::new(tags::SAMPLES_PER_PIXEL, TagValue::Short(vec![spp as u16])));
        ifd.add_entry(IFDEntry::new(
            tags::PLANAR_CONFIGURATION,
            TagValue::Short(vec![planar_config::CHUNKY]),
        ));
        ifd.add_entry(IFDEntry::new(tags::TILE_WIDTH, TagValue::Long(vec![self.tile_size])));
        ifd.add_entry(IFDEntry::new(tags::TILE_LENGTH, TagValue::Long(vec![self.tile_size])));
        ifd.add_entry(IFDEntry::new(tags::TILE_OFFSETS, TagValue::Long(vec![0; level.tiles.len()])));
        ifd.add_entry(IFDEntry::new(
            tags::TILE_BYTE_COUNTS,
            TagValue::Long(level.tiles.iter().map(|tile| tile.len() as u32).collect()),
        ));
        ifd.add_entry(IFDEntry::new(
            tags::SAMPLE_FORMAT,
            TagValue::Short(vec![sample_format::UNSIGNED; spp]),
        ));
        if self.photometric == photometric::YCBCR {
            // Encoder keeps full-resolution chroma
            ifd.add_entry(IFDEntry::new(tags::YCBCR_SUBSAMPLING, TagValue::Short(vec![1, 1])));
        }

        if index == 0 {
            for entry in &self.geo_entries {
                ifd.add_entry(entry.clone());
            }
        }
        ifd
    }

    fn calculate_layout(ifds: &[IFD], levels: &[EncodedLevel]) -> FileLayout {
        let mut offset = 8u64;

        let mut ifd_offsets = Vec::with_capacity(ifds.len());
        for ifd in ifds {
            ifd_offsets.push(offset);
            offset += 2 + 12 * ifd.entry_count() as u64 + 4;
        }

        let mut external_offsets = Vec::with_capacity(ifds.len());
        for ifd in ifds {
            let mut level_offsets = Vec::new();
            for entry in ifd.sorted_entries() {
                let size = value_size(&entry.value);
                if size > INLINE_VALUE_SIZE {
                    level_offsets.push((entry.tag, offset));
                    offset = align_to_word(offset + size as u64);
                }
            }
            external_offsets.push(level_offsets);
        }

        let mut tile_offsets = vec![Vec::new(); levels.len()];
        for (index, level) in levels.iter().enumerate().rev() {
            for tile in &level.tiles {
                tile_offsets[index].push(offset);
                offset += tile.len() as u64;
            }
            debug!("Level {} data: {} bytes", index, level.data_size());
        }

        FileLayout {
            ifd_offsets,
            external_offsets,
            tile_offsets,
            total_size: offset,
        }
    }

    fn write_header<W: Write>(writer: &mut W) -> ConversionResult<u64> {
        writer.write_all(b"II")?;
        writer.write_u16::<LittleEndian>(header::TIFF_VERSION)?;
        writer.write_u32::<LittleEndian>(8)?;
        Ok(8)
    }

    fn write_ifds<W: Write>(writer: &mut W, ifds: &[IFD], layout: &FileLayout) -> ConversionResult<u64> {
        let mut written = 0u64;
        for (index, ifd) in ifds.iter().enumerate() {
            let entries = ifd.sorted_entries();
            writer.write_u16::<LittleEndian>(entries.len() as u16)?;

            for entry in entries {
                let bytes = encode_value(&entry.value)?;
                writer.write_u16::<LittleEndian>(entry.tag)?;
                writer.write_u16::<LittleEndian>(entry.field_type)?;
                writer.write_u32::<LittleEndian>(entry.count() as u32)?;

                if bytes.len() <= INLINE_VALUE_SIZE {
                    let mut inline = [0u8; INLINE_VALUE_SIZE];
                    inline[..bytes.len()].copy_from_slice(&bytes);
                    writer.write_all(&inline)?;
                } else {
                    let offset = layout.external_offsets[index]
                        .iter()
                        .find(|(tag, _)| *tag == entry.tag)
                        .map(|&(_, offset)| offset)
                        .ok_or_else(|| {
                            ConversionError::Encode(format!("no external slot for tag {}", entry.tag))
                        })?;
                    writer.write_u32::<LittleEndian>(offset as u32)?;
                }
            }

            let next = layout.ifd_offsets.get(index + 1).copied().unwrap_or(0);
            writer.write_u32::<LittleEndian>(next as u32)?;
            written += 2 + 12 * ifd.entry_count() as u64 + 4;
        }
        Ok(written)
    }

    fn write_external_data<W: Write>(writer: &mut W, ifds: &[IFD]) -> ConversionResult<u64> {
        let mut written = 0u64;
        for ifd in ifds {
            for entry in ifd.sorted_entries() {
                let bytes = encode_value(&entry.value)?;
                if bytes.len() > INLINE_VALUE_SIZE {
                    writer.write_all(&bytes)?;
                    let padding = (align_to_word(bytes.len() as u64) - bytes.len() as u64) as usize;
                    writer.write_all(&[0u8; 1][..padding])?;
                    written += (bytes.len() + padding) as u64;
                }
            }
        }
        Ok(written)
    }

    fn write_tile_data<W: Write>(writer: &mut W, levels: &[EncodedLevel]) -> ConversionResult<u64> {
        let mut written = 0u64;
        for level in levels.iter().rev() {
            for tile in &level.tiles {
                writer.write_all(tile)?;
                written += tile.len() as u64;
            }
        }
        Ok(written)
    }
}

/// TIFF data must start on a word boundary
fn align_to_word(offset: u64) -> u64 {
    offset + (offset & 1)
}

fn value_size(value: &TagValue) -> usize {
    match value {
        TagValue::Bytes(v) => v.len(),
        TagValue::Ascii(s) => s.len() + 1,
        TagValue::Short(v) => v.len() * 2,
        TagValue::Long(v) => v.len() * 4,
        TagValue::Long8(v) => v.len() * 8,
        TagValue::Signed(v) => v.len() * 4,
        TagValue::Rational(v) => v.len() * 8,
        TagValue::Float(v) => v.len() * 8,
    }
}

/// Serializes a value in little-endian order using its write field type
fn encode_value(value: &TagValue) -> ConversionResult<Vec<u8>> {
    let mut bytes = Vec::with_capacity(value_size(value));
    match value {
        TagValue::Bytes(v) => bytes.extend_from_slice(v),
        TagValue::Ascii(s) => {
            bytes.extend_from_slice(s.as_bytes());
            bytes.push(0);
        }
        TagValue::Short(v) => {
            for &x in v {
                bytes.write_u16::<LittleEndian>(x)?;
            }
        }
        TagValue::Long(v) => {
            for &x in v {
                bytes.write_u32::<LittleEndian>(x)?;
            }
        }
        TagValue::Long8(v) => {
            for &x in v {
                bytes.write_u64::<LittleEndian>(x)?;
            }
        }
        TagValue::Signed(v) => {
            for &x in v {
                let x = i32::try_from(x)
                    .map_err(|_| ConversionError::Encode(format!("signed value {} exceeds SLONG", x)))?;
                bytes.write_i32::<LittleEndian>(x)?;
            }
        }
        TagValue::Rational(v) => {
            for &(n, d) in v {
                bytes.write_u32::<LittleEndian>(n as u32)?;
                bytes.write_u32::<LittleEndian>(d as u32)?;
            }
        }
        TagValue::Float(v) => {
            for &x in v {
                bytes.write_f64::<LittleEndian>(x)?;
            }
        }
    }
    Ok(bytes)
}
