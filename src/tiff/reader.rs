//! TIFF file reader implementation
//!
//! This module implements the TIFF/BigTIFF directory reader. The byte
//! order strategy is detected from the header, then every IFD in the
//! chain is read and its tag values resolved, whether they are stored
//! inline in the entry or at an external offset.

use log::{debug, info, warn};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, SeekFrom};
use std::path::Path;

use crate::error::{FormatError, FormatResult};
use crate::io::byte_order::{ByteOrder, ByteOrderHandler};
use crate::io::seekable::{stream_len, SeekableReader};
use crate::tiff::constants::{field_types, header};
use crate::tiff::ifd::{tag_name, IFDEntry, TagValue, IFD};
use crate::tiff::types::TIFF;

/// Raw entry as laid out in the directory, before value resolution
struct RawEntry {
    tag: u16,
    field_type: u16,
    count: u64,
    payload: [u8; 8],
}

/// Reader for TIFF and BigTIFF files
pub struct TiffReader {
    is_big_tiff: bool,
    file_size: u64,
}

impl Default for TiffReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TiffReader {
    pub fn new() -> Self {
        TiffReader {
            is_big_tiff: false,
            file_size: 0,
        }
    }

    /// Loads a TIFF file from the given path
    ///
    /// # Arguments
    /// * `path` - Path to the TIFF file to load
    ///
    /// # Returns
    /// A TIFF structure with every IFD resolved
    pub fn load(&mut self, path: &Path) -> FormatResult<TIFF> {
        info!("Loading TIFF file: {}", path.display());
        let file = File::open(path)?;
        let mut reader = BufReader::with_capacity(1024 * 1024, file);
        self.read(&mut reader)
    }

    /// Reads a TIFF file from the given reader
    ///
    /// 1. Detect byte order (little/big endian)
    /// 2. Check for TIFF or BigTIFF format
    /// 3. Read all IFDs in the chain
    pub fn read(&mut self, reader: &mut dyn SeekableReader) -> FormatResult<TIFF> {
        self.file_size = stream_len(reader)?;
        reader.seek(SeekFrom::Start(0))?;

        if self.file_size < 8 {
            return Err(FormatError::NotARaster(format!(
                "file of {} bytes is too short for a TIFF header",
                self.file_size
            )));
        }

        let byte_order = ByteOrder::detect(reader)?;
        let handler = byte_order.create_handler();
        let first_ifd_offset = self.read_header(reader, handler.as_ref())?;
        debug!(
            "{} {} with first IFD at {}",
            byte_order.name(),
            if self.is_big_tiff { "BigTIFF" } else { "TIFF" },
            first_ifd_offset
        );

        let mut tiff = TIFF::new(self.is_big_tiff, byte_order);
        tiff.ifds = self.read_ifd_chain(reader, handler.as_ref(), first_ifd_offset)?;

        info!("Read {} IFDs from TIFF file", tiff.ifds.len());
        Ok(tiff)
    }

    /// Validates the version field and returns the first IFD offset
    fn read_header(&mut self, reader: &mut dyn SeekableReader, handler: &dyn ByteOrderHandler) -> FormatResult<u64> {
        let version = handler.read_u16(reader)?;
        match version {
            header::TIFF_VERSION => {
                self.is_big_tiff = false;
                Ok(handler.read_u32(reader)? as u64)
            }
            header::BIG_TIFF_VERSION => {
                self.is_big_tiff = true;
                let offset_size = handler.read_u16(reader)?;
                let reserved = handler.read_u16(reader)?;
                if offset_size != header::BIGTIFF_OFFSET_SIZE || reserved != 0 {
                    return Err(FormatError::NotARaster(format!(
                        "invalid BigTIFF header (offset size {}, reserved {})",
                        offset_size, reserved
                    )));
                }
                Ok(handler.read_u64(reader)?)
            }
            other => Err(FormatError::NotARaster(format!("unsupported TIFF version {}", other))),
        }
    }

    /// Reads a chain of IFDs starting from the given offset
    ///
    /// A broken first IFD is fatal. Later IFDs only carry overviews, so a
    /// broken link there ends the chain with a warning.
    fn read_ifd_chain(
        &self,
        reader: &mut dyn SeekableReader,
        handler: &dyn ByteOrderHandler,
        first_ifd_offset: u64,
    ) -> FormatResult<Vec<IFD>> {
        let mut ifds = Vec::new();
        let mut visited = HashSet::new();
        let mut offset = first_ifd_offset;

        while offset != 0 && ifds.len() < header::MAX_IFD_CHAIN {
            if !visited.insert(offset) {
                warn!("IFD chain loops back to offset {}, stopping", offset);
                break;
            }

            match self.read_ifd(reader, handler, offset, ifds.len()) {
                Ok((ifd, next)) => {
                    ifds.push(ifd);
                    offset = next;
                }
                Err(e) if ifds.is_empty() => return Err(e),
                Err(e) => {
                    warn!("Error reading IFD {}: {}", ifds.len(), e);
                    break;
                }
            }
        }

        if ifds.is_empty() {
            return Err(FormatError::NotARaster("file contains no image directory".to_string()));
        }
        Ok(ifds)
    }

    /// Reads one IFD and returns it with the offset of the next one
    pub fn read_ifd(
        &self,
        reader: &mut dyn SeekableReader,
        handler: &dyn ByteOrderHandler,
        offset: u64,
        number: usize,
    ) -> FormatResult<(IFD, u64)> {
        if offset < 8 || offset >= self.file_size {
            return Err(FormatError::NotARaster(format!(
                "IFD offset {} outside file of {} bytes",
                offset, self.file_size
            )));
        }
        reader.seek(SeekFrom::Start(offset))?;

        let entry_count = if self.is_big_tiff {
            handler.read_u64(reader)?
        } else {
            handler.read_u16(reader)? as u64
        };
        let entry_size = if self.is_big_tiff { 20 } else { 12 };
        if offset.saturating_add(entry_count.saturating_mul(entry_size)) > self.file_size {
            return Err(FormatError::NotARaster(format!(
                "IFD at {} claims {} entries, more than the file holds",
                offset, entry_count
            )));
        }

        let mut raw_entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            raw_entries.push(self.read_raw_entry(reader, handler)?);
        }
        let next_offset = if self.is_big_tiff {
            handler.read_u64(reader)?
        } else {
            handler.read_u32(reader)? as u64
        };

        let mut ifd = IFD::new(number, offset);
        for raw in raw_entries {
            match self.resolve_entry(reader, handler, &raw)? {
                Some(entry) => ifd.add_entry(entry),
                None => warn!(
                    "Skipping tag {} ({}) with unknown field type {}",
                    raw.tag,
                    tag_name(raw.tag),
                    raw.field_type
                ),
            }
        }

        debug!("Read IFD #{} with {} entries", number, ifd.entry_count());
        Ok((ifd, next_offset))
    }

    fn read_raw_entry(&self, reader: &mut dyn SeekableReader, handler: &dyn ByteOrderHandler) -> FormatResult<RawEntry> {
        let tag = handler.read_u16(reader)?;
        let field_type = handler.read_u16(reader)?;
        let count = if self.is_big_tiff {
            handler.read_u64(reader)?
        } else {
            handler.read_u32(reader)? as u64
        };

        let mut payload = [0u8; 8];
        let inline_size = if self.is_big_tiff { 8 } else { 4 };
        reader.read_exact(&mut payload[..inline_size])?;

        Ok(RawEntry { tag, field_type, count, payload })
    }

    /// Loads the bytes behind an entry and decodes them
    ///
    /// Returns `None` for field types this reader does not know.
    fn resolve_entry(
        &self,
        reader: &mut dyn SeekableReader,
        handler: &dyn ByteOrderHandler,
        raw: &RawEntry,
    ) -> FormatResult<Option<IFDEntry>> {
        let value_size = match field_types::size_of(raw.field_type) {
            Some(size) => size as u64,
            None => return Ok(None),
        };

        let total = raw
            .count
            .checked_mul(value_size)
            .filter(|&total| total <= self.file_size)
            .ok_or_else(|| {
                FormatError::NotARaster(format!("tag {} declares an impossible value count {}", raw.tag, raw.count))
            })?;

        let inline_size = if self.is_big_tiff { 8 } else { 4 };
        let bytes = if total <= inline_size {
            raw.payload[..total as usize].to_vec()
        } else {
            let value_offset = if self.is_big_tiff {
                handler.u64_at(&raw.payload)
            } else {
                handler.u32_at(&raw.payload) as u64
            };
            if value_offset.saturating_add(total) > self.file_size {
                return Err(FormatError::NotARaster(format!(
                    "values of tag {} ({}) lie beyond the end of the file",
                    raw.tag,
                    tag_name(raw.tag)
                )));
            }
            let position = reader.stream_position()?;
            reader.seek(SeekFrom::Start(value_offset))?;
            let mut buffer = vec![0u8; total as usize];
            reader.read_exact(&mut buffer)?;
            reader.seek(SeekFrom::Start(position))?;
            buffer
        };

        let value = decode_values(raw.field_type, &bytes, handler);
        Ok(Some(IFDEntry::with_field_type(raw.tag, raw.field_type, value)))
    }
}

/// Decodes a packed value array of the given field type
fn decode_values(field_type: u16, bytes: &[u8], handler: &dyn ByteOrderHandler) -> TagValue {
    match field_type {
        field_types::ASCII => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            TagValue::Ascii(String::from_utf8_lossy(&bytes[..end]).into_owned())
        }
        field_types::SHORT => TagValue::Short(bytes.chunks_exact(2).map(|c| handler.u16_at(c)).collect()),
        field_types::LONG => TagValue::Long(bytes.chunks_exact(4).map(|c| handler.u32_at(c)).collect()),
        field_types::LONG8 | field_types::IFD8 => {
            TagValue::Long8(bytes.chunks_exact(8).map(|c| handler.u64_at(c)).collect())
        }
        field_types::SBYTE => TagValue::Signed(bytes.iter().map(|&b| b as i8 as i64).collect()),
        field_types::SSHORT => {
            TagValue::Signed(bytes.chunks_exact(2).map(|c| handler.u16_at(c) as i16 as i64).collect())
        }
        field_types::SLONG => {
            TagValue::Signed(bytes.chunks_exact(4).map(|c| handler.u32_at(c) as i32 as i64).collect())
        }
        field_types::SLONG8 => TagValue::Signed(bytes.chunks_exact(8).map(|c| handler.u64_at(c) as i64).collect()),
        field_types::RATIONAL => TagValue::Rational(
            bytes
                .chunks_exact(8)
                .map(|c| (handler.u32_at(&c[..4]) as i64, handler.u32_at(&c[4..]) as i64))
                .collect(),
        ),
        field_types::SRATIONAL => TagValue::Rational(
            bytes
                .chunks_exact(8)
                .map(|c| (handler.u32_at(&c[..4]) as i32 as i64, handler.u32_at(&c[4..]) as i32 as i64))
                .collect(),
        ),
        field_types::FLOAT => TagValue::Float(bytes.chunks_exact(4).map(|c| handler.f32_at(c) as f64).collect()),
        field_types::DOUBLE => TagValue::Float(bytes.chunks_exact(8).map(|c| handler.f64_at(c)).collect()),
        _ => TagValue::Bytes(bytes.to_vec()),
    }
}
