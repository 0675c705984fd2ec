//! Byte order handling for TIFF files
//!
//! Header fields, IFD entries and sample buffers are all stored in the
//! byte order announced by the first two bytes of the file. The handler
//! is a strategy object picked once per file and shared by the reader and
//! the sample decoder.

use std::io::Result;
use std::marker::PhantomData;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

use crate::error::{FormatError, FormatResult};
use crate::io::seekable::SeekableReader;

/// Represents the byte order of a TIFF file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian byte order (II)
    LittleEndian,
    /// Big-endian byte order (MM)
    BigEndian,
}

impl ByteOrder {
    /// Detects the byte order from the two marker bytes at the start of a TIFF
    pub fn detect(reader: &mut dyn SeekableReader) -> FormatResult<Self> {
        let mut marker = [0u8; 2];
        reader.read_exact(&mut marker)?;
        match &marker {
            b"II" => Ok(ByteOrder::LittleEndian),
            b"MM" => Ok(ByteOrder::BigEndian),
            _ => Err(FormatError::NotARaster(format!(
                "invalid byte order marker {:#04x}{:02x}",
                marker[0], marker[1]
            ))),
        }
    }

    /// Returns a string representation of this byte order
    pub fn name(&self) -> &'static str {
        match self {
            ByteOrder::LittleEndian => "Little Endian (II)",
            ByteOrder::BigEndian => "Big Endian (MM)",
        }
    }

    /// Creates the appropriate handler for this byte order
    pub fn create_handler(&self) -> Box<dyn ByteOrderHandler> {
        match self {
            ByteOrder::LittleEndian => Box::new(LittleEndianHandler::new()),
            ByteOrder::BigEndian => Box::new(BigEndianHandler::new()),
        }
    }
}

/// Trait for byte order handling strategies
///
/// The `read_*` methods pull values from a stream; the `*_at` methods
/// decode values from the start of an in-memory buffer, which is how
/// inline IFD values and pixel samples are interpreted.
pub trait ByteOrderHandler: Send + Sync {
    fn read_u16(&self, reader: &mut dyn SeekableReader) -> Result<u16>;
    fn read_u32(&self, reader: &mut dyn SeekableReader) -> Result<u32>;
    fn read_u64(&self, reader: &mut dyn SeekableReader) -> Result<u64>;

    fn u16_at(&self, buf: &[u8]) -> u16;
    fn u32_at(&self, buf: &[u8]) -> u32;
    fn u64_at(&self, buf: &[u8]) -> u64;
    fn f32_at(&self, buf: &[u8]) -> f32;
    fn f64_at(&self, buf: &[u8]) -> f64;
}

/// Byte order handler generic over the `byteorder` marker types
pub struct EndianHandler<E> {
    order: PhantomData<E>,
}

impl<E> EndianHandler<E> {
    pub const fn new() -> Self {
        EndianHandler { order: PhantomData }
    }
}

impl<E> Default for EndianHandler<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Little-endian byte order handler
pub type LittleEndianHandler = EndianHandler<LittleEndian>;

/// Big-endian byte order handler
pub type BigEndianHandler = EndianHandler<BigEndian>;

impl<E> ByteOrderHandler for EndianHandler<E>
where
    E: byteorder::ByteOrder + Send + Sync,
{
    fn read_u16(&self, reader: &mut dyn SeekableReader) -> Result<u16> {
        reader.read_u16::<E>()
    }

    fn read_u32(&self, reader: &mut dyn SeekableReader) -> Result<u32> {
        reader.read_u32::<E>()
    }

    fn read_u64(&self, reader: &mut dyn SeekableReader) -> Result<u64> {
        reader.read_u64::<E>()
    }

    fn u16_at(&self, buf: &[u8]) -> u16 {
        E::read_u16(buf)
    }

    fn u32_at(&self, buf: &[u8]) -> u32 {
        E::read_u32(buf)
    }

    fn u64_at(&self, buf: &[u8]) -> u64 {
        E::read_u64(buf)
    }

    fn f32_at(&self, buf: &[u8]) -> f32 {
        E::read_f32(buf)
    }

    fn f64_at(&self, buf: &[u8]) -> f64 {
        E::read_f64(buf)
    }
}
