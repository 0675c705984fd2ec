//! Seekable reader trait and stream helpers
//!
//! Uploads arrive as arbitrary readers; the size check and the TIFF
//! reader both need random access, so everything downstream works on
//! `SeekableReader`.

use std::io::{self, Read, Seek, SeekFrom};

/// Trait for readers that can both read and seek
pub trait SeekableReader: Read + Seek + Send + Sync {}

impl<T: Read + Seek + Send + Sync> SeekableReader for T {}

/// Returns the total length of a stream without consuming it
///
/// The stream position is restored before returning, so the caller can
/// keep reading from where it was.
///
/// # Arguments
///
/// * `reader` - Stream to measure
///
/// # Returns
///
/// Length of the stream in bytes
pub fn stream_len<R: Seek + ?Sized>(reader: &mut R) -> io::Result<u64> {
    let position = reader.stream_position()?;
    let end = reader.seek(SeekFrom::End(0))?;
    if end != position {
        reader.seek(SeekFrom::Start(position))?;
    }
    Ok(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_stream_len_restores_position() {
        let mut cursor = Cursor::new(vec![0u8; 64]);
        cursor.seek(SeekFrom::Start(10)).unwrap();

        assert_eq!(stream_len(&mut cursor).unwrap(), 64);
        assert_eq!(cursor.stream_position().unwrap(), 10);
    }

    #[test]
    fn test_stream_len_of_empty_stream() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert_eq!(stream_len(&mut cursor).unwrap(), 0);
    }
}
