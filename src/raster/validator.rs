//! Raster validation and inspection
//!
//! Enforces the upload size limit and opens candidate files as rasters,
//! mapping any parse failure to a format error.

use log::{debug, info};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Seek};
use std::path::Path;

use crate::error::{FormatError, FormatResult};
use crate::io::seekable::stream_len;
use crate::raster::source::RasterSource;
use crate::tiff::reader::TiffReader;

/// Upload limit used when none is configured (100 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Validates size and raster structure of uploads
#[derive(Debug, Clone, Copy)]
pub struct RasterValidator {
    max_bytes: u64,
}

impl Default for RasterValidator {
    fn default() -> Self {
        RasterValidator::new(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl RasterValidator {
    pub fn new(max_bytes: u64) -> Self {
        RasterValidator { max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Measures a stream by seeking to its end and back
    ///
    /// # Errors
    /// `FormatError::TooLarge` if the stream exceeds the limit
    pub fn check_size<R: Seek + ?Sized>(&self, reader: &mut R) -> FormatResult<u64> {
        let size = stream_len(reader)?;
        if size > self.max_bytes {
            return Err(FormatError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        debug!("Upload size {} bytes within limit {}", size, self.max_bytes);
        Ok(size)
    }

    /// Opens a file as a raster and extracts its metadata
    ///
    /// # Errors
    /// * `FormatError::TooLarge` - file exceeds the size limit
    /// * `FormatError::NotARaster` - file cannot be parsed as a raster
    /// * `FormatError::UnsupportedLayout` / `UnsupportedCompression` -
    ///   parsed, but the samples cannot be decoded
    pub fn open_and_inspect(&self, path: &Path) -> FormatResult<RasterSource> {
        let file = File::open(path)?;
        let mut reader = BufReader::with_capacity(1024 * 1024, file);
        self.check_size(&mut reader)?;

        let tiff = TiffReader::new().read(&mut reader).map_err(|e| match e {
            FormatError::Io(io) if io.kind() == ErrorKind::UnexpectedEof => {
                FormatError::NotARaster(format!("truncated file: {}", io))
            }
            other => other,
        })?;
        let source = RasterSource::from_tiff(path, &tiff)?;

        info!(
            "Inspected {}: {}x{}, {} band(s), {}, crs={:?}",
            path.display(),
            source.width(),
            source.height(),
            source.band_count(),
            source.pixel_type().name(),
            source.declared_crs()
        );
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiff::decoder::PixelType;
    use crate::tiff::geo_keys::DeclaredCrs;
    use crate::tiff::tests::test_utils::GeoTiffFixture;
    use std::io::Cursor;

    #[test]
    fn test_size_limit() {
        let validator = RasterValidator::new(10);
        assert_eq!(validator.check_size(&mut Cursor::new(vec![0u8; 10])).unwrap(), 10);
        assert!(matches!(
            validator.check_size(&mut Cursor::new(vec![0u8; 11])),
            Err(FormatError::TooLarge { size: 11, limit: 10 })
        ));
    }

    #[test]
    fn test_inspect_georeferenced_raster() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dem.tif");
        GeoTiffFixture::new(100, 100, 1)
            .pixel_type(PixelType::F32)
            .epsg(4326)
            .geotransform(14.0, 50.1, 0.001, 0.001)
            .write_to(&path);

        let source = RasterValidator::default().open_and_inspect(&path).unwrap();
        assert_eq!((source.width(), source.height(), source.band_count()), (100, 100, 1));
        assert_eq!(source.declared_crs(), Some(DeclaredCrs::Epsg(4326)));
        assert!(source.requires_byte_conversion());

        let bounds = source.bounds();
        assert!((bounds.min_x - 14.0).abs() < 1e-9 && (bounds.max_x - 14.1).abs() < 1e-9);
        assert!((bounds.min_y - 50.0).abs() < 1e-9 && (bounds.max_y - 50.1).abs() < 1e-9);
    }

    #[test]
    fn test_raster_without_crs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.tif");
        GeoTiffFixture::new(8, 8, 3).write_to(&path);

        let source = RasterValidator::default().open_and_inspect(&path).unwrap();
        assert_eq!(source.declared_crs(), None);
        assert!(!source.is_georeferenced());
        assert!(!source.requires_byte_conversion());
    }

    #[test]
    fn test_text_file_is_not_a_raster() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.tif");
        std::fs::write(&path, "this is not a raster at all").unwrap();

        assert!(matches!(
            RasterValidator::default().open_and_inspect(&path),
            Err(FormatError::NotARaster(_))
        ));
    }

    #[test]
    fn test_truncated_file_is_not_a_raster() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.tif");
        let bytes = GeoTiffFixture::new(8, 8, 1).epsg(2180).build();
        std::fs::write(&path, &bytes[..20]).unwrap();

        assert!(matches!(
            RasterValidator::default().open_and_inspect(&path),
            Err(FormatError::NotARaster(_))
        ));
    }

    #[test]
    fn test_oversized_file_is_rejected_before_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.tif");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();

        assert!(matches!(
            RasterValidator::new(1024).open_and_inspect(&path),
            Err(FormatError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_four_bands_open_but_cannot_publish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgba.tif");
        GeoTiffFixture::new(4, 4, 4).write_to(&path);

        let source = RasterValidator::default().open_and_inspect(&path).unwrap();
        assert!(matches!(
            source.ensure_publishable_bands(),
            Err(FormatError::UnsupportedBandCount(4))
        ));
    }
}
