//! Read-only view of an opened raster

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::coordinate::{BoundingBox, GeoTransform};
use crate::error::{FormatError, FormatResult};
use crate::io::byte_order::ByteOrder;
use crate::tiff::decoder::{BandDecoder, PixelType, SampleLayout};
use crate::tiff::geo_keys::{DeclaredCrs, GeoReference};
use crate::tiff::types::TIFF;

/// An opened raster: dimensions, bands, pixel type and georeferencing
///
/// Construction parses the directory once; bands are decoded on demand.
#[derive(Debug, Clone)]
pub struct RasterSource {
    path: PathBuf,
    byte_order: ByteOrder,
    layout: SampleLayout,
    georeference: GeoReference,
    overview_count: usize,
}

impl RasterSource {
    /// Builds a source from an already parsed TIFF
    pub fn from_tiff(path: &Path, tiff: &TIFF) -> FormatResult<Self> {
        let ifd = tiff
            .main_ifd()
            .ok_or_else(|| FormatError::NotARaster("file contains no image directory".to_string()))?;

        Ok(RasterSource {
            path: path.to_path_buf(),
            byte_order: tiff.byte_order,
            layout: SampleLayout::from_ifd(ifd)?,
            georeference: GeoReference::from_ifd(ifd),
            overview_count: tiff.overviews().len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn width(&self) -> usize {
        self.layout.width
    }

    pub fn height(&self) -> usize {
        self.layout.height
    }

    pub fn band_count(&self) -> usize {
        self.layout.samples_per_pixel
    }

    pub fn pixel_type(&self) -> PixelType {
        self.layout.pixel_type
    }

    pub fn compression(&self) -> u64 {
        self.layout.compression
    }

    pub fn overview_count(&self) -> usize {
        self.overview_count
    }

    /// CRS as declared by the file, if any
    pub fn declared_crs(&self) -> Option<DeclaredCrs> {
        self.georeference.declared_crs
    }

    /// Pixel-to-world transform; pixel space when the file has none
    pub fn geotransform(&self) -> GeoTransform {
        self.georeference.transform.unwrap_or_else(GeoTransform::identity)
    }

    pub fn is_georeferenced(&self) -> bool {
        self.georeference.transform.is_some()
    }

    /// Extent in the raster's own coordinates
    pub fn bounds(&self) -> BoundingBox {
        self.geotransform().bounds(self.width() as u64, self.height() as u64)
    }

    pub fn citation(&self) -> Option<&str> {
        self.georeference.citation.as_deref()
    }

    /// Samples must be rescaled before they fit an 8-bit JPEG tile
    pub fn requires_byte_conversion(&self) -> bool {
        self.pixel_type() != PixelType::U8
    }

    /// Only single-band and three-band rasters can be published
    pub fn ensure_publishable_bands(&self) -> FormatResult<()> {
        match self.band_count() {
            1 | 3 => Ok(()),
            n => Err(FormatError::UnsupportedBandCount(n)),
        }
    }

    /// Decodes band `band` (0-based) as floating point
    pub fn read_band(&self, band: usize) -> FormatResult<Vec<f32>> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::with_capacity(1024 * 1024, file);
        BandDecoder::new(&self.layout, self.byte_order)?.read_band(&mut reader, band)
    }
}
