//! Tiled GeoTIFF converter
//!
//! Produces the published artifact for the object-store path: 8-bit
//! samples, pixel-interleaved 512x512 JPEG tiles, overviews halving down
//! to a single tile, georeferenced in the target CRS.

use log::{debug, info, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::compression::{JpegTileEncoder, TileEncoder};
use crate::convert::rescale::rescale_to_byte;
use crate::convert::warp::WarpPlan;
use crate::coordinate::{CoordinateTransformer, Crs};
use crate::error::{ConversionError, ConversionResult};
use crate::raster::source::RasterSource;
use crate::raster::staging::ScopedPath;
use crate::tiff::constants::tags;
use crate::tiff::geo_keys::{key_directory_for, model_entries};
use crate::tiff::ifd::{IFDEntry, TagValue};
use crate::tiff::writer::{EncodedLevel, TiledTiffWriter};
use crate::utils::progress::ProgressTracker;

/// Internal tile edge in pixels
pub const DEFAULT_TILE_SIZE: u32 = 512;

/// A finished tiled output file
#[derive(Debug, Clone, PartialEq)]
pub struct TiledOutput {
    pub path: PathBuf,
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub crs: Crs,
    pub overview_count: usize,
    pub bytes: u64,
}

/// Converts a raster into a tiled output file
pub trait RasterConverter {
    /// # Arguments
    /// * `source` - Validated input raster
    /// * `source_crs` - CRS the input is resolved to
    /// * `target` - CRS of the output grid
    /// * `output` - Destination path; removed again if conversion fails
    fn convert(&self, source: &RasterSource, source_crs: &Crs, target: &Crs, output: &Path)
        -> ConversionResult<TiledOutput>;
}

/// Cloud-optimized style converter: tiled JPEG GeoTIFF with overviews
#[derive(Debug, Clone)]
pub struct CogConverter {
    tile_size: u32,
    quality: u8,
    show_progress: bool,
}

impl Default for CogConverter {
    fn default() -> Self {
        CogConverter::new(crate::compression::DEFAULT_JPEG_QUALITY)
    }
}

impl CogConverter {
    pub fn new(quality: u8) -> Self {
        CogConverter {
            tile_size: DEFAULT_TILE_SIZE,
            quality,
            show_progress: false,
        }
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size.max(16);
        self
    }

    /// Draws a progress bar when attached to a terminal
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Converts, writing through a wrapper around the output file
    ///
    /// `wrap` receives the freshly created file and returns the writer the
    /// TIFF is written to, which lets callers add buffering or
    /// instrumentation. On any error the partial output is deleted.
    pub fn convert_with<W, F>(
        &self,
        source: &RasterSource,
        source_crs: &Crs,
        target: &Crs,
        output: &Path,
        wrap: F,
    ) -> ConversionResult<TiledOutput>
    where
        W: Write,
        F: FnOnce(File) -> W,
    {
        let band_count = source.band_count();
        if band_count != 1 && band_count != 3 {
            return Err(ConversionError::UnsupportedBandCount(band_count));
        }

        let plan = self.plan_grid(source, source_crs, target)?;
        let (width, height, transform) = match &plan {
            Some(plan) => (plan.width, plan.height, plan.transform),
            None => (source.width(), source.height(), source.geotransform()),
        };
        info!(
            "Converting {} ({}x{}, {} band(s)) from {} to {}x{} in {}",
            source.path().display(),
            source.width(),
            source.height(),
            band_count,
            source_crs,
            width,
            height,
            target
        );

        let progress = ProgressTracker::for_terminal(self.show_progress, band_count as u64 + 1, "Converting bands");
        let mut bands = Vec::with_capacity(band_count);
        for band in 0..band_count {
            let scaled = rescale_to_byte(&source.read_band(band)?);
            let warped = match &plan {
                Some(plan) => plan.apply(&scaled),
                None => scaled,
            };
            debug!("Band {} ready ({} samples)", band + 1, warped.len());
            bands.push(warped);
            progress.increment(1);
        }

        progress.set_message("Encoding tiles");
        let pixels = interleave(&bands, width * height);
        let levels = self.encode_levels(pixels, width, height, band_count)?;

        let encoder = JpegTileEncoder::new(self.quality);
        let mut geo_entries = model_entries(&transform);
        geo_entries.push(IFDEntry::new(
            tags::GEO_KEY_DIRECTORY_TAG,
            TagValue::Short(key_directory_for(target)),
        ));
        let writer = TiledTiffWriter::new(self.tile_size, band_count, encoder.code(), encoder.photometric(band_count))
            .with_geo_entries(geo_entries);

        let guard = ScopedPath::new(output);
        let mut sink = wrap(File::create(output)?);
        let written = writer.write(&mut sink, &levels).and_then(|n| {
            sink.flush()?;
            Ok(n)
        });
        let bytes = match written {
            Ok(bytes) => bytes,
            Err(e) => {
                progress.abandon("Conversion failed");
                warn!("Conversion of {} failed, removing partial output", source.path().display());
                return Err(e);
            }
        };
        drop(sink);
        let path = guard.keep();
        progress.increment(1);
        progress.finish();

        info!("Wrote {} ({} bytes, {} overview(s))", path.display(), bytes, levels.len() - 1);
        Ok(TiledOutput {
            path,
            width,
            height,
            band_count,
            crs: target.clone(),
            overview_count: levels.len() - 1,
            bytes,
        })
    }

    /// Destination grid when the CRS changes, `None` for a pass-through
    fn plan_grid(&self, source: &RasterSource, source_crs: &Crs, target: &Crs) -> ConversionResult<Option<WarpPlan>> {
        if source_crs == target {
            return Ok(None);
        }
        if !source.is_georeferenced() {
            warn!(
                "{} has no geotransform; warping pixel coordinates as {}",
                source.path().display(),
                source_crs
            );
        }

        let forward = CoordinateTransformer::new(source_crs, target)?;
        let inverse = CoordinateTransformer::new(target, source_crs)?;
        let plan = WarpPlan::plan(source.width(), source.height(), &source.geotransform(), &forward, &inverse)?;
        Ok(Some(plan))
    }

    /// Full resolution plus halved overviews until a level fits one tile
    fn encode_levels(
        &self,
        pixels: Vec<u8>,
        width: usize,
        height: usize,
        samples: usize,
    ) -> ConversionResult<Vec<EncodedLevel>> {
        let encoder = JpegTileEncoder::new(self.quality);
        let tile = self.tile_size as usize;
        let mut levels = Vec::new();
        let (mut current, mut w, mut h) = (pixels, width, height);

        loop {
            levels.push(EncodedLevel::encode(&current, w as u32, h as u32, samples, self.tile_size, &encoder)?);
            if w <= tile && h <= tile {
                break;
            }
            let (next, nw, nh) = downsample(&current, w, h, samples);
            current = next;
            w = nw;
            h = nh;
        }
        debug!("Encoded {} level(s)", levels.len());
        Ok(levels)
    }
}

impl RasterConverter for CogConverter {
    fn convert(
        &self,
        source: &RasterSource,
        source_crs: &Crs,
        target: &Crs,
        output: &Path,
    ) -> ConversionResult<TiledOutput> {
        self.convert_with(source, source_crs, target, output, BufWriter::new)
    }
}

/// Merges separate bands into pixel-interleaved samples
fn interleave(bands: &[Vec<u8>], pixel_count: usize) -> Vec<u8> {
    if bands.len() == 1 {
        return bands[0].clone();
    }
    let mut pixels = Vec::with_capacity(pixel_count * bands.len());
    for i in 0..pixel_count {
        pixels.extend(bands.iter().map(|band| band[i]));
    }
    pixels
}

/// Halves an interleaved image, averaging each 2x2 block
///
/// Odd edges average the pixels that exist.
fn downsample(pixels: &[u8], width: usize, height: usize, samples: usize) -> (Vec<u8>, usize, usize) {
    let (nw, nh) = (width.div_ceil(2), height.div_ceil(2));
    let mut out = vec![0u8; nw * nh * samples];

    for y in 0..nh {
        for x in 0..nw {
            for s in 0..samples {
                let mut sum = 0u32;
                let mut count = 0u32;
                for sy in (2 * y)..(2 * y + 2).min(height) {
                    for sx in (2 * x)..(2 * x + 2).min(width) {
                        sum += pixels[(sy * width + sx) * samples + s] as u32;
                        count += 1;
                    }
                }
                out[(y * nw + x) * samples + s] = (sum / count) as u8;
            }
        }
    }
    (out, nw, nh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::validator::RasterValidator;
    use crate::tiff::decoder::PixelType;
    use crate::tiff::reader::TiffReader;
    use crate::tiff::tests::test_utils::GeoTiffFixture;
    use std::io;

    #[test]
    fn test_interleave_and_downsample() {
        let pixels = interleave(&[vec![1, 2], vec![3, 4], vec![5, 6]], 2);
        assert_eq!(pixels, vec![1, 3, 5, 2, 4, 6]);

        let (small, w, h) = downsample(&[0, 10, 20, 30, 40, 50], 3, 2, 1);
        assert_eq!((w, h), (2, 1));
        // Odd right edge averages only the two pixels that exist
        assert_eq!(small, vec![20, 35]);
    }

    #[test]
    fn test_rejects_band_count_before_any_io() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("two.tif");
        GeoTiffFixture::new(4, 4, 2).epsg(3857).geotransform(0.0, 4.0, 1.0, 1.0).write_to(&input);
        let source = RasterValidator::default().open_and_inspect(&input).unwrap();

        let output = dir.path().join("out.tif");
        let crs = Crs::web_mercator();
        let result = CogConverter::default().convert(&source, &crs, &crs, &output);
        assert!(matches!(result, Err(ConversionError::UnsupportedBandCount(2))));
        assert!(!output.exists());
    }

    #[test]
    fn test_pass_through_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("rgb.tif");
        GeoTiffFixture::new(40, 30, 3)
            .pixel_type(PixelType::U16)
            .epsg(3857)
            .geotransform(1000.0, 2000.0, 10.0, 10.0)
            .fill(|band, x, y| (band as u32 * 1000 + x * 10 + y) as f64)
            .write_to(&input);
        let source = RasterValidator::default().open_and_inspect(&input).unwrap();

        let output = dir.path().join("converted_rgb.tif");
        let crs = Crs::web_mercator();
        let result = CogConverter::default().with_tile_size(16).convert(&source, &crs, &crs, &output).unwrap();

        assert_eq!((result.width, result.height, result.band_count), (40, 30, 3));
        assert_eq!(result.overview_count, 2);
        assert_eq!(result.bytes, std::fs::metadata(&output).unwrap().len());

        let tiff = TiffReader::new().load(&output).unwrap();
        assert_eq!(tiff.ifd_count(), 3);
        let written = RasterValidator::default().open_and_inspect(&output).unwrap();
        assert_eq!(written.declared_crs(), Some(crate::tiff::geo_keys::DeclaredCrs::Epsg(3857)));
        assert_eq!(written.pixel_type(), PixelType::U8);
        assert!(written.bounds().approx_eq(&source.bounds(), 1e-6));
        assert_eq!(written.compression(), 7);

        // Bands rescale identically, so the tiles are grey and survive JPEG closely
        let band = written.read_band(0).unwrap();
        assert_eq!(band.len(), 40 * 30);
        assert!(band[0] < 40.0, "top-left {}", band[0]);
        assert!(band[40 * 30 - 1] > 215.0, "bottom-right {}", band[40 * 30 - 1]);
    }

    #[test]
    fn test_reprojecting_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("dem.tif");
        GeoTiffFixture::new(50, 50, 1)
            .pixel_type(PixelType::F32)
            .epsg(4326)
            .geotransform(14.0, 50.1, 0.002, 0.002)
            .fill(|_, x, y| (x + y) as f64 * 0.5)
            .write_to(&input);
        let source = RasterValidator::default().open_and_inspect(&input).unwrap();

        let output = dir.path().join("converted_dem.tif");
        let wgs84 = Crs::from_epsg(4326).unwrap();
        let result = CogConverter::default()
            .convert(&source, &wgs84, &Crs::web_mercator(), &output)
            .unwrap();

        assert!(result.height > result.width);
        let written = RasterValidator::default().open_and_inspect(&output).unwrap();
        let bounds = written.bounds();
        assert!((bounds.min_x - 1558472.87).abs() < 1.0);
        assert!((bounds.max_y - 6463612.12).abs() < 1.0);
    }

    struct FailingWriter {
        inner: File,
        remaining: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            let n = buf.len().min(self.remaining);
            self.remaining -= n;
            self.inner.write(&buf[..n])
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    #[test]
    fn test_failed_write_removes_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("grey.tif");
        GeoTiffFixture::new(64, 64, 1)
            .epsg(3857)
            .geotransform(0.0, 64.0, 1.0, 1.0)
            .fill(|_, x, y| ((x * y) % 256) as f64)
            .write_to(&input);
        let source = RasterValidator::default().open_and_inspect(&input).unwrap();

        let output = dir.path().join("converted_grey.tif");
        let crs = Crs::web_mercator();
        let result = CogConverter::default().convert_with(&source, &crs, &crs, &output, |file| FailingWriter {
            inner: file,
            remaining: 100,
        });

        assert!(matches!(result, Err(ConversionError::Io(_))));
        assert!(!output.exists());
    }
}
