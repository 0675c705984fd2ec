//! Upload orchestration
//!
//! One call to `Pipeline::upload` runs a request from start to finish:
//! stage the file, validate it, resolve its CRS, derive the Web Mercator
//! bounding box, publish (converting first for the object-store target)
//! and record the result in the metadata index.
//!
//! A raster without a CRS ends the call with `UploadOutcome::NeedsCrs`;
//! the staged file is kept so the caller can resubmit the same filename
//! with an EPSG code.

use log::{info, warn};
use std::fmt;

use crate::config::AppConfig;
use crate::convert::{CogConverter, RasterConverter};
use crate::coordinate::{reproject_bbox, BoundingBox, Crs};
use crate::error::{PipelineError, PipelineResult, StagingError};
use crate::index::MetadataIndex;
use crate::io::seekable::SeekableReader;
use crate::publish::{
    CoverageBackend, GeoServerClient, ObjectUploader, PresignedPostUploader, PublishTarget, S3PostSigner,
};
use crate::raster::staging::{ScopedPath, StagedFile, StagingArea};
use crate::raster::validator::RasterValidator;
use crate::resolution::{CrsResolution, CrsResolver};

/// Where the raster of a request comes from
pub enum UploadSource<'a> {
    /// A new upload; `filename` is the client-supplied name
    Stream {
        filename: String,
        reader: &'a mut dyn SeekableReader,
    },
    /// A file staged by an earlier request
    Staged { filename: String },
}

pub struct UploadRequest<'a> {
    pub layer_name: String,
    pub target: PublishTarget,
    pub epsg_override: Option<String>,
    pub source: Option<UploadSource<'a>>,
}

/// A successfully published raster
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedRaster {
    /// Sanitized staging name
    pub filename: String,
    pub layer_name: String,
    pub target: PublishTarget,
    /// Extent in Web Mercator
    pub bbox: BoundingBox,
    /// CRS the raster was resolved to
    pub crs: Crs,
    /// Layer name on the map server or object URL
    pub location: String,
    /// Whether the metadata index was updated
    pub indexed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Published(PublishedRaster),
    /// Resubmit `filename` with an EPSG code
    NeedsCrs { filename: String, layer_name: String },
}

/// A failed request plus what the caller needs to retry it
#[derive(Debug)]
pub struct UploadFailure {
    pub error: PipelineError,
    /// Sanitized filename, once the file was staged
    pub filename: Option<String>,
    pub layer_name: String,
    /// The staged file is still there and can be resubmitted by name
    pub staged_file_retained: bool,
}

impl fmt::Display for UploadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for UploadFailure {}

impl From<UploadFailure> for PipelineError {
    fn from(failure: UploadFailure) -> Self {
        failure.error
    }
}

/// Runs uploads against configured collaborators
pub struct Pipeline {
    staging: StagingArea,
    validator: RasterValidator,
    index: MetadataIndex,
    converter: Box<dyn RasterConverter>,
    backend: Option<Box<dyn CoverageBackend>>,
    uploader: Option<Box<dyn ObjectUploader>>,
    key_prefix: String,
}

impl Pipeline {
    pub fn new(staging: StagingArea, validator: RasterValidator, index: MetadataIndex) -> Self {
        Pipeline {
            staging,
            validator,
            index,
            converter: Box::new(CogConverter::default()),
            backend: None,
            uploader: None,
            key_prefix: "cog/".to_string(),
        }
    }

    /// Wires the production collaborators from configuration
    ///
    /// The object-store path is only available when a bucket and
    /// credentials are configured.
    pub fn from_config(config: &AppConfig) -> PipelineResult<Self> {
        let staging = StagingArea::new(&config.staging.upload_folder);
        staging.ensure_directories()?;

        let converter = CogConverter::new(config.object_store.jpeg_quality).with_progress(true);
        let mut pipeline = Pipeline::new(
            staging,
            RasterValidator::new(config.staging.max_upload_bytes),
            MetadataIndex::new(&config.index.path),
        )
        .with_converter(Box::new(converter))
        .with_backend(Box::new(GeoServerClient::new(config.geoserver.clone())?))
        .with_key_prefix(&config.object_store.key_prefix);

        if config.object_store.is_configured() {
            let signer = S3PostSigner::new(&config.object_store);
            pipeline = pipeline.with_uploader(Box::new(PresignedPostUploader::new(signer, &config.object_store)?));
        }
        Ok(pipeline)
    }

    pub fn with_converter(mut self, converter: Box<dyn RasterConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_backend(mut self, backend: Box<dyn CoverageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_uploader(mut self, uploader: Box<dyn ObjectUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn with_key_prefix(mut self, prefix: &str) -> Self {
        self.key_prefix = prefix.to_string();
        self
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    pub fn index(&self) -> &MetadataIndex {
        &self.index
    }

    /// Runs one upload request
    ///
    /// The staged file is removed on every exit path except a missing or
    /// rejected CRS, where it is kept for resubmission. Converted output
    /// never outlives the call.
    pub fn upload(&self, request: UploadRequest<'_>) -> Result<UploadOutcome, UploadFailure> {
        let UploadRequest {
            layer_name,
            target,
            epsg_override,
            source,
        } = request;
        let fail = |error: PipelineError, filename: Option<String>, retained: bool| UploadFailure {
            error,
            filename,
            layer_name: layer_name.clone(),
            staged_file_retained: retained,
        };

        if let Err(error) = self.check_request(&layer_name, target) {
            return Err(fail(error, None, false));
        }
        let staged = match self.stage(source) {
            Ok(staged) => staged,
            Err(error) => return Err(fail(error, None, false)),
        };
        info!("Processing {} for layer '{}' ({})", staged.filename, layer_name, target);

        match self.process(&staged, &layer_name, target, epsg_override.as_deref()) {
            Ok(outcome @ UploadOutcome::NeedsCrs { .. }) => {
                info!("Keeping {} until an EPSG code is supplied", staged.filename);
                Ok(outcome)
            }
            Ok(outcome) => {
                self.staging.discard(&staged);
                Ok(outcome)
            }
            Err(error @ PipelineError::Crs(_)) => {
                warn!("CRS of {} rejected, keeping it for resubmission: {}", staged.filename, error);
                Err(fail(error, Some(staged.filename), true))
            }
            Err(error) => {
                warn!("Upload of {} failed: {}", staged.filename, error);
                self.staging.discard(&staged);
                Err(fail(error, Some(staged.filename), false))
            }
        }
    }

    fn check_request(&self, layer_name: &str, target: PublishTarget) -> PipelineResult<()> {
        match target {
            PublishTarget::DirectServe if layer_name.trim().is_empty() => Err(PipelineError::InvalidRequest(
                "a layer name is required to publish to GeoServer".to_string(),
            )),
            PublishTarget::DirectServe if self.backend.is_none() => Err(PipelineError::InvalidRequest(
                "no map server is configured".to_string(),
            )),
            PublishTarget::ObjectStore if self.uploader.is_none() => Err(PipelineError::InvalidRequest(
                "object storage is not configured (bucket and credentials required)".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Writes a new upload to staging, or finds an earlier one
    fn stage(&self, source: Option<UploadSource<'_>>) -> PipelineResult<StagedFile> {
        match source {
            Some(UploadSource::Stream { filename, reader }) => {
                self.validator.check_size(reader)?;
                Ok(self.staging.save(&filename, reader)?)
            }
            Some(UploadSource::Staged { filename }) => Ok(self.staging.locate(&filename)?),
            None => Err(StagingError::MissingInput.into()),
        }
    }

    fn process(
        &self,
        staged: &StagedFile,
        layer_name: &str,
        target: PublishTarget,
        epsg_override: Option<&str>,
    ) -> PipelineResult<UploadOutcome> {
        let source = self.validator.open_and_inspect(&staged.path)?;
        source.ensure_publishable_bands()?;

        let crs = match CrsResolver::resolve(source.declared_crs(), epsg_override) {
            CrsResolution::Resolved(crs) => crs,
            CrsResolution::NeedsUserInput => {
                return Ok(UploadOutcome::NeedsCrs {
                    filename: staged.filename.clone(),
                    layer_name: layer_name.to_string(),
                })
            }
            CrsResolution::Invalid(error) => return Err(error.into()),
        };

        let display = Crs::web_mercator();
        let bbox = reproject_bbox(&source.bounds(), &crs, &display)?;
        info!("Bounding box of {} in {}: {}", staged.filename, display, bbox);

        let location = match target {
            PublishTarget::DirectServe => self.publish_direct(layer_name, staged)?,
            PublishTarget::ObjectStore => {
                let output = ScopedPath::new(self.staging.converted_path(staged));
                let tiled = self.converter.convert(&source, &crs, &display, output.path())?;
                let key = format!("{}{}", self.key_prefix, staged.filename);
                self.upload_object(&key, &tiled.path)?
            }
        };

        let indexed = match self.index.put(&staged.filename, &bbox, target, &location) {
            Ok(()) => true,
            Err(e) => {
                warn!("Published {} but could not update the index: {}", staged.filename, e);
                false
            }
        };

        Ok(UploadOutcome::Published(PublishedRaster {
            filename: staged.filename.clone(),
            layer_name: layer_name.to_string(),
            target,
            bbox,
            crs,
            location,
            indexed,
        }))
    }

    fn publish_direct(&self, layer_name: &str, staged: &StagedFile) -> PipelineResult<String> {
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| PipelineError::InvalidRequest("no map server is configured".to_string()))?;
        Ok(backend.publish_coverage(layer_name, &staged.path)?)
    }

    fn upload_object(&self, key: &str, path: &std::path::Path) -> PipelineResult<String> {
        let uploader = self
            .uploader
            .as_ref()
            .ok_or_else(|| PipelineError::InvalidRequest("object storage is not configured".to_string()))?;
        Ok(uploader.upload(key, path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::TiledOutput;
    use crate::error::{ConversionError, ConversionResult, PublishResult};
    use crate::raster::RasterSource;
    use crate::tiff::tests::test_utils::GeoTiffFixture;
    use std::cell::Cell;
    use std::fs::File;
    use std::io::{self, Cursor, Write};
    use std::path::Path;
    use std::rc::Rc;

    #[derive(Default)]
    struct CountingUploader {
        calls: Rc<Cell<usize>>,
    }

    impl ObjectUploader for CountingUploader {
        fn upload(&self, key: &str, _path: &Path) -> PublishResult<String> {
            self.calls.set(self.calls.get() + 1);
            Ok(key.to_string())
        }
    }

    /// Accepts a few bytes, then fails every write
    struct ShortWriter {
        file: File,
        budget: usize,
    }

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "no space left on device"));
            }
            let n = buf.len().min(self.budget);
            self.budget -= n;
            self.file.write(&buf[..n])
        }

        fn flush(&mut self) -> io::Result<()> {
            self.file.flush()
        }
    }

    /// The production converter writing through `ShortWriter`
    struct ShortWriteConverter(CogConverter);

    impl RasterConverter for ShortWriteConverter {
        fn convert(&self, source: &RasterSource, source_crs: &Crs, target: &Crs, output: &Path)
            -> ConversionResult<TiledOutput> {
            self.0
                .convert_with(source, source_crs, target, output, |file| ShortWriter { file, budget: 256 })
        }
    }

    fn raster_bytes() -> Vec<u8> {
        GeoTiffFixture::new(48, 48, 3)
            .epsg(4326)
            .geotransform(14.0, 50.1, 0.002, 0.002)
            .fill(|band, x, y| (band as u32 * 40 + x + y) as f64)
            .build()
    }

    fn pipeline(root: &Path, calls: &Rc<Cell<usize>>) -> Pipeline {
        Pipeline::new(
            StagingArea::new(root.join("uploads")),
            RasterValidator::default(),
            MetadataIndex::new(root.join("metadata.json")),
        )
        .with_uploader(Box::new(CountingUploader { calls: calls.clone() }))
    }

    fn request<'a>(reader: &'a mut Cursor<Vec<u8>>) -> UploadRequest<'a> {
        UploadRequest {
            layer_name: String::new(),
            target: PublishTarget::ObjectStore,
            epsg_override: None,
            source: Some(UploadSource::Stream {
                filename: "ortho.tif".to_string(),
                reader,
            }),
        }
    }

    fn leftover_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn test_mid_write_failure_never_reaches_uploader() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Rc::new(Cell::new(0));
        let pipeline = pipeline(dir.path(), &calls).with_converter(Box::new(ShortWriteConverter(CogConverter::default())));

        let mut reader = Cursor::new(raster_bytes());
        let failure = pipeline.upload(request(&mut reader)).unwrap_err();

        assert!(matches!(failure.error, PipelineError::Conversion(ConversionError::Io(_))));
        assert!(!failure.staged_file_retained);
        assert_eq!(calls.get(), 0);
        assert!(leftover_files(&dir.path().join("uploads")).is_empty());
        assert!(pipeline.index().list().unwrap().is_empty());
    }

    #[test]
    fn test_default_converter_failure_never_reaches_uploader() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Rc::new(Cell::new(0));
        let pipeline = pipeline(dir.path(), &calls);

        // A directory in the way of the converted output makes creating it fail
        std::fs::create_dir_all(dir.path().join("uploads").join("converted_ortho.tif")).unwrap();

        let mut reader = Cursor::new(raster_bytes());
        let failure = pipeline.upload(request(&mut reader)).unwrap_err();

        assert!(matches!(failure.error, PipelineError::Conversion(ConversionError::Io(_))));
        assert_eq!(calls.get(), 0);
        assert!(!dir.path().join("uploads").join("ortho.tif").exists());
    }

    #[test]
    fn test_successful_conversion_is_uploaded_once_and_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Rc::new(Cell::new(0));
        let pipeline = pipeline(dir.path(), &calls);

        let mut reader = Cursor::new(raster_bytes());
        let outcome = pipeline.upload(request(&mut reader)).unwrap();

        assert!(matches!(outcome, UploadOutcome::Published(_)));
        assert_eq!(calls.get(), 1);
        assert!(leftover_files(&dir.path().join("uploads")).is_empty());
    }
}
