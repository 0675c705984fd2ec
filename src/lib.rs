pub mod commands;
pub mod compression;
pub mod config;
pub mod convert;
pub mod coordinate;
pub mod error;
pub mod index;
pub mod io;
pub mod pipeline;
pub mod publish;
pub mod raster;
pub mod resolution;
pub mod tiff;
pub mod utils;

pub use config::AppConfig;
pub use convert::{CogConverter, RasterConverter, TiledOutput};
pub use coordinate::{reproject_bbox, reproject_point, BoundingBox, Crs};
pub use error::{PipelineError, PipelineResult};
pub use index::MetadataIndex;
pub use pipeline::{Pipeline, PublishedRaster, UploadFailure, UploadOutcome, UploadRequest, UploadSource};
pub use publish::PublishTarget;
pub use raster::{RasterSource, RasterValidator};
pub use resolution::{CrsResolution, CrsResolver};
