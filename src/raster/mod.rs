//! Input rasters: opening, inspection and staging
//!
//! This module provides the read-only `RasterSource` view of an uploaded
//! file, the validator that enforces size and format rules, and the
//! staging area that holds uploads between requests.

pub mod source;
pub mod staging;
pub mod validator;

pub use source::RasterSource;
pub use staging::{ScopedPath, StagedFile, StagingArea};
pub use validator::{RasterValidator, DEFAULT_MAX_UPLOAD_BYTES};
