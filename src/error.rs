//! Error types for the ingest pipeline
//!
//! Every stage of the pipeline owns its own error enum. `PipelineError`
//! wraps all of them so the orchestrator and the CLI can report a single
//! type while callers can still match on the stage that failed.

use std::fmt;
use std::io;

use crate::coordinate::crs::CrsKind;

/// Errors raised while opening or decoding an input raster
#[derive(Debug)]
pub enum FormatError {
    /// I/O error while reading the input
    Io(io::Error),
    /// Input exceeds the configured size limit
    TooLarge { size: u64, limit: u64 },
    /// Input could not be parsed as a raster
    NotARaster(String),
    /// Raster parsed, but its internal layout cannot be decoded
    UnsupportedLayout(String),
    /// Compression scheme the reader does not handle
    UnsupportedCompression(u64),
    /// Band count other than 1 or 3
    UnsupportedBandCount(usize),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::Io(e) => write!(f, "I/O error: {}", e),
            FormatError::TooLarge { size, limit } => write!(
                f,
                "File is too large: {} bytes (limit is {} bytes)",
                size, limit
            ),
            FormatError::NotARaster(msg) => write!(f, "Not a readable raster: {}", msg),
            FormatError::UnsupportedLayout(msg) => write!(f, "Unsupported raster layout: {}", msg),
            FormatError::UnsupportedCompression(c) => write!(f, "Unsupported compression method: {}", c),
            FormatError::UnsupportedBandCount(n) => write!(
                f,
                "Unsupported band count: {} (only 1 or 3 bands can be published)",
                n
            ),
        }
    }
}

impl std::error::Error for FormatError {}

impl From<io::Error> for FormatError {
    fn from(error: io::Error) -> Self {
        FormatError::Io(error)
    }
}

/// Result type for raster reading operations
pub type FormatResult<T> = Result<T, FormatError>;

/// Errors raised while resolving or applying a coordinate reference system
#[derive(Debug, Clone, PartialEq)]
pub enum CrsError {
    /// No CRS declared and no override supplied
    Missing,
    /// Override is not an integer or not a registered EPSG code
    BadEpsgCode(String),
    /// Declared CRS cannot be mapped to a known authority code
    UnsupportedCrs(String),
    /// CRS resolved but it is neither geographic nor projected
    UnsupportedCrsKind { code: u32, kind: CrsKind },
    /// Projection library failure
    Transform(String),
}

impl fmt::Display for CrsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrsError::Missing => write!(f, "Raster has no coordinate reference system; an EPSG code is required"),
            CrsError::BadEpsgCode(code) => write!(f, "Invalid EPSG code: '{}'", code),
            CrsError::UnsupportedCrs(msg) => write!(f, "Unsupported coordinate reference system: {}", msg),
            CrsError::UnsupportedCrsKind { code, kind } => write!(
                f,
                "EPSG:{} is a {} CRS; only geographic or projected systems are supported",
                code, kind
            ),
            CrsError::Transform(msg) => write!(f, "Coordinate transformation failed: {}", msg),
        }
    }
}

impl std::error::Error for CrsError {}

/// Result type for CRS operations
pub type CrsResult<T> = Result<T, CrsError>;

/// Errors raised while producing the tiled output
#[derive(Debug)]
pub enum ConversionError {
    /// Band count other than 1 or 3
    UnsupportedBandCount(usize),
    /// I/O error while writing the output
    Io(io::Error),
    /// Source band could not be read
    Read(FormatError),
    /// Reprojection failed
    Reproject(CrsError),
    /// Tile encoding failed
    Encode(String),
    /// Output would exceed the classic TIFF offset range
    OutputTooLarge(u64),
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::UnsupportedBandCount(n) => write!(f, "Cannot convert raster with {} bands", n),
            ConversionError::Io(e) => write!(f, "I/O error while writing output: {}", e),
            ConversionError::Read(e) => write!(f, "Failed to read source band: {}", e),
            ConversionError::Reproject(e) => write!(f, "Reprojection failed: {}", e),
            ConversionError::Encode(msg) => write!(f, "Tile encoding failed: {}", msg),
            ConversionError::OutputTooLarge(size) => write!(f, "Output of {} bytes exceeds the TIFF offset range", size),
        }
    }
}

impl std::error::Error for ConversionError {}

impl From<io::Error> for ConversionError {
    fn from(error: io::Error) -> Self {
        ConversionError::Io(error)
    }
}

impl From<FormatError> for ConversionError {
    fn from(error: FormatError) -> Self {
        ConversionError::Read(error)
    }
}

impl From<CrsError> for ConversionError {
    fn from(error: CrsError) -> Self {
        ConversionError::Reproject(error)
    }
}

/// Result type for conversion operations
pub type ConversionResult<T> = Result<T, ConversionError>;

/// Errors raised while publishing to a serving backend or object store
#[derive(Debug)]
pub enum PublishError {
    /// Request could not be sent or the response could not be read
    Transport(String),
    /// Map server answered with a non-success status
    Rejected { status: u16, body: String },
    /// Object store answered the upload with a non-success status
    UploadFailed { status: u16 },
    /// Upload authorization could not be produced
    Authorization(String),
    /// Local file could not be read
    Io(io::Error),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Transport(msg) => write!(f, "Transport error: {}", msg),
            PublishError::Rejected { status, body } => write!(f, "Publish rejected with status {}: {}", status, body),
            PublishError::UploadFailed { status } => write!(f, "Upload failed with status code {}", status),
            PublishError::Authorization(msg) => write!(f, "Could not authorize upload: {}", msg),
            PublishError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for PublishError {}

impl From<io::Error> for PublishError {
    fn from(error: io::Error) -> Self {
        PublishError::Io(error)
    }
}

impl From<reqwest::Error> for PublishError {
    fn from(error: reqwest::Error) -> Self {
        PublishError::Transport(error.to_string())
    }
}

/// Result type for publishing operations
pub type PublishResult<T> = Result<T, PublishError>;

/// Errors raised by the staging area
#[derive(Debug)]
pub enum StagingError {
    /// I/O error in the staging directory
    Io(io::Error),
    /// Filename is empty after sanitization
    InvalidFilename(String),
    /// Resume requested for a file that is not staged
    NotFound(String),
    /// Neither an upload nor a staged filename was supplied
    MissingInput,
}

impl fmt::Display for StagingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StagingError::Io(e) => write!(f, "Staging I/O error: {}", e),
            StagingError::InvalidFilename(name) => write!(f, "Invalid filename: '{}'", name),
            StagingError::NotFound(name) => write!(f, "Staged file not found: '{}'", name),
            StagingError::MissingInput => write!(f, "No file supplied"),
        }
    }
}

impl std::error::Error for StagingError {}

impl From<io::Error> for StagingError {
    fn from(error: io::Error) -> Self {
        StagingError::Io(error)
    }
}

/// Errors raised while loading configuration
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Could not read configuration: {}", e),
            ConfigError::Parse(msg) => write!(f, "Could not parse configuration: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(error: io::Error) -> Self {
        ConfigError::Io(error)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(error: toml::de::Error) -> Self {
        ConfigError::Parse(error.to_string())
    }
}

/// Errors raised by the metadata index
#[derive(Debug)]
pub enum IndexError {
    Io(io::Error),
    Corrupt(String),
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexError::Io(e) => write!(f, "Metadata index I/O error: {}", e),
            IndexError::Corrupt(msg) => write!(f, "Metadata index is corrupt: {}", msg),
        }
    }
}

impl std::error::Error for IndexError {}

impl From<io::Error> for IndexError {
    fn from(error: io::Error) -> Self {
        IndexError::Io(error)
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(error: serde_json::Error) -> Self {
        IndexError::Corrupt(error.to_string())
    }
}

/// Any failure surfaced by the pipeline or the CLI
#[derive(Debug)]
pub enum PipelineError {
    Format(FormatError),
    Crs(CrsError),
    Conversion(ConversionError),
    Publish(PublishError),
    Staging(StagingError),
    Config(ConfigError),
    Index(IndexError),
    /// Request is missing a required field or carries a malformed one
    InvalidRequest(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Format(e) => write!(f, "{}", e),
            PipelineError::Crs(e) => write!(f, "{}", e),
            PipelineError::Conversion(e) => write!(f, "{}", e),
            PipelineError::Publish(e) => write!(f, "{}", e),
            PipelineError::Staging(e) => write!(f, "{}", e),
            PipelineError::Config(e) => write!(f, "{}", e),
            PipelineError::Index(e) => write!(f, "{}", e),
            PipelineError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

macro_rules! impl_from_stage_error {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for PipelineError {
                fn from(error: $source) -> Self {
                    PipelineError::$variant(error)
                }
            }
        )*
    };
}

impl_from_stage_error! {
    FormatError => Format,
    CrsError => Crs,
    ConversionError => Conversion,
    PublishError => Publish,
    StagingError => Staging,
    ConfigError => Config,
    IndexError => Index,
}

/// Result type for pipeline and CLI operations
pub type PipelineResult<T> = Result<T, PipelineError>;
