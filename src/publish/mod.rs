//! Publishing clients
//!
//! Two destinations exist: a GeoServer instance that receives the staged
//! raster through its REST API, and an S3 bucket that receives the
//! converted tiled output through a presigned POST.

pub mod geoserver;
pub mod object_store;
pub mod presign;

use std::fmt;
use std::str::FromStr;

pub use geoserver::{CoverageBackend, GeoServerClient, LayerExtent};
pub use object_store::{ObjectUploader, PresignedPostUploader};
pub use presign::{PresignedPost, S3PostSigner, UploadAuthorizer};

/// Where a raster is published
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishTarget {
    /// Raw file handed to the map server
    DirectServe,
    /// Converted tiled output placed in object storage
    ObjectStore,
}

impl FromStr for PublishTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "geoserver" | "direct" => Ok(PublishTarget::DirectServe),
            "cog" | "s3" | "object-store" => Ok(PublishTarget::ObjectStore),
            other => Err(format!("unknown publish target '{}' (expected geoserver or cog)", other)),
        }
    }
}

impl fmt::Display for PublishTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishTarget::DirectServe => write!(f, "geoserver"),
            PublishTarget::ObjectStore => write!(f, "cog"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target() {
        assert_eq!("geoserver".parse::<PublishTarget>(), Ok(PublishTarget::DirectServe));
        assert_eq!(" COG ".parse::<PublishTarget>(), Ok(PublishTarget::ObjectStore));
        assert_eq!("s3".parse::<PublishTarget>(), Ok(PublishTarget::ObjectStore));
        assert!("ftp".parse::<PublishTarget>().is_err());
        assert_eq!(PublishTarget::ObjectStore.to_string(), "cog");
    }
}
