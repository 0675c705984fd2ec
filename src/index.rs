//! Metadata index of published rasters
//!
//! A JSON document mapping each published filename to its Web Mercator
//! bounding box, the destination it was published to and where it lives
//! there:
//!
//! ```json
//! {"dem.tif": {"bbox_epsg3857": "1558472.87,6446275.84,1569604.82,6463612.12",
//!              "target": "cog", "location": "https://rasters.s3.eu-central-1.amazonaws.com/cog/dem.tif"}}
//! ```
//!
//! Entries written before `target` existed carry only the bbox and are
//! treated as object-store uploads.
//!
//! The whole file is read on every lookup and rewritten on every `put`.
//! Writers replace the file atomically; concurrent writers are
//! last-writer-wins.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::coordinate::BoundingBox;
use crate::error::IndexError;
use crate::publish::object_store::public_object_url;
use crate::publish::PublishTarget;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexRecord {
    bbox_epsg3857: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

impl IndexRecord {
    fn target(&self) -> Option<PublishTarget> {
        self.target.as_deref().and_then(|t| t.parse().ok())
    }
}

/// A published raster as listed for viewers
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub filename: String,
    pub url: String,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone)]
pub struct MetadataIndex {
    path: PathBuf,
}

impl MetadataIndex {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        MetadataIndex { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records or replaces the entry of `filename`
    ///
    /// # Arguments
    /// * `bbox` - Extent in Web Mercator
    /// * `target` - Destination the raster was published to
    /// * `location` - Layer name or object URL returned by the publisher
    pub fn put(&self, filename: &str, bbox: &BoundingBox, target: PublishTarget, location: &str) -> Result<(), IndexError> {
        let mut records = self.read_records()?;
        records.insert(
            filename.to_string(),
            IndexRecord {
                bbox_epsg3857: bbox.to_string(),
                target: Some(target.to_string()),
                location: Some(location.to_string()).filter(|l| !l.is_empty()),
            },
        );

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, serde_json::to_vec_pretty(&records)?)?;
        fs::rename(&temp, &self.path)?;

        debug!("Indexed {} ({} entries)", filename, records.len());
        Ok(())
    }

    pub fn get(&self, filename: &str) -> Result<Option<BoundingBox>, IndexError> {
        let records = self.read_records()?;
        match records.get(filename) {
            None => Ok(None),
            Some(record) => record
                .bbox_epsg3857
                .parse()
                .map(Some)
                .map_err(|e| IndexError::Corrupt(format!("entry '{}': {}", filename, e))),
        }
    }

    /// Every entry with a readable bounding box, sorted by filename
    ///
    /// Entries that fail to parse are skipped with a warning.
    pub fn list(&self) -> Result<Vec<(String, BoundingBox)>, IndexError> {
        Ok(self
            .readable_records()?
            .into_iter()
            .map(|(filename, bbox, _)| (filename, bbox))
            .collect())
    }

    /// Object-store entries joined with the URL of their stored object
    ///
    /// Rasters served directly by the map server have no object and are
    /// left out. The recorded location is used when present, otherwise
    /// the URL is derived from bucket, region and key prefix.
    pub fn catalog(&self, bucket: &str, region: &str, key_prefix: &str) -> Result<Vec<CatalogEntry>, IndexError> {
        Ok(self
            .readable_records()?
            .into_iter()
            .filter(|(_, _, record)| record.target() != Some(PublishTarget::DirectServe))
            .map(|(filename, bbox, record)| CatalogEntry {
                url: record
                    .location
                    .unwrap_or_else(|| public_object_url(bucket, region, &format!("{}{}", key_prefix, filename))),
                filename,
                bbox,
            })
            .collect())
    }

    fn readable_records(&self) -> Result<Vec<(String, BoundingBox, IndexRecord)>, IndexError> {
        let records = self.read_records()?;
        Ok(records
            .into_iter()
            .filter_map(|(filename, record)| match record.bbox_epsg3857.parse::<BoundingBox>() {
                Ok(bbox) => Some((filename, bbox, record)),
                Err(e) => {
                    warn!("Skipping index entry '{}': {}", filename, e);
                    None
                }
            })
            .collect())
    }

    fn read_records(&self) -> Result<BTreeMap<String, IndexRecord>, IndexError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}
