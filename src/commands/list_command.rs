//! Lists published rasters from the metadata index

use log::info;

use crate::commands::command_traits::Command;
use crate::config::AppConfig;
use crate::error::PipelineResult;
use crate::index::MetadataIndex;

pub struct ListCommand<'a> {
    config: &'a AppConfig,
}

impl<'a> ListCommand<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        ListCommand { config }
    }
}

impl<'a> Command for ListCommand<'a> {
    fn execute(&self) -> PipelineResult<()> {
        let index = MetadataIndex::new(&self.config.index.path);
        let store = &self.config.object_store;

        if store.bucket.is_empty() {
            let entries = index.list()?;
            info!("{} raster(s) in {}", entries.len(), index.path().display());
            for (filename, bbox) in entries {
                info!("  {}  bbox={}", filename, bbox);
            }
        } else {
            let catalog = index.catalog(&store.bucket, &store.region, &store.key_prefix)?;
            info!("{} raster(s) in s3://{}/{}", catalog.len(), store.bucket, store.key_prefix);
            for entry in catalog {
                info!("  {}  {}  bbox={}", entry.filename, entry.url, entry.bbox);
            }
        }
        Ok(())
    }
}
