//! Raster inspection command
//!
//! Runs the validator and the CRS resolution on a local file and reports
//! what an upload would do with it, without staging or publishing.

use clap::ArgMatches;
use log::{info, warn};
use std::path::PathBuf;

use crate::commands::command_traits::Command;
use crate::commands::required_arg;
use crate::compression::CompressionFactory;
use crate::config::AppConfig;
use crate::coordinate::{reproject_bbox, Crs};
use crate::error::PipelineResult;
use crate::raster::{RasterSource, RasterValidator};
use crate::resolution::{CrsResolution, CrsResolver};
use crate::utils::string_utils::human_bytes;

pub struct InspectCommand {
    input: PathBuf,
    epsg: Option<String>,
    validator: RasterValidator,
}

impl InspectCommand {
    pub fn new(args: &ArgMatches, config: &AppConfig) -> PipelineResult<Self> {
        Ok(InspectCommand {
            input: PathBuf::from(required_arg(args, "input")?),
            epsg: args.get_one::<String>("epsg").cloned(),
            validator: RasterValidator::new(config.staging.max_upload_bytes),
        })
    }

    fn display_summary(&self, source: &RasterSource) {
        let compression = CompressionFactory::create_handler(source.compression())
            .map(|handler| handler.name())
            .unwrap_or("unknown");

        info!("Raster: {}", source.path().display());
        info!("  Dimensions: {}x{}", source.width(), source.height());
        info!("  Bands: {}", source.band_count());
        info!("  Pixel type: {}", source.pixel_type().name());
        info!("  Compression: {}", compression);
        info!("  Overviews: {}", source.overview_count());
        if let Some(citation) = source.citation() {
            info!("  Citation: {}", citation);
        }
        info!("  Bounds: {}", source.bounds());
        if !source.is_georeferenced() {
            warn!("  No geotransform; bounds are in pixel coordinates");
        }
        if source.requires_byte_conversion() {
            info!("  Samples will be rescaled to 8 bits for the tiled output");
        }
    }
}

impl Command for InspectCommand {
    fn execute(&self) -> PipelineResult<()> {
        let size = std::fs::metadata(&self.input).map(|m| m.len()).unwrap_or(0);
        let source = self.validator.open_and_inspect(&self.input)?;
        info!("Size: {}", human_bytes(size));
        self.display_summary(&source);

        match source.ensure_publishable_bands() {
            Ok(()) => info!("  Publishable: yes"),
            Err(e) => warn!("  Publishable: no ({})", e),
        }

        match CrsResolver::resolve(source.declared_crs(), self.epsg.as_deref()) {
            CrsResolution::Resolved(crs) => {
                info!("  CRS: {} ({})", crs, crs.kind());
                let bbox = reproject_bbox(&source.bounds(), &crs, &Crs::web_mercator())?;
                info!("  BBOX (EPSG:3857): {}", bbox);
            }
            CrsResolution::NeedsUserInput => warn!("  CRS: none declared, pass --epsg to supply one"),
            CrsResolution::Invalid(e) => warn!("  CRS: {}", e),
        }
        Ok(())
    }
}
