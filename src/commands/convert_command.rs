//! Conversion command
//!
//! Writes the tiled Web Mercator output for a local raster without
//! publishing it.

use clap::ArgMatches;
use log::info;
use std::path::PathBuf;

use crate::commands::command_traits::Command;
use crate::commands::required_arg;
use crate::config::AppConfig;
use crate::convert::{CogConverter, RasterConverter};
use crate::coordinate::Crs;
use crate::error::PipelineResult;
use crate::raster::RasterValidator;
use crate::resolution::CrsResolver;
use crate::utils::string_utils::human_bytes;

pub struct ConvertCommand {
    input: PathBuf,
    output: PathBuf,
    epsg: Option<String>,
    validator: RasterValidator,
    converter: CogConverter,
}

impl ConvertCommand {
    pub fn new(args: &ArgMatches, config: &AppConfig) -> PipelineResult<Self> {
        Ok(ConvertCommand {
            input: PathBuf::from(required_arg(args, "input")?),
            output: PathBuf::from(required_arg(args, "output")?),
            epsg: args.get_one::<String>("epsg").cloned(),
            validator: RasterValidator::new(config.staging.max_upload_bytes),
            converter: CogConverter::new(config.object_store.jpeg_quality).with_progress(true),
        })
    }
}

impl Command for ConvertCommand {
    fn execute(&self) -> PipelineResult<()> {
        let source = self.validator.open_and_inspect(&self.input)?;
        source.ensure_publishable_bands()?;
        let crs = CrsResolver::resolve(source.declared_crs(), self.epsg.as_deref()).into_result()?;

        let output = self.converter.convert(&source, &crs, &Crs::web_mercator(), &self.output)?;
        info!(
            "Converted {} -> {} ({}x{}, {} band(s), {} overview(s), {})",
            self.input.display(),
            output.path.display(),
            output.width,
            output.height,
            output.band_count,
            output.overview_count,
            human_bytes(output.bytes)
        );
        Ok(())
    }
}
