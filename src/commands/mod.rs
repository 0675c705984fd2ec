//! CLI command implementations
//!
//! This module contains implementations of the commands supported by the
//! CLI application using the Command pattern. Each subcommand maps to one
//! command type; the factory picks it from the parsed arguments.

pub mod command_traits;
pub mod convert_command;
pub mod inspect_command;
pub mod layers_command;
pub mod list_command;
pub mod upload_command;

pub use command_traits::{Command, CommandFactory};
pub use convert_command::ConvertCommand;
pub use inspect_command::InspectCommand;
pub use layers_command::{LayerInfoCommand, LayersCommand};
pub use list_command::ListCommand;
pub use upload_command::UploadCommand;

use clap::{Arg, ArgAction, ArgMatches, Command as ClapCommand};

use crate::config::AppConfig;
use crate::error::{PipelineError, PipelineResult};

/// Reads a required string argument
pub(crate) fn required_arg(args: &ArgMatches, name: &str) -> PipelineResult<String> {
    args.get_one::<String>(name)
        .cloned()
        .ok_or_else(|| PipelineError::InvalidRequest(format!("missing argument '{}'", name)))
}

/// Factory for creating command instances based on CLI arguments
pub struct GeopublishCommandFactory;

impl GeopublishCommandFactory {
    /// Create a new factory instance
    pub fn new() -> Self {
        GeopublishCommandFactory
    }
}

impl Default for GeopublishCommandFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> CommandFactory<'a> for GeopublishCommandFactory {
    fn create_command(&self, args: &ArgMatches, config: &'a AppConfig) -> PipelineResult<Box<dyn Command + 'a>> {
        match args.subcommand() {
            Some(("upload", sub)) => Ok(Box::new(UploadCommand::new(sub, config)?)),
            Some(("list", _)) => Ok(Box::new(ListCommand::new(config))),
            Some(("layers", _)) => Ok(Box::new(LayersCommand::new(config))),
            Some(("layer-info", sub)) => Ok(Box::new(LayerInfoCommand::new(sub, config)?)),
            Some(("inspect", sub)) => Ok(Box::new(InspectCommand::new(sub, config)?)),
            Some(("convert", sub)) => Ok(Box::new(ConvertCommand::new(sub, config)?)),
            Some((other, _)) => Err(PipelineError::InvalidRequest(format!("unknown command '{}'", other))),
            None => Err(PipelineError::InvalidRequest("no command given, see --help".to_string())),
        }
    }
}

/// Argument definitions for the `geopublish` binary
pub fn cli() -> ClapCommand {
    ClapCommand::new("geopublish")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Validate, reproject and publish GeoTIFF rasters")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .help("TOML configuration file")
                .value_name("FILE")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            ClapCommand::new("upload")
                .about("Publish a raster to GeoServer or as a tiled COG to S3")
                .arg(Arg::new("file").help("GeoTIFF to upload").value_name("FILE").index(1))
                .arg(
                    Arg::new("resume")
                        .long("resume")
                        .help("Resubmit a previously staged file by name")
                        .value_name("NAME")
                        .conflicts_with("file"),
                )
                .arg(
                    Arg::new("layer")
                        .short('l')
                        .long("layer")
                        .help("Layer name on the map server")
                        .value_name("NAME")
                        .default_value(""),
                )
                .arg(
                    Arg::new("target")
                        .short('t')
                        .long("target")
                        .help("Publish target (geoserver or cog)")
                        .value_name("TARGET")
                        .default_value("geoserver"),
                )
                .arg(
                    Arg::new("epsg")
                        .long("epsg")
                        .help("EPSG code to use when the raster declares none")
                        .value_name("CODE"),
                ),
        )
        .subcommand(ClapCommand::new("list").about("List rasters recorded in the metadata index"))
        .subcommand(ClapCommand::new("layers").about("List layers of the GeoServer workspace"))
        .subcommand(
            ClapCommand::new("layer-info")
                .about("Show the extent of a GeoServer layer")
                .arg(Arg::new("name").help("Layer name").required(true).index(1)),
        )
        .subcommand(
            ClapCommand::new("inspect")
                .about("Validate a raster and report its metadata")
                .arg(Arg::new("input").help("GeoTIFF to inspect").required(true).index(1))
                .arg(
                    Arg::new("epsg")
                        .long("epsg")
                        .help("EPSG code to assume when the raster declares none")
                        .value_name("CODE"),
                ),
        )
        .subcommand(
            ClapCommand::new("convert")
                .about("Write the tiled Web Mercator output without publishing")
                .arg(Arg::new("input").help("Input GeoTIFF").required(true).index(1))
                .arg(Arg::new("output").help("Output GeoTIFF").required(true).index(2))
                .arg(
                    Arg::new("epsg")
                        .long("epsg")
                        .help("EPSG code to use when the raster declares none")
                        .value_name("CODE"),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn test_factory_dispatch() {
        let config = AppConfig::default();
        let factory = GeopublishCommandFactory::new();

        let args = cli().try_get_matches_from(["geopublish", "list"]).unwrap();
        assert!(factory.create_command(&args, &config).is_ok());

        let args = cli()
            .try_get_matches_from(["geopublish", "upload", "dem.tif", "--layer", "dem", "--target", "cog"])
            .unwrap();
        assert!(factory.create_command(&args, &config).is_ok());
    }

    #[test]
    fn test_upload_requires_file_or_resume() {
        let config = AppConfig::default();
        let args = cli().try_get_matches_from(["geopublish", "upload", "--layer", "dem"]).unwrap();
        assert!(matches!(
            GeopublishCommandFactory::new().create_command(&args, &config),
            Err(PipelineError::Staging(_))
        ));
    }

    #[test]
    fn test_file_and_resume_conflict() {
        assert!(cli()
            .try_get_matches_from(["geopublish", "upload", "a.tif", "--resume", "a.tif"])
            .is_err());
    }

    #[test]
    fn test_bad_target() {
        let config = AppConfig::default();
        let args = cli()
            .try_get_matches_from(["geopublish", "upload", "a.tif", "--target", "ftp"])
            .unwrap();
        assert!(matches!(
            GeopublishCommandFactory::new().create_command(&args, &config),
            Err(PipelineError::InvalidRequest(_))
        ));
    }
}
