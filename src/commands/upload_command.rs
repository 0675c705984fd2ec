//! Upload command
//!
//! Drives one pipeline request from the command line. When the raster
//! has no CRS, the command prints the follow-up invocation that resumes
//! the staged file with an EPSG code.

use clap::ArgMatches;
use log::{info, warn};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::commands::command_traits::Command;
use crate::commands::required_arg;
use crate::config::AppConfig;
use crate::error::{PipelineError, PipelineResult, StagingError};
use crate::pipeline::{Pipeline, UploadOutcome, UploadRequest, UploadSource};
use crate::publish::{GeoServerClient, PublishTarget};

/// Input of an upload: a local file or the name of a staged one
#[derive(Debug, Clone, PartialEq)]
enum UploadInput {
    File(String),
    Resume(String),
}

pub struct UploadCommand<'a> {
    input: UploadInput,
    layer_name: String,
    target: PublishTarget,
    epsg: Option<String>,
    config: &'a AppConfig,
}

impl<'a> UploadCommand<'a> {
    /// Create a new upload command
    ///
    /// # Arguments
    /// * `args` - Matches of the `upload` subcommand
    /// * `config` - Application configuration
    pub fn new(args: &ArgMatches, config: &'a AppConfig) -> PipelineResult<Self> {
        let input = match (args.get_one::<String>("file"), args.get_one::<String>("resume")) {
            (Some(file), _) => UploadInput::File(file.clone()),
            (None, Some(name)) => UploadInput::Resume(name.clone()),
            (None, None) => return Err(StagingError::MissingInput.into()),
        };
        let target = required_arg(args, "target")?
            .parse::<PublishTarget>()
            .map_err(PipelineError::InvalidRequest)?;

        Ok(UploadCommand {
            input,
            layer_name: required_arg(args, "layer")?,
            target,
            epsg: args.get_one::<String>("epsg").cloned(),
            config,
        })
    }

    fn report(&self, outcome: &UploadOutcome) {
        match outcome {
            UploadOutcome::Published(published) => {
                info!("Published {} to {}", published.filename, published.target);
                info!("  Location: {}", published.location);
                info!("  Source CRS: {}", published.crs);
                info!("  BBOX (EPSG:3857): {}", published.bbox);
                if !published.indexed {
                    warn!("  Metadata index was not updated");
                }
                if published.target == PublishTarget::DirectServe {
                    if let Ok(client) = GeoServerClient::new(self.config.geoserver.clone()) {
                        info!("  WMS: {}", client.wms_base_url());
                    }
                }
            }
            UploadOutcome::NeedsCrs { filename, layer_name } => {
                warn!("{} has no coordinate reference system; an EPSG code is required", filename);
                info!("Resubmit with:");
                info!("  {}", resume_command_line(filename, layer_name, self.target));
            }
        }
    }
}

/// The command that resumes a staged upload with an EPSG code
fn resume_command_line(filename: &str, layer_name: &str, target: PublishTarget) -> String {
    let mut line = format!("geopublish upload --resume {}", filename);
    if !layer_name.is_empty() {
        line.push_str(&format!(" --layer {}", layer_name));
    }
    line.push_str(&format!(" --target {} --epsg <CODE>", target));
    line
}

impl<'a> Command for UploadCommand<'a> {
    fn execute(&self) -> PipelineResult<()> {
        let pipeline = Pipeline::from_config(self.config)?;

        let mut reader;
        let source = match &self.input {
            UploadInput::File(path) => {
                let path = Path::new(path);
                reader = BufReader::new(File::open(path).map_err(StagingError::Io)?);
                let filename = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                UploadSource::Stream {
                    filename,
                    reader: &mut reader,
                }
            }
            UploadInput::Resume(name) => UploadSource::Staged { filename: name.clone() },
        };

        let request = UploadRequest {
            layer_name: self.layer_name.clone(),
            target: self.target,
            epsg_override: self.epsg.clone(),
            source: Some(source),
        };

        match pipeline.upload(request) {
            Ok(outcome) => {
                self.report(&outcome);
                Ok(())
            }
            Err(failure) => {
                if let (true, Some(filename)) = (failure.staged_file_retained, &failure.filename) {
                    info!("The file stays staged; retry with:");
                    info!("  {}", resume_command_line(filename, &failure.layer_name, self.target));
                }
                Err(failure.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_command_line() {
        assert_eq!(
            resume_command_line("dem.tif", "dem", PublishTarget::DirectServe),
            "geopublish upload --resume dem.tif --layer dem --target geoserver --epsg <CODE>"
        );
        assert_eq!(
            resume_command_line("dem.tif", "", PublishTarget::ObjectStore),
            "geopublish upload --resume dem.tif --target cog --epsg <CODE>"
        );
    }
}
