//! GeoServer layer queries

use clap::ArgMatches;
use log::info;

use crate::commands::command_traits::Command;
use crate::commands::required_arg;
use crate::config::AppConfig;
use crate::error::PipelineResult;
use crate::publish::GeoServerClient;

/// Lists the layers of the configured workspace
pub struct LayersCommand<'a> {
    config: &'a AppConfig,
}

impl<'a> LayersCommand<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        LayersCommand { config }
    }
}

impl<'a> Command for LayersCommand<'a> {
    fn execute(&self) -> PipelineResult<()> {
        let client = GeoServerClient::new(self.config.geoserver.clone())?;
        let layers = client.list_layers()?;

        info!("Workspace '{}': {} layer(s)", self.config.geoserver.workspace, layers.len());
        for layer in &layers {
            info!("  {}", layer);
        }
        info!("WMS endpoint: {}", client.wms_base_url());
        info!("Capabilities: {}", client.capabilities_url());
        Ok(())
    }
}

/// Shows the native and Web Mercator extent of one layer
pub struct LayerInfoCommand<'a> {
    name: String,
    config: &'a AppConfig,
}

impl<'a> LayerInfoCommand<'a> {
    pub fn new(args: &ArgMatches, config: &'a AppConfig) -> PipelineResult<Self> {
        Ok(LayerInfoCommand {
            name: required_arg(args, "name")?,
            config,
        })
    }
}

impl<'a> Command for LayerInfoCommand<'a> {
    fn execute(&self) -> PipelineResult<()> {
        let client = GeoServerClient::new(self.config.geoserver.clone())?;
        let extent = client.layer_extent(&self.name)?;

        info!("Layer '{}'", self.name);
        info!("  Native CRS: {}", extent.native_crs);
        info!("  Native BBOX: {}", extent.native);
        if extent.reprojected {
            info!("  BBOX (EPSG:3857): {}", extent.display);
        } else {
            info!("  BBOX (native, not reprojected): {}", extent.display);
        }
        Ok(())
    }
}
