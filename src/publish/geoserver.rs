//! GeoServer REST client
//!
//! Publishes GeoTIFFs as coverage stores and answers the queries the
//! viewer needs: the layers of the workspace and the extent of a layer.

use log::{debug, error, info, warn};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::fs::File;
use std::path::Path;

use crate::config::GeoServerSettings;
use crate::coordinate::{reproject_bbox, BoundingBox, Crs};
use crate::error::{PublishError, PublishResult};

/// CRS assumed when a bounding box does not name one
pub const DEFAULT_NATIVE_CRS: &str = "EPSG:4326";

/// A serving backend that accepts raw GeoTIFF coverages
pub trait CoverageBackend {
    /// Creates or replaces the coverage store `layer` from `path`
    ///
    /// # Returns
    /// The name of the published layer
    fn publish_coverage(&self, layer: &str, path: &Path) -> PublishResult<String>;
}

/// Extent of a published layer
#[derive(Debug, Clone, PartialEq)]
pub struct LayerExtent {
    pub native: BoundingBox,
    /// CRS reference as reported by the server, `EPSG:4326` when absent
    pub native_crs: String,
    /// Extent in Web Mercator, or the native extent if it could not be
    /// reprojected
    pub display: BoundingBox,
    pub reprojected: bool,
}

pub struct GeoServerClient {
    settings: GeoServerSettings,
    http: Client,
}

impl GeoServerClient {
    pub fn new(settings: GeoServerSettings) -> PublishResult<Self> {
        let http = Client::builder().build()?;
        Ok(GeoServerClient { settings, http })
    }

    fn rest_url(&self) -> &str {
        self.settings.url.trim_end_matches('/')
    }

    /// Endpoint creating a coverage store from an uploaded file
    pub fn coverage_store_url(&self, layer: &str) -> String {
        format!(
            "{}/workspaces/{}/coveragestores/{}/file.geotiff",
            self.rest_url(),
            self.settings.workspace,
            layer
        )
    }

    /// Server root without the REST suffix
    fn base_url(&self) -> &str {
        let rest = self.rest_url();
        rest.strip_suffix("/rest").unwrap_or(rest)
    }

    /// Workspace WMS endpoint for map viewers
    pub fn wms_base_url(&self) -> String {
        format!("{}/{}/wms", self.base_url(), self.settings.workspace)
    }

    pub fn capabilities_url(&self) -> String {
        format!(
            "{}/wms?service=WMS&version=1.3.0&request=GetCapabilities&namespace={}",
            self.base_url(),
            self.settings.workspace
        )
    }

    /// Names of the layers in the configured workspace
    pub fn list_layers(&self) -> PublishResult<Vec<String>> {
        let url = format!("{}/workspaces/{}/layers.json", self.rest_url(), self.settings.workspace);
        let body = self.get_json(&url)?;
        let names = parse_layer_names(&body);
        debug!("GeoServer workspace {} has {} layer(s)", self.settings.workspace, names.len());
        Ok(names)
    }

    /// Native extent of a layer, also expressed in Web Mercator
    pub fn layer_extent(&self, layer: &str) -> PublishResult<LayerExtent> {
        let url = format!(
            "{}/workspaces/{}/layers/{}.json",
            self.rest_url(),
            self.settings.workspace,
            layer
        );
        let layer_body = self.get_json(&url)?;
        let href = layer_body
            .pointer("/layer/resource/href")
            .and_then(Value::as_str)
            .ok_or_else(|| PublishError::Transport(format!("layer '{}' has no resource link", layer)))?;

        let resource = self.get_json(href)?;
        let (native, native_crs) = parse_native_bbox(&resource)
            .ok_or_else(|| PublishError::Transport(format!("layer '{}' reports no native bounding box", layer)))?;
        Ok(display_extent(layer, native, native_crs))
    }

    fn get_json(&self, url: &str) -> PublishResult<Value> {
        debug!("GET {}", url);
        let response = self
            .http
            .get(url)
            .basic_auth(&self.settings.user, Some(&self.settings.password))
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }
        Ok(response.json()?)
    }
}

impl CoverageBackend for GeoServerClient {
    fn publish_coverage(&self, layer: &str, path: &Path) -> PublishResult<String> {
        let url = self.coverage_store_url(layer);
        info!("Sending PUT with GeoTIFF {} to {}", path.display(), url);

        let file = File::open(path)?;
        let response = self
            .http
            .put(&url)
            .basic_auth(&self.settings.user, Some(&self.settings.password))
            .header(CONTENT_TYPE, "image/tiff")
            .body(file)
            .send()?;

        let status = response.status().as_u16();
        // 201 on creation, 200 when an existing store is replaced
        if status != 200 && status != 201 {
            let body = response.text().unwrap_or_default();
            error!("Publishing '{}' failed with status {}: {}", layer, status, body);
            return Err(PublishError::Rejected { status, body });
        }

        info!("Published layer '{}'", layer);
        Ok(layer.to_string())
    }
}

/// Layer names from a `layers.json` document
///
/// GeoServer returns a single object instead of an array when the
/// workspace holds one layer, and an empty string when it holds none.
pub fn parse_layer_names(body: &Value) -> Vec<String> {
    let name_of = |layer: &Value| layer.get("name").and_then(Value::as_str).map(str::to_string);
    match body.pointer("/layers/layer") {
        Some(Value::Array(layers)) => layers.iter().filter_map(name_of).collect(),
        Some(layer @ Value::Object(_)) => name_of(layer).into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Native bounding box and its CRS reference from a coverage or
/// feature type document; a box without a CRS is taken as WGS 84
pub fn parse_native_bbox(resource: &Value) -> Option<(BoundingBox, String)> {
    let bbox = ["coverage", "featureType"]
        .iter()
        .find_map(|kind| resource.get(*kind))
        .and_then(|r| r.get("nativeBoundingBox"))?;

    let number = |key: &str| bbox.get(key).and_then(Value::as_f64);
    let bounds = BoundingBox::new(number("minx")?, number("miny")?, number("maxx")?, number("maxy")?);

    let crs = match bbox.get("crs") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(o)) => o.get("$").and_then(Value::as_str).map(str::to_string),
        _ => None,
    };
    Some((bounds, crs.unwrap_or_else(|| DEFAULT_NATIVE_CRS.to_string())))
}

/// Expresses a native extent in Web Mercator
///
/// Falls back to the native extent, flagged as not reprojected, when the
/// CRS reference is unusable or the transform fails.
pub fn display_extent(layer: &str, native: BoundingBox, native_crs: String) -> LayerExtent {
    let reprojected = Crs::parse(&native_crs).and_then(|crs| reproject_bbox(&native, &crs, &Crs::web_mercator()));
    match reprojected {
        Ok(display) => LayerExtent {
            native,
            native_crs,
            display,
            reprojected: true,
        },
        Err(e) => {
            warn!("Could not reproject extent of '{}' from {}: {}", layer, native_crs, e);
            LayerExtent {
                native,
                native_crs,
                display: native,
                reprojected: false,
            }
        }
    }
}
