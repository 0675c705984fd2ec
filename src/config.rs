//! Application configuration
//!
//! `AppConfig` is built once at startup, from an optional TOML file and
//! then from environment variables, and handed to each component when it
//! is constructed. Every field has a working default.

use log::{debug, LevelFilter};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::raster::validator::DEFAULT_MAX_UPLOAD_BYTES;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub geoserver: GeoServerSettings,
    pub object_store: ObjectStoreSettings,
    pub staging: StagingSettings,
    pub index: IndexSettings,
    pub logging: LoggingSettings,
}

/// GeoServer REST endpoint and credentials
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeoServerSettings {
    /// REST root, e.g. `http://localhost:8080/geoserver/rest`
    pub url: String,
    pub workspace: String,
    pub user: String,
    pub password: String,
}

impl Default for GeoServerSettings {
    fn default() -> Self {
        GeoServerSettings {
            url: "http://localhost:8080/geoserver/rest".to_string(),
            workspace: "host_strona".to_string(),
            user: "admin".to_string(),
            password: "geoserver".to_string(),
        }
    }
}

/// S3 bucket receiving converted rasters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObjectStoreSettings {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Prepended to every object key
    pub key_prefix: String,
    pub presign_expiry_secs: u64,
    pub jpeg_quality: u8,
}

impl Default for ObjectStoreSettings {
    fn default() -> Self {
        ObjectStoreSettings {
            bucket: String::new(),
            region: "us-east-1".to_string(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            key_prefix: "cog/".to_string(),
            presign_expiry_secs: 3600,
            jpeg_quality: crate::compression::DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ObjectStoreSettings {
    /// Bucket and both credentials are set
    pub fn is_configured(&self) -> bool {
        !self.bucket.is_empty() && !self.access_key_id.is_empty() && !self.secret_access_key.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StagingSettings {
    pub upload_folder: PathBuf,
    pub max_upload_bytes: u64,
}

impl Default for StagingSettings {
    fn default() -> Self {
        StagingSettings {
            upload_folder: PathBuf::from("orto_ref_host"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub path: PathBuf,
}

impl Default for IndexSettings {
    fn default() -> Self {
        IndexSettings {
            path: PathBuf::from("orto_ref_host/metadata.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub file: PathBuf,
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            file: PathBuf::from("geopublish.log"),
            level: "info".to_string(),
        }
    }
}

impl LoggingSettings {
    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        self.level
            .parse::<LevelFilter>()
            .map_err(|_| ConfigError::Invalid(format!("unknown log level '{}'", self.level)))
    }
}

impl AppConfig {
    /// Loads configuration from an optional file, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                debug!("Reading configuration from {}", path.display());
                AppConfig::from_toml(&fs::read_to_string(path)?)?
            }
            None => AppConfig::default(),
        };
        config.apply_env(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Overrides fields from environment-style variables
    ///
    /// `lookup` returns the value of a variable, if set.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key) {
                *target = value;
            }
        };
        set(&mut self.geoserver.url, "GEOSERVER_URL");
        set(&mut self.geoserver.workspace, "GEOSERVER_WORKSPACE");
        set(&mut self.geoserver.user, "GEOSERVER_USER");
        set(&mut self.geoserver.password, "GEOSERVER_PASSWORD");
        set(&mut self.object_store.region, "AWS_REGION");
        set(&mut self.object_store.access_key_id, "AWS_ACCESS_KEY_ID");
        set(&mut self.object_store.secret_access_key, "AWS_SECRET_ACCESS_KEY");
        set(&mut self.object_store.bucket, "AWS_BUCKET_NAME");

        if let Some(folder) = lookup("UPLOAD_FOLDER") {
            self.staging.upload_folder = PathBuf::from(folder);
        }
        if let Some(index) = lookup("METADATA_INDEX") {
            self.index.path = PathBuf::from(index);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.geoserver.url.trim().is_empty() {
            return Err(ConfigError::Invalid("geoserver.url must not be empty".to_string()));
        }
        if self.geoserver.workspace.trim().is_empty() {
            return Err(ConfigError::Invalid("geoserver.workspace must not be empty".to_string()));
        }
        if self.staging.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid("staging.max_upload_bytes must be positive".to_string()));
        }
        if !(1..=100).contains(&self.object_store.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "object_store.jpeg_quality {} is outside 1..=100",
                self.object_store.jpeg_quality
            )));
        }
        self.logging.level_filter()?;
        Ok(())
    }

    /// Creates the upload folder and the index directory
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.staging.upload_folder)?;
        if let Some(parent) = self.index.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.geoserver.url, "http://localhost:8080/geoserver/rest");
        assert_eq!(config.geoserver.workspace, "host_strona");
        assert_eq!(config.staging.upload_folder, PathBuf::from("orto_ref_host"));
        assert_eq!(config.staging.max_upload_bytes, 100 * 1024 * 1024);
        assert_eq!(config.object_store.key_prefix, "cog/");
        assert!(!config.object_store.is_configured());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = AppConfig::from_toml(
            r#"
            [geoserver]
            workspace = "ortho"

            [staging]
            max_upload_bytes = 1024

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.geoserver.workspace, "ortho");
        assert_eq!(config.geoserver.user, "admin");
        assert_eq!(config.staging.max_upload_bytes, 1024);
        assert_eq!(config.logging.level_filter().unwrap(), LevelFilter::Debug);
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            AppConfig::from_toml("[staging]\nmax_upload_bytes = \"big\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_environment_overrides() {
        let vars: HashMap<&str, &str> = [
            ("GEOSERVER_URL", "https://maps.example.org/geoserver/rest"),
            ("AWS_BUCKET_NAME", "rasters"),
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("UPLOAD_FOLDER", "/srv/uploads"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.geoserver.url, "https://maps.example.org/geoserver/rest");
        assert_eq!(config.staging.upload_folder, PathBuf::from("/srv/uploads"));
        assert!(config.object_store.is_configured());
        assert_eq!(config.geoserver.workspace, "host_strona");
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.object_store.jpeg_quality = 0;
        assert!(config.validate().is_err());
    }
}
