//! Configuration loading and types for f3.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Every field has a default, so an empty file is a valid
//! (listing-only) configuration.  A handful of environment variables can
//! override the file after loading; see [`Config::apply_env_overrides`].

use serde::Deserialize;
use std::path::Path;
use tracing::warn;

use crate::errors::ConfigError;
use crate::features::DEFAULT_FEATURE_SET;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Protocol-facing settings.
    #[serde(default)]
    pub ftp: FtpConfig,

    /// Object store settings.
    #[serde(default)]
    pub s3: S3Config,

    /// Transfer metrics settings.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Protocol-facing settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FtpConfig {
    /// Comma-separated capability set, e.g. `ls,get,put`.
    #[serde(default = "default_features")]
    pub features: String,

    /// Refuse to replace an existing object on upload.
    #[serde(default)]
    pub no_overwrite: bool,
}

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            features: default_features(),
            no_overwrite: false,
        }
    }
}

/// Object store settings.
#[derive(Clone, Deserialize)]
pub struct S3Config {
    /// Credentials in `access_key:secret_key` form.
    #[serde(default)]
    pub credentials: String,

    /// Bucket URL, e.g. `https://bucket.s3.amazonaws.com`.
    #[serde(default)]
    pub bucket_url: String,

    /// Region sent to the store.
    #[serde(default = "default_region")]
    pub region: String,

    /// Endpoint override.  Empty means derive it from the bucket URL host.
    #[serde(default)]
    pub endpoint: String,

    /// Address the bucket in the path instead of the host name.
    #[serde(default)]
    pub path_style: bool,

    /// Sign requests with the legacy v2 scheme.
    #[serde(default)]
    pub signature_v2: bool,

    /// Talk plain HTTP to the endpoint.
    #[serde(default)]
    pub disable_ssl: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            credentials: String::new(),
            bucket_url: String::new(),
            region: default_region(),
            endpoint: String::new(),
            path_style: false,
            signature_v2: false,
            disable_ssl: false,
        }
    }
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("credentials", &"<redacted>")
            .field("bucket_url", &self.bucket_url)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("path_style", &self.path_style)
            .field("signature_v2", &self.signature_v2)
            .field("disable_ssl", &self.disable_ssl)
            .finish()
    }
}

/// Transfer metrics settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Report transfers to Prometheus instead of discarding them.
    #[serde(default)]
    pub enabled: bool,

    /// Address of the Prometheus scrape endpoint.
    #[serde(default = "default_metrics_listen")]
    pub listen: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Override file settings from the environment.
    ///
    /// `lookup` resolves a variable name to its value; the binary passes
    /// `std::env::var(..).ok()`.  Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(v) = get("FTP_FEATURES") {
            self.ftp.features = v;
        }
        if let Some(v) = get("S3_CREDENTIALS") {
            self.s3.credentials = v;
        }
        if let Some(v) = get("S3_BUCKET") {
            self.s3.bucket_url = v;
        }
        if let Some(v) = get("S3_REGION") {
            self.s3.region = v;
        }
        if let Some(v) = get("S3_ENDPOINT") {
            self.s3.endpoint = v;
        }
        if let Some(v) = get("S3_PATHSTYLE") {
            match parse_bool(&v) {
                Some(b) => self.s3.path_style = b,
                None => warn!(value = %v, "Ignoring unparsable S3_PATHSTYLE"),
            }
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Some(true),
        "0" | "f" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_features() -> String {
    DEFAULT_FEATURE_SET.to_string()
}

fn default_region() -> String {
    "custom".to_string()
}

fn default_metrics_listen() -> String {
    "127.0.0.1:9464".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path_str = path.as_ref().display().to_string();
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Load {
        path: path_str.clone(),
        source,
    })?;
    // serde_yaml rejects a fully empty document for a struct; treat it as {}.
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path_str,
        source,
    })
}
