//! Validated bridge configuration and the per-connection driver factory.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use super::s3::S3Driver;
use super::{Driver, DriverFactory};
use crate::auth::StaticCredentials;
use crate::config::Config;
use crate::errors::ConfigError;
use crate::features::FeatureSet;
use crate::metrics::MetricsSender;
use crate::storage::aws::S3Store;
use crate::storage::backend::ObjectStore;

/// Immutable settings shared by every driver a factory produces.
#[derive(Clone)]
pub struct BridgeConfig {
    /// Enabled protocol verbs.
    pub features: FeatureSet,
    /// Refuse uploads that would replace an existing object.
    pub no_overwrite: bool,
    /// Store credentials.
    pub credentials: StaticCredentials,
    /// Bucket every object lives in.
    pub bucket_name: String,
    /// `scheme://authority` of the bucket URL, used to build object URLs for logs.
    pub bucket_url: String,
    /// Region sent to the store.
    pub region: String,
    /// Store endpoint, already rewritten to plain HTTP when TLS is disabled.
    pub endpoint: String,
    /// Address the bucket in the request path.
    pub path_style: bool,
    /// Sign requests with the legacy v2 scheme.
    pub signature_v2: bool,
    /// TLS was disabled for the endpoint.
    pub disable_ssl: bool,
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("features", &self.features)
            .field("no_overwrite", &self.no_overwrite)
            .field("credentials", &self.credentials)
            .field("bucket_name", &self.bucket_name)
            .field("bucket_url", &self.bucket_url)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("path_style", &self.path_style)
            .field("signature_v2", &self.signature_v2)
            .field("disable_ssl", &self.disable_ssl)
            .finish()
    }
}

impl BridgeConfig {
    /// Validate `config` into bridge settings.
    ///
    /// Without an endpoint override the bucket URL host must be
    /// `bucket.rest.of.host`: the first label names the bucket and the rest,
    /// with the URL scheme, becomes the endpoint.  With an override the whole
    /// host names the bucket.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        debug!(features = %config.ftp.features, "Trying to parse feature set");
        let features =
            FeatureSet::parse(&config.ftp.features).map_err(|source| ConfigError::Features {
                spec: config.ftp.features.clone(),
                source,
            })?;

        let (access_key, secret_key) = config
            .s3
            .credentials
            .split_once(':')
            .ok_or(ConfigError::MalformedCredentials)?;
        let credentials = StaticCredentials {
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            session_token: None,
        };

        let url = &config.s3.bucket_url;
        let invalid = || ConfigError::InvalidBucketUrl { url: url.clone() };
        let uri: http::Uri = url.parse().map_err(|_| invalid())?;
        let scheme = uri.scheme_str().ok_or_else(invalid)?;
        let authority = uri.authority().ok_or_else(invalid)?;
        if authority.host().is_empty() {
            return Err(invalid());
        }

        let (bucket_name, endpoint) = if config.s3.endpoint.is_empty() {
            let (bucket, rest) = authority
                .as_str()
                .split_once('.')
                .filter(|(bucket, rest)| !bucket.is_empty() && !rest.is_empty())
                .ok_or_else(|| ConfigError::NotFullyQualified { url: url.clone() })?;
            (bucket.to_string(), format!("{scheme}://{rest}"))
        } else {
            (authority.host().to_string(), config.s3.endpoint.clone())
        };

        let endpoint = match (config.s3.disable_ssl, endpoint.strip_prefix("https://")) {
            (true, Some(rest)) => format!("http://{rest}"),
            _ => endpoint,
        };

        Ok(Self {
            features,
            no_overwrite: config.ftp.no_overwrite,
            credentials,
            bucket_name,
            bucket_url: format!("{scheme}://{authority}"),
            region: config.s3.region.clone(),
            endpoint,
            path_style: config.s3.path_style,
            signature_v2: config.s3.signature_v2,
            disable_ssl: config.s3.disable_ssl,
        })
    }
}

/// Builds one [`S3Driver`] per protocol connection.
///
/// The store client and metrics sender are created once and shared by every
/// driver; only the working path is per connection.
#[derive(Clone)]
pub struct S3DriverFactory {
    config: Arc<BridgeConfig>,
    store: Arc<dyn ObjectStore>,
    metrics: Arc<dyn MetricsSender>,
}

impl S3DriverFactory {
    /// Build a factory backed by an S3 client for `config`.
    pub async fn connect(config: BridgeConfig, metrics: Arc<dyn MetricsSender>) -> Self {
        let store = S3Store::connect(&config).await;
        Self::with_store(config, Arc::new(store), metrics)
    }

    /// Build a factory backed by an already constructed store.
    pub fn with_store(
        config: BridgeConfig,
        store: Arc<dyn ObjectStore>,
        metrics: Arc<dyn MetricsSender>,
    ) -> Self {
        info!(
            bucket = %config.bucket_name,
            endpoint = %config.endpoint,
            features = %config.features,
            "Driver factory initialized"
        );
        Self {
            config: Arc::new(config),
            store,
            metrics,
        }
    }

    /// The settings shared by every driver.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Build a concrete driver.
    pub fn new_s3_driver(&self) -> S3Driver {
        S3Driver::new(
            Arc::clone(&self.config),
            Arc::clone(&self.store),
            Arc::clone(&self.metrics),
        )
    }
}

impl DriverFactory for S3DriverFactory {
    fn new_driver(&self) -> Box<dyn Driver> {
        Box::new(self.new_s3_driver())
    }
}
