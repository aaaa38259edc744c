//! Error types for the bridge.
//!
//! Configuration problems surface as [`ConfigError`] and are fatal at
//! startup.  Everything a protocol client can trigger surfaces as
//! [`DriverError`] and fails only the current command.

use thiserror::Error;

/// Capability string could not be parsed.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// The capability string was blank.
    #[error("Empty feature set")]
    Empty,

    /// A token did not name a known feature.
    #[error("Unknown feature flag: {feature:?}")]
    Unknown { feature: String },
}

/// Startup configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read configuration file {path:?}")]
    Load {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for [`crate::config::Config`].
    #[error("Failed to parse configuration file {path:?}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// Credentials were not in `access_key:secret_key` form.
    #[error("Malformed credentials, not in format: 'access_key:secret_key'")]
    MalformedCredentials,

    /// The bucket URL is not an absolute URL.
    #[error("Failed to parse s3 bucket URL: {url:?}")]
    InvalidBucketUrl { url: String },

    /// Without an endpoint override the bucket host must be `bucket.host.domain`.
    #[error("Not a fully qualified bucket name (e.g. 'bucket.host.domain'): {url:?}")]
    NotFullyQualified { url: String },

    /// The capability string was rejected.
    #[error("Failed to parse FTP feature set: {spec:?}")]
    Features {
        spec: String,
        #[source]
        source: FeatureError,
    },
}

/// An error reported by the object store, identified by its error code.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct StoreError {
    /// Store error code (e.g. `NotFound`, `NoSuchBucket`, `AccessDenied`).
    pub code: String,
    /// Human-readable message from the store.
    pub message: String,
}

impl StoreError {
    /// Build a store error from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether the store reported that the addressed object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self.code.as_str(), "NotFound" | "NoSuchKey" | "404")
    }
}

/// Errors returned to the protocol engine for a single command.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The verb is disabled by the capability set or not supported at all.
    #[error("{op:?} is not enabled")]
    NotEnabled { op: &'static str },

    /// The bucket metadata check failed.
    #[error("Bucket {bucket:?} is not accessible")]
    BucketInaccessible {
        bucket: String,
        #[source]
        source: StoreError,
    },

    /// A store call failed for the given object.
    #[error("{op} failed for {fqdn:?}")]
    Store {
        op: &'static str,
        fqdn: String,
        #[source]
        source: StoreError,
    },

    /// Overwrite protection is on and the object already exists.
    #[error("object {fqdn:?} already exists and overwriting is forbidden")]
    ObjectExists { fqdn: String },

    /// `put` was called without a data source.
    #[error("PUT with empty data")]
    EmptyData,

    /// The upload failed while streaming the client's data.
    #[error("Failed to put object {fqdn:?} because reading from source failed")]
    SourceRead {
        fqdn: String,
        #[source]
        source: StoreError,
    },

    /// The object was uploaded but its final size could not be determined.
    #[error("Failed to check size of object {fqdn:?}")]
    SizeUnknown {
        fqdn: String,
        #[source]
        source: StoreError,
    },
}

impl DriverError {
    /// The underlying store error, if this failure came from the store.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            DriverError::BucketInaccessible { source, .. }
            | DriverError::Store { source, .. }
            | DriverError::SourceRead { source, .. }
            | DriverError::SizeUnknown { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Metrics could not be reported.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The transfer timestamp lies before the Unix epoch.
    #[error("transfer timestamp is before the Unix epoch")]
    InvalidTimestamp,
}

/// The legacy signer could not sign an outgoing request.
#[derive(Debug, Error)]
pub enum SignError {
    /// The request URI could not be parsed.
    #[error("cannot sign request with invalid URI {uri:?}")]
    InvalidUri { uri: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_enabled_message() {
        let err = DriverError::NotEnabled { op: "LS" };
        assert_eq!(err.to_string(), "\"LS\" is not enabled");
    }

    #[test]
    fn test_store_error_not_found_codes() {
        assert!(StoreError::new("NotFound", "").is_not_found());
        assert!(StoreError::new("NoSuchKey", "").is_not_found());
        assert!(!StoreError::new("AccessDenied", "").is_not_found());
        assert!(!StoreError::new("NoSuchBucket", "").is_not_found());
    }

    #[test]
    fn test_store_error_accessor() {
        let err = DriverError::BucketInaccessible {
            bucket: "b".to_string(),
            source: StoreError::new("NoSuchBucket", "gone"),
        };
        assert_eq!(err.store_error().unwrap().code, "NoSuchBucket");
        assert!(DriverError::EmptyData.store_error().is_none());
    }
}
