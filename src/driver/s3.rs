//! Object-store adapter: every protocol verb expressed as bucket calls.
//!
//! The bucket is flat.  Directories exist only as key prefixes: `list`
//! folds deeper keys into one pseudo-directory per immediate child, and
//! `stat` answers for a missing key with a pseudo-directory so clients can
//! probe a prefix before listing it.  Directory and rename primitives are
//! refused outright.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, error, info, warn};

use super::factory::BridgeConfig;
use super::{Connection, Driver, DriverFuture, ListCallback, ObjectInfo};
use crate::errors::{DriverError, StoreError};
use crate::features::Feature;
use crate::metrics::MetricsSender;
use crate::storage::backend::{ObjectReader, ObjectStore};

/// Driver for one protocol connection.
pub struct S3Driver {
    config: Arc<BridgeConfig>,
    store: Arc<dyn ObjectStore>,
    metrics: Arc<dyn MetricsSender>,
    /// Working path of this connection; only used to build object URLs.
    cwd: String,
}

impl std::fmt::Debug for S3Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Driver")
            .field("bucket", &self.config.bucket_name)
            .field("cwd", &self.cwd)
            .finish_non_exhaustive()
    }
}

fn log_store_error(err: &StoreError) {
    error!(code = %err.code, message = %err.message, "Store error");
}

/// Join `cwd` and `key` into a clean absolute path.
fn join_path(cwd: &str, key: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in cwd.split('/').chain(key.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

impl S3Driver {
    pub fn new(
        config: Arc<BridgeConfig>,
        store: Arc<dyn ObjectStore>,
        metrics: Arc<dyn MetricsSender>,
    ) -> Self {
        Self {
            config,
            store,
            metrics,
            cwd: "/".to_string(),
        }
    }

    /// Current working path.
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    fn bucket(&self) -> &str {
        &self.config.bucket_name
    }

    fn require(&self, feature: Feature, op: &'static str) -> Result<(), DriverError> {
        if self.config.features.has(feature) {
            Ok(())
        } else {
            Err(DriverError::NotEnabled { op })
        }
    }

    /// Object URL for logs and error messages.  Store calls use `key` as is.
    fn fqdn(&self, key: &str) -> String {
        format!("{}{}", self.config.bucket_url, join_path(&self.cwd, key))
    }

    /// Probe the bucket.
    pub async fn bucket_check(&self) -> Result<(), DriverError> {
        self.store.head_bucket(self.bucket()).await.map_err(|source| {
            log_store_error(&source);
            error!(bucket = %self.config.bucket_url, "Bucket is not accessible");
            DriverError::BucketInaccessible {
                bucket: self.bucket().to_string(),
                source,
            }
        })
    }

    async fn object_exists(&self, key: &str) -> bool {
        debug!("Trying to check if object {:?} exists", self.fqdn(key));
        match self.store.head_object(self.bucket(), key).await {
            Ok(_) => true,
            Err(err) if err.is_not_found() => false,
            Err(err) => {
                debug!(code = %err.code, "Failed to check object {:?}", self.fqdn(key));
                false
            }
        }
    }

    async fn object_size(&self, key: &str) -> Result<u64, DriverError> {
        debug!("Trying to get size of object {:?}", self.fqdn(key));
        let meta = self
            .store
            .head_object(self.bucket(), key)
            .await
            .map_err(|source| DriverError::SizeUnknown {
                fqdn: self.fqdn(key),
                source,
            })?;
        Ok(meta.size)
    }

    async fn stat_inner(&self, key: &str) -> Result<ObjectInfo, DriverError> {
        self.bucket_check().await?;

        let fqdn = self.fqdn(key);
        match self.store.head_object(self.bucket(), key).await {
            Ok(meta) => {
                info!(key = %fqdn, action = "STAT", "File information for {fqdn:?}");
                Ok(ObjectInfo {
                    name: key.to_string(),
                    size: meta.size,
                    mod_time: meta.last_modified.unwrap_or_else(SystemTime::now),
                    owner: String::new(),
                    group: String::new(),
                    is_prefix: false,
                })
            }
            // Clients stat a prefix before listing it; a missing key is a
            // directory as far as they are concerned.
            Err(source) if source.is_not_found() => {
                debug!(key = %fqdn, "No object, reporting a pseudo-directory");
                Ok(ObjectInfo::pseudo_dir(key))
            }
            Err(source) => {
                error!(object = %fqdn, code = %source.code, "Stat for {fqdn:?} failed");
                Err(DriverError::Store {
                    op: "STAT",
                    fqdn,
                    source,
                })
            }
        }
    }

    async fn list_inner(
        &self,
        prefix: &str,
        callback: &mut ListCallback<'_>,
    ) -> Result<(), DriverError> {
        self.require(Feature::List, "LS")?;
        self.bucket_check().await?;

        let objects = self
            .store
            .list_objects(self.bucket())
            .await
            .map_err(|source| {
                let fqdn = self.fqdn(prefix);
                log_store_error(&source);
                error!("Could not list {fqdn:?}");
                DriverError::Store {
                    op: "LS",
                    fqdn,
                    source,
                }
            })?;

        let prefix_key = prefix.strip_prefix('/').unwrap_or(prefix);
        let mut folders: HashSet<String> = HashSet::new();

        for object in objects {
            let Some(relative) = object.key.strip_prefix(prefix_key) else {
                continue;
            };
            let relative = relative.strip_prefix('/').unwrap_or(relative);

            let entry = match relative.split_once('/') {
                Some((folder, _)) => {
                    if folder.is_empty() || !folders.insert(folder.to_string()) {
                        continue;
                    }
                    ObjectInfo::pseudo_dir(folder)
                }
                // The prefix marker object itself.
                None if relative.is_empty() => continue,
                None => ObjectInfo {
                    name: relative.to_string(),
                    size: object.size,
                    mod_time: object.last_modified.unwrap_or_else(SystemTime::now),
                    owner: object.owner.unwrap_or_default(),
                    group: String::new(),
                    is_prefix: false,
                },
            };

            let name = entry.name.clone();
            if let Err(err) = callback(entry) {
                error!(error = %err, "Could not list {:?}", self.fqdn(&name));
            }
        }

        info!(key = %prefix, action = "LS", "Directory listing for {prefix:?}");
        Ok(())
    }

    async fn remove_file_inner(&self, key: &str) -> Result<(), DriverError> {
        if let Err(err) = self.require(Feature::Remove, "RM") {
            warn!("Remove (RM) is not enabled.");
            return Err(err);
        }

        let fqdn = self.fqdn(key);
        if let Err(source) = self.store.delete_object(self.bucket(), key).await {
            log_store_error(&source);
            error!(code = %source.code, error = %source.message, "Failed to delete object {fqdn:?}");
            return Err(DriverError::Store {
                op: "RM",
                fqdn,
                source,
            });
        }

        info!(key = %fqdn, action = "DELETE", "Deleted {fqdn:?}");
        Ok(())
    }

    async fn get_inner(&self, key: &str, offset: u64) -> Result<(u64, ObjectReader), DriverError> {
        self.require(Feature::Get, "GET")?;

        let fqdn = self.fqdn(key);
        let timestamp = SystemTime::now();
        if offset > 0 {
            debug!(object = %fqdn, offset, "Resume offset ignored, serving the full object");
        }

        let object = self
            .store
            .get_object(self.bucket(), key)
            .await
            .map_err(|source| {
                log_store_error(&source);
                if source.is_not_found() {
                    error!(object = %fqdn, "Failed to get object: {fqdn:?}");
                }
                DriverError::Store {
                    op: "GET",
                    fqdn: fqdn.clone(),
                    source,
                }
            })?;

        info!(operation = "GET", object = %fqdn, "Serving object: {fqdn}");
        if let Err(err) = self.metrics.send_get(object.size, timestamp) {
            error!("Sending GET metrics failed: {err}");
        }

        Ok((object.size, object.body))
    }

    async fn put_inner(
        &self,
        key: &str,
        data: Option<ObjectReader>,
        append: bool,
    ) -> Result<u64, DriverError> {
        self.require(Feature::Put, "PUT")?;
        let Some(data) = data else {
            warn!("Put was called without a data source");
            return Err(DriverError::EmptyData);
        };

        let fqdn = self.fqdn(key);
        // The store has no append primitive.
        if append {
            error!("Can not append to object {fqdn:?}, APPE is not supported.");
            return Err(DriverError::NotEnabled { op: "APPE" });
        }

        let timestamp = SystemTime::now();
        // Racy by nature: another client may create the key after this check.
        if self.config.no_overwrite && self.object_exists(key).await {
            let err = DriverError::ObjectExists { fqdn: fqdn.clone() };
            error!(key = %fqdn, "{err}");
            return Err(err);
        }

        if let Err(source) = self.store.upload(self.bucket(), key, data).await {
            log_store_error(&source);
            let err = DriverError::SourceRead {
                fqdn: fqdn.clone(),
                source,
            };
            error!(object = %fqdn, action = "PUT", "{err}");
            return Err(err);
        }

        let size = self.object_size(key).await.inspect_err(|err| {
            error!(key = %fqdn, action = "PUT", error = %err, "Could not determine size of {fqdn:?}");
        })?;
        info!(key = %fqdn, action = "PUT", "Put {fqdn:?}");

        if let Err(err) = self.metrics.send_put(size, timestamp) {
            error!("Sending PUT metrics failed: {err}");
        }

        Ok(size)
    }
}

impl Driver for S3Driver {
    fn init(&mut self, conn: &Connection) {
        info!(peer = %conn.peer_addr, user = %conn.user, "Connection initialized");
    }

    fn stat<'a>(&'a self, key: &'a str) -> DriverFuture<'a, ObjectInfo> {
        Box::pin(self.stat_inner(key))
    }

    // There is no server-side directory to enter.  Clients resolve relative
    // paths themselves; the path is only remembered for object URLs.
    fn change_dir(&mut self, path: &str) -> Result<(), DriverError> {
        self.cwd = path.to_string();
        debug!("Changed into path: {:?}", self.cwd);
        Ok(())
    }

    fn list<'a>(
        &'a self,
        prefix: &'a str,
        callback: &'a mut ListCallback<'_>,
    ) -> DriverFuture<'a, ()> {
        Box::pin(self.list_inner(prefix, callback))
    }

    fn remove_dir<'a>(&'a self, _path: &'a str) -> DriverFuture<'a, ()> {
        Box::pin(async move {
            warn!("RemoveDir (RMDIR) is not supported.");
            Err(DriverError::NotEnabled { op: "RMDIR" })
        })
    }

    fn remove_file<'a>(&'a self, key: &'a str) -> DriverFuture<'a, ()> {
        Box::pin(self.remove_file_inner(key))
    }

    fn rename<'a>(&'a self, _from: &'a str, _to: &'a str) -> DriverFuture<'a, ()> {
        Box::pin(async move {
            warn!("Rename (MV) is not supported.");
            Err(DriverError::NotEnabled { op: "MV" })
        })
    }

    fn make_dir<'a>(&'a self, _path: &'a str) -> DriverFuture<'a, ()> {
        Box::pin(async move {
            warn!("MakeDir (MKDIR) is not supported.");
            Err(DriverError::NotEnabled { op: "MKDIR" })
        })
    }

    fn get<'a>(&'a self, key: &'a str, offset: u64) -> DriverFuture<'a, (u64, ObjectReader)> {
        Box::pin(self.get_inner(key, offset))
    }

    fn put<'a>(
        &'a self,
        key: &'a str,
        data: Option<ObjectReader>,
        append: bool,
    ) -> DriverFuture<'a, u64> {
        Box::pin(self.put_inner(key, data, append))
    }
}
