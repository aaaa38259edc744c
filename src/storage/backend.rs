//! Abstract object store client.
//!
//! The bridge only ever needs a handful of calls against a single bucket.
//! [`ObjectStore`] names exactly those calls so the adapter can run against
//! S3 or an in-process store without knowing which.

use std::future::Future;
use std::pin::Pin;
use std::time::SystemTime;

use tokio::io::AsyncRead;

use crate::errors::StoreError;

/// A readable byte stream handed between the protocol engine and the store.
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed future returned by every [`ObjectStore`] call.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Metadata returned by a head-object call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub size: u64,
    /// Last modification time, if the store reported one.
    pub last_modified: Option<SystemTime>,
}

/// One row of a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    /// Full object key.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modification time, if the store reported one.
    pub last_modified: Option<SystemTime>,
    /// Owner ID, if the store reported one.
    pub owner: Option<String>,
}

/// An object body being fetched.
pub struct StoredObject {
    /// Content length in bytes.
    pub size: u64,
    /// Streaming body.
    pub body: ObjectReader,
}

impl std::fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredObject")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Async object store contract.
pub trait ObjectStore: Send + Sync + 'static {
    /// Check that `bucket` exists and is accessible.
    fn head_bucket<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, ()>;

    /// Fetch metadata for `key`.
    fn head_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> StoreFuture<'a, ObjectMeta>;

    /// List the bucket in a single call, without pagination.
    fn list_objects<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, Vec<ListedObject>>;

    /// Fetch the full object at `key`.
    fn get_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> StoreFuture<'a, StoredObject>;

    /// Delete the object at `key`.
    fn delete_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> StoreFuture<'a, ()>;

    /// Stream `body` into the object at `key`, replacing any existing object.
    fn upload<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: ObjectReader,
    ) -> StoreFuture<'a, ()>;
}
