//! In-memory object store.
//!
//! Objects live in a `tokio::sync::RwLock<BTreeMap<...>>` keyed by object
//! key, so listings come back in lexicographic key order.  The store serves
//! a single named bucket and answers with the same error codes S3 uses,
//! which makes it a drop-in stand-in for the AWS client.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;
use tokio::io::AsyncReadExt;

use super::backend::{
    ListedObject, ObjectMeta, ObjectReader, ObjectStore, StoreFuture, StoredObject,
};
use crate::errors::StoreError;

/// Owner ID reported for every object in the store.
pub const MEMORY_OWNER: &str = "memory";

#[derive(Debug, Clone)]
struct MemoryObject {
    data: Bytes,
    last_modified: SystemTime,
}

/// Single-bucket in-memory store.
#[derive(Debug)]
pub struct MemoryStore {
    /// The only bucket this store answers for.
    bucket: String,
    /// key -> object.
    objects: tokio::sync::RwLock<BTreeMap<String, MemoryObject>>,
    /// When false every call fails as if the bucket were gone.
    reachable: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store serving `bucket`.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: tokio::sync::RwLock::new(BTreeMap::new()),
            reachable: AtomicBool::new(true),
        }
    }

    /// Store `data` under `key` directly, bypassing the streaming upload.
    pub async fn insert(&self, key: &str, data: impl Into<Bytes>) {
        self.objects.write().await.insert(
            key.to_string(),
            MemoryObject {
                data: data.into(),
                last_modified: SystemTime::now(),
            },
        );
    }

    /// Return a copy of the object stored at `key`.
    pub async fn contents(&self, key: &str) -> Option<Bytes> {
        self.objects.read().await.get(key).map(|o| o.data.clone())
    }

    /// Simulate the bucket becoming unreachable (or reachable again).
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    fn check_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        if !self.reachable.load(Ordering::SeqCst) || bucket != self.bucket {
            return Err(StoreError::new(
                "NoSuchBucket",
                format!("The specified bucket does not exist: {bucket}"),
            ));
        }
        Ok(())
    }

    async fn lookup(&self, bucket: &str, key: &str, code: &str) -> Result<MemoryObject, StoreError> {
        self.check_bucket(bucket)?;
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::new(code, format!("No object at key: {key}")))
    }
}

impl ObjectStore for MemoryStore {
    fn head_bucket<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move { self.check_bucket(bucket) })
    }

    fn head_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> StoreFuture<'a, ObjectMeta> {
        Box::pin(async move {
            let object = self.lookup(bucket, key, "NotFound").await?;
            Ok(ObjectMeta {
                size: object.data.len() as u64,
                last_modified: Some(object.last_modified),
            })
        })
    }

    fn list_objects<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, Vec<ListedObject>> {
        Box::pin(async move {
            self.check_bucket(bucket)?;
            let objects = self.objects.read().await;
            Ok(objects
                .iter()
                .map(|(key, object)| ListedObject {
                    key: key.clone(),
                    size: object.data.len() as u64,
                    last_modified: Some(object.last_modified),
                    owner: Some(MEMORY_OWNER.to_string()),
                })
                .collect())
        })
    }

    fn get_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> StoreFuture<'a, StoredObject> {
        Box::pin(async move {
            let object = self.lookup(bucket, key, "NoSuchKey").await?;
            Ok(StoredObject {
                size: object.data.len() as u64,
                body: Box::new(std::io::Cursor::new(object.data)),
            })
        })
    }

    fn delete_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.check_bucket(bucket)?;
            // Deleting a missing key is not an error, same as S3.
            self.objects.write().await.remove(key);
            Ok(())
        })
    }

    fn upload<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        mut body: ObjectReader,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.check_bucket(bucket)?;

            let mut data = Vec::new();
            body.read_to_end(&mut data)
                .await
                .map_err(|e| StoreError::new("SourceReadError", e.to_string()))?;

            self.insert(key, data).await;
            Ok(())
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(data: &'static [u8]) -> ObjectReader {
        Box::new(data)
    }

    #[tokio::test]
    async fn test_upload_and_get_roundtrip() {
        let store = MemoryStore::new("bucket");
        store
            .upload("bucket", "dir/key.txt", reader(b"hello world"))
            .await
            .unwrap();

        let mut object = store.get_object("bucket", "dir/key.txt").await.unwrap();
        assert_eq!(object.size, 11);

        let mut body = String::new();
        object.body.read_to_string(&mut body).await.unwrap();
        assert_eq!(body, "hello world");
    }

    #[tokio::test]
    async fn test_head_missing_is_not_found() {
        let store = MemoryStore::new("bucket");
        let err = store.head_object("bucket", "missing").await.unwrap_err();
        assert_eq!(err.code, "NotFound");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_missing_is_no_such_key() {
        let store = MemoryStore::new("bucket");
        let err = store.get_object("bucket", "missing").await.unwrap_err();
        assert_eq!(err.code, "NoSuchKey");
    }

    #[tokio::test]
    async fn test_wrong_bucket_is_no_such_bucket() {
        let store = MemoryStore::new("bucket");
        let err = store.head_bucket("other").await.unwrap_err();
        assert_eq!(err.code, "NoSuchBucket");
    }

    #[tokio::test]
    async fn test_unreachable_fails_every_call() {
        let store = MemoryStore::new("bucket");
        store.insert("key", "data").await;
        store.set_reachable(false);

        assert!(store.head_bucket("bucket").await.is_err());
        assert!(store.list_objects("bucket").await.is_err());
        assert!(store.get_object("bucket", "key").await.is_err());

        store.set_reachable(true);
        assert!(store.head_bucket("bucket").await.is_ok());
    }

    #[tokio::test]
    async fn test_list_is_sorted_with_owner() {
        let store = MemoryStore::new("bucket");
        store.insert("b", "2").await;
        store.insert("a", "1").await;

        let listed = store.list_objects("bucket").await.unwrap();
        let keys: Vec<&str> = listed.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(listed[0].owner.as_deref(), Some(MEMORY_OWNER));
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let store = MemoryStore::new("bucket");
        store.delete_object("bucket", "missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_overwrites() {
        let store = MemoryStore::new("bucket");
        store.insert("key", "version 1").await;
        store
            .upload("bucket", "key", reader(b"version 2"))
            .await
            .unwrap();
        assert_eq!(store.contents("key").await.unwrap(), Bytes::from("version 2"));
    }
}
