//! Driver contract between the file transfer protocol engine and the bridge.
//!
//! The protocol engine owns connections and command parsing.  For every
//! accepted connection it asks a [`DriverFactory`] for a fresh [`Driver`] and
//! then calls it once per client command, never overlapping calls on the
//! same connection.

pub mod factory;
pub mod s3;

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::SystemTime;

use crate::errors::DriverError;
use crate::storage::backend::ObjectReader;

/// Boxed future returned by [`Driver`] methods.
pub type DriverFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DriverError>> + Send + 'a>>;

/// Receives one listing entry at a time.
pub type ListCallback<'a> = dyn FnMut(ObjectInfo) -> Result<(), DriverError> + Send + 'a;

/// Permission bits reported for pseudo-directories.
pub const DIR_MODE: u32 = 0o755;

/// Permission bits reported for objects.
pub const FILE_MODE: u32 = 0o644;

/// The engine's view of one file or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Key, or name relative to the listed prefix.
    pub name: String,
    /// Size in bytes; 0 for pseudo-directories.
    pub size: u64,
    pub mod_time: SystemTime,
    /// Owner ID as reported by the store, possibly empty.
    pub owner: String,
    /// Always empty; object stores have no groups.
    pub group: String,
    /// Synthesized from a key prefix rather than a stored object.
    pub is_prefix: bool,
}

impl ObjectInfo {
    /// A pseudo-directory entry named `name`, stamped with the current time.
    pub fn pseudo_dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            mod_time: SystemTime::now(),
            owner: String::new(),
            group: String::new(),
            is_prefix: true,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.is_prefix
    }

    /// Unix permission bits for directory listings.
    pub fn mode(&self) -> u32 {
        if self.is_prefix {
            DIR_MODE
        } else {
            FILE_MODE
        }
    }
}

/// A protocol connection as handed over at driver initialisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub peer_addr: SocketAddr,
    /// Authenticated user name.
    pub user: String,
}

/// Per-connection file system operations.
pub trait Driver: Send + Sync {
    /// Called once when the connection is established.
    fn init(&mut self, conn: &Connection);

    /// Metadata for `key`.
    fn stat<'a>(&'a self, key: &'a str) -> DriverFuture<'a, ObjectInfo>;

    /// Record `path` as the working path of this connection.
    fn change_dir(&mut self, path: &str) -> Result<(), DriverError>;

    /// Call `callback` once for every immediate child of `prefix`.
    fn list<'a>(
        &'a self,
        prefix: &'a str,
        callback: &'a mut ListCallback<'_>,
    ) -> DriverFuture<'a, ()>;

    /// Remove a directory.  Always fails: prefixes cannot be removed.
    fn remove_dir<'a>(&'a self, path: &'a str) -> DriverFuture<'a, ()>;

    fn remove_file<'a>(&'a self, key: &'a str) -> DriverFuture<'a, ()>;

    /// Move `from` to `to`.  Always fails: objects cannot be moved.
    fn rename<'a>(&'a self, from: &'a str, to: &'a str) -> DriverFuture<'a, ()>;

    /// Create a directory.  Always fails: prefixes cannot be created.
    fn make_dir<'a>(&'a self, path: &'a str) -> DriverFuture<'a, ()>;

    /// Open `key` for download, returning its size and body.
    fn get<'a>(&'a self, key: &'a str, offset: u64) -> DriverFuture<'a, (u64, ObjectReader)>;

    /// Store `data` at `key`, returning the stored size.
    fn put<'a>(
        &'a self,
        key: &'a str,
        data: Option<ObjectReader>,
        append: bool,
    ) -> DriverFuture<'a, u64>;
}

/// Builds one [`Driver`] per connection.
pub trait DriverFactory: Send + Sync {
    fn new_driver(&self) -> Box<dyn Driver>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pseudo_dir_entry() {
        let before = SystemTime::now();
        let info = ObjectInfo::pseudo_dir("reports");
        assert_eq!(info.name, "reports");
        assert_eq!(info.size, 0);
        assert!(info.is_dir());
        assert!(info.group.is_empty());
        assert!(info.mod_time >= before);
        assert_eq!(info.mode(), DIR_MODE);
    }

    #[test]
    fn test_file_mode() {
        let info = ObjectInfo {
            is_prefix: false,
            ..ObjectInfo::pseudo_dir("a.txt")
        };
        assert!(!info.is_dir());
        assert_eq!(info.mode(), FILE_MODE);
    }
}
