//! Object storage collaborator.
//!
//! The sync engine only talks to remote storage through [`ObjectStore`].
//! Calls block the calling thread; a run is strictly sequential.

pub mod companion;
pub mod error;
pub mod filesystem;
pub mod memory;

use chrono::{DateTime, Utc};
use std::io::Read;

pub use companion::CompanionMetadata;
pub use error::{StorageError, StorageResult};
pub use filesystem::FilesystemStore;
pub use memory::MemoryObjectStore;

/// Handle to a remote object, as returned by [`ObjectStore::list`].
///
/// Callers pass it back to [`ObjectStore::delete`]; the name is exposed so
/// listings can be indexed by key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    name: String,
}

impl ObjectRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Full object key, including any prefix.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Attributes of a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectAttributes {
    /// Object size in bytes
    pub size: u64,

    /// When the current version of the object was stored
    pub upload_timestamp: DateTime<Utc>,
}

/// Blocking object store abstraction.
pub trait ObjectStore {
    /// List every object whose key starts with `prefix`.
    fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectRef>>;

    /// Create or replace the object at `remote_path` with the reader's content.
    /// Returns the number of bytes stored.
    fn upload(&self, remote_path: &str, reader: &mut dyn Read) -> StorageResult<u64>;

    /// Delete an object.
    fn delete(&self, object: &ObjectRef) -> StorageResult<()>;

    /// Get an object's attributes without fetching content.
    fn attributes(&self, remote_path: &str) -> StorageResult<ObjectAttributes>;

    /// Open an object's content for reading.
    fn get_object(&self, remote_path: &str) -> StorageResult<Box<dyn Read + '_>>;

    /// Backend name, for logs.
    fn backend_name(&self) -> &'static str;
}
