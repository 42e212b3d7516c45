//! In-memory object store.
//!
//! Holds objects in a map and lets callers control the upload clock and
//! inject failures per key, which makes it the backend of choice for tests
//! of the reconciler and the orchestrator.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::io::{Cursor, Read};
use std::sync::{Mutex, MutexGuard};

use super::error::{StorageError, StorageResult};
use super::{ObjectAttributes, ObjectRef, ObjectStore};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, StoredObject>,
    /// Fixed upload clock; `None` uses the wall clock
    now: Option<DateTime<Utc>>,
    failing_uploads: HashSet<String>,
    failing_deletes: HashSet<String>,
    failing_list: bool,
    uploads: Vec<String>,
    deletes: Vec<String>,
    delete_calls: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    inner: Mutex<Inner>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store an object directly, bypassing failure injection and the upload log.
    pub fn insert(&self, name: &str, data: impl Into<Vec<u8>>, uploaded_at: DateTime<Utc>) {
        self.lock().objects.insert(
            name.to_string(),
            StoredObject {
                data: data.into(),
                uploaded_at,
            },
        );
    }

    /// Fix the timestamp given to subsequent uploads.
    pub fn set_now(&self, now: DateTime<Utc>) {
        self.lock().now = Some(now);
    }

    /// Make every upload to `name` fail.
    pub fn fail_upload(&self, name: &str) {
        self.lock().failing_uploads.insert(name.to_string());
    }

    /// Make every delete of `name` fail.
    pub fn fail_delete(&self, name: &str) {
        self.lock().failing_deletes.insert(name.to_string());
    }

    pub fn fail_list(&self, failing: bool) {
        self.lock().failing_list = failing;
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().objects.contains_key(name)
    }

    pub fn data(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(name).map(|o| o.data.clone())
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    /// Keys successfully uploaded, in call order.
    pub fn uploads(&self) -> Vec<String> {
        self.lock().uploads.clone()
    }

    /// Keys successfully deleted, in call order.
    pub fn deletes(&self) -> Vec<String> {
        self.lock().deletes.clone()
    }

    /// Every key passed to `delete`, whether or not it succeeded.
    pub fn delete_calls(&self) -> Vec<String> {
        self.lock().delete_calls.clone()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectRef>> {
        let inner = self.lock();
        if inner.failing_list {
            return Err(StorageError::Backend("injected list failure".to_string()));
        }
        Ok(inner
            .objects
            .keys()
            .filter(|name| name.starts_with(prefix))
            .map(ObjectRef::new)
            .collect())
    }

    fn upload(&self, remote_path: &str, reader: &mut dyn Read) -> StorageResult<u64> {
        if self.lock().failing_uploads.contains(remote_path) {
            return Err(StorageError::Backend(format!(
                "injected upload failure: {remote_path}"
            )));
        }

        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let size = data.len() as u64;

        let mut inner = self.lock();
        let uploaded_at = inner.now.unwrap_or_else(Utc::now);
        inner
            .objects
            .insert(remote_path.to_string(), StoredObject { data, uploaded_at });
        inner.uploads.push(remote_path.to_string());
        Ok(size)
    }

    fn delete(&self, object: &ObjectRef) -> StorageResult<()> {
        let mut inner = self.lock();
        inner.delete_calls.push(object.name().to_string());
        if inner.failing_deletes.contains(object.name()) {
            return Err(StorageError::Backend(format!(
                "injected delete failure: {}",
                object.name()
            )));
        }
        match inner.objects.remove(object.name()) {
            Some(_) => {
                inner.deletes.push(object.name().to_string());
                Ok(())
            }
            None => Err(StorageError::NotFound(object.name().to_string())),
        }
    }

    fn attributes(&self, remote_path: &str) -> StorageResult<ObjectAttributes> {
        self.lock()
            .objects
            .get(remote_path)
            .map(|o| ObjectAttributes {
                size: o.data.len() as u64,
                upload_timestamp: o.uploaded_at,
            })
            .ok_or_else(|| StorageError::NotFound(remote_path.to_string()))
    }

    fn get_object(&self, remote_path: &str) -> StorageResult<Box<dyn Read + '_>> {
        let data = self
            .data(remote_path)
            .ok_or_else(|| StorageError::NotFound(remote_path.to_string()))?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
