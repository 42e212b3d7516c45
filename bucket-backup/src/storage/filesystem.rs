//! Directory-backed object store.
//!
//! Each object is a file under the bucket root, named by its key. Uploads are
//! written to a temp sibling and renamed into place, so readers never see a
//! partial object. The upload timestamp is the stored file's mtime.

use chrono::{DateTime, Utc};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use super::error::{StorageError, StorageResult};
use super::{ObjectAttributes, ObjectRef, ObjectStore};
use crate::fs::walker::to_slash;

const TEMP_SUFFIX: &str = ".upload-tmp";

/// Local filesystem object store.
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    /// Open (creating if needed) a bucket rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to a path under the root, rejecting anything that could escape it.
    fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key.starts_with('/') || key.starts_with('\\') {
            return Err(StorageError::InvalidKey(format!("not a relative key: {key}")));
        }

        for component in Path::new(key).components() {
            if !matches!(component, Component::Normal(_)) {
                return Err(StorageError::InvalidKey(format!(
                    "contains unsafe path component: {key}"
                )));
            }
        }

        Ok(self.root.join(key))
    }

    fn map_not_found(key: &str, e: io::Error) -> StorageError {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

impl ObjectStore for FilesystemStore {
    fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectRef>> {
        // Walk the deepest directory the prefix names, then filter by the full prefix
        let dir_part = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let base = if dir_part.is_empty() {
            self.root.clone()
        } else {
            self.key_path(dir_part)?
        };

        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let mut objects = Vec::new();
        for entry in WalkDir::new(&base).follow_links(false) {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let Some(name) = to_slash(rel) else {
                continue;
            };
            if name.starts_with(prefix) && !name.ends_with(TEMP_SUFFIX) {
                objects.push(ObjectRef::new(name));
            }
        }

        objects.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(objects)
    }

    fn upload(&self, remote_path: &str, reader: &mut dyn Read) -> StorageResult<u64> {
        let path = self.key_path(remote_path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(TEMP_SUFFIX);
        let temp_path = PathBuf::from(temp_name);

        let result = (|| {
            let mut file = fs::File::create(&temp_path)?;
            let written = io::copy(reader, &mut file)?;
            file.flush()?;
            file.sync_all()?;
            fs::rename(&temp_path, &path)?;
            Ok::<u64, io::Error>(written)
        })();

        match result {
            Ok(written) => {
                debug!(key = %remote_path, bytes = written, "Stored object");
                Ok(written)
            }
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                Err(StorageError::Io(e))
            }
        }
    }

    fn delete(&self, object: &ObjectRef) -> StorageResult<()> {
        let path = self.key_path(object.name())?;
        fs::remove_file(&path).map_err(|e| Self::map_not_found(object.name(), e))
    }

    fn attributes(&self, remote_path: &str) -> StorageResult<ObjectAttributes> {
        let path = self.key_path(remote_path)?;
        let metadata = fs::metadata(&path).map_err(|e| Self::map_not_found(remote_path, e))?;
        if !metadata.is_file() {
            return Err(StorageError::NotFound(remote_path.to_string()));
        }

        Ok(ObjectAttributes {
            size: metadata.len(),
            upload_timestamp: DateTime::<Utc>::from(metadata.modified()?),
        })
    }

    fn get_object(&self, remote_path: &str) -> StorageResult<Box<dyn Read + '_>> {
        let path = self.key_path(remote_path)?;
        let file = fs::File::open(&path).map_err(|e| Self::map_not_found(remote_path, e))?;
        Ok(Box::new(io::BufReader::new(file)))
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}
