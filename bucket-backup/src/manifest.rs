//! Local manifest: the last known state of every tracked file.
//!
//! The manifest is loaded once at the start of a run, mutated in place by the
//! change detector and the reconciler, and persisted once at the end. It is
//! serialized as pretty-printed JSON:
//!
//! ```json
//! {
//!   "last_run": "2024-05-01T02:00:00Z",
//!   "records": {
//!     "docs/a.txt": {
//!       "path": "docs/a.txt",
//!       "size": 12,
//!       "mod_time": "2024-04-30T18:12:03.120Z",
//!       "checksum": "…40 hex chars…",
//!       "uploaded": true
//!     }
//!   }
//! }
//! ```
//!
//! State files written by earlier deployments (`last_backup`, `files`,
//! `backed_up`) load unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::utils::errors::{BackupError, Result};

/// Last known attributes of one tracked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Relative, `/`-separated path; the manifest key
    pub path: String,

    /// Size in bytes
    pub size: u64,

    /// Modification time observed when the record was last updated
    pub mod_time: DateTime<Utc>,

    /// Hex-encoded content fingerprint of the last content actually read
    pub checksum: String,

    /// True once the remote copy is known to be current
    #[serde(alias = "backed_up")]
    pub uploaded: bool,
}

/// Map of relative path to [`FileRecord`], plus the time of the last run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Completion time of the previous run; `None` if never run
    #[serde(default, alias = "last_backup")]
    last_run: Option<DateTime<Utc>>,

    #[serde(default, alias = "files")]
    records: BTreeMap<String, FileRecord>,

    /// Records displaced by [`Manifest::replace`] during this run, keyed by path
    #[serde(skip)]
    superseded: BTreeMap<String, FileRecord>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.last_run
    }

    pub fn set_last_run(&mut self, at: DateTime<Utc>) {
        self.last_run = Some(at);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.records.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut FileRecord> {
        self.records.get_mut(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.records.contains_key(path)
    }

    /// Insert or replace the record keyed by `record.path`.
    pub fn insert(&mut self, record: FileRecord) -> Option<FileRecord> {
        self.records.insert(record.path.clone(), record)
    }

    /// Insert a record for changed content, remembering the record it displaces
    /// until the new one is known to be uploaded.
    pub fn replace(&mut self, record: FileRecord) {
        let path = record.path.clone();
        if let Some(previous) = self.records.insert(path.clone(), record) {
            self.superseded.entry(path).or_insert(previous);
        }
    }

    /// The record displaced by [`Manifest::replace`] for `path`, if any.
    pub fn superseded(&self, path: &str) -> Option<&FileRecord> {
        self.superseded.get(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<FileRecord> {
        self.superseded.remove(path);
        self.records.remove(path)
    }

    /// Set `uploaded = true` on a record. Returns false if the path is unknown.
    pub fn mark_uploaded(&mut self, path: &str) -> bool {
        match self.records.get_mut(path) {
            Some(record) => {
                record.uploaded = true;
                true
            }
            None => false,
        }
    }

    /// Snapshot of all tracked paths, in key order.
    pub fn paths(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }

    /// Resolve records whose remote copy is not known to be current.
    ///
    /// Called before persisting. A pending record that displaced an earlier
    /// one is rolled back to it: the path stays tracked for deletion and the
    /// next run sees the content differ again. A pending record with no
    /// predecessor is dropped, so the next run sees the file as new. Either
    /// way the failed upload is retried. Returns the number of records
    /// resolved.
    pub fn settle_pending(&mut self) -> usize {
        let pending: Vec<String> = self
            .records
            .values()
            .filter(|record| !record.uploaded)
            .map(|record| record.path.clone())
            .collect();

        for path in &pending {
            match self.superseded.remove(path) {
                Some(previous) => {
                    self.records.insert(path.clone(), previous);
                }
                None => {
                    self.records.remove(path);
                }
            }
        }
        self.superseded.clear();
        pending.len()
    }
}

/// Reads and writes the persisted form of the [`Manifest`].
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location of the copy made by [`ManifestStore::backup`].
    pub fn backup_path(&self) -> PathBuf {
        sibling_with_suffix(&self.path, ".backup")
    }

    /// Load the manifest. A missing file yields an empty manifest.
    pub fn load(&self) -> Result<Manifest> {
        Self::read(&self.path)
    }

    /// Load the backup copy. A missing backup yields an empty manifest.
    pub fn load_backup(&self) -> Result<Manifest> {
        Self::read(&self.backup_path())
    }

    fn read(path: &Path) -> Result<Manifest> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No manifest at {}, starting empty", path.display());
                return Ok(Manifest::new());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content)
            .map_err(|e| BackupError::Manifest(format!("{}: {}", path.display(), e)))
    }

    /// Persist the manifest atomically: write a temp sibling, then rename.
    pub fn save(&self, manifest: &Manifest) -> Result<()> {
        let mut json = serde_json::to_vec_pretty(manifest)?;
        json.push(b'\n');
        write_atomic(&self.path, &json)?;
        debug!("Manifest saved: {} records", manifest.len());
        Ok(())
    }

    /// Copy the persisted manifest to its backup location.
    /// Returns false when there is no manifest to back up.
    pub fn backup(&self) -> Result<bool> {
        copy_if_exists(&self.path, &self.backup_path()).map(|copied| {
            if copied {
                info!("Manifest backed up to {}", self.backup_path().display());
            }
            copied
        })
    }

    /// Replace the persisted manifest with its backup copy.
    /// Returns false when there is no backup.
    pub fn restore(&self) -> Result<bool> {
        copy_if_exists(&self.backup_path(), &self.path).map(|copied| {
            if copied {
                info!("Manifest restored from {}", self.backup_path().display());
            }
            copied
        })
    }
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn copy_if_exists(from: &Path, to: &Path) -> Result<bool> {
    let data = match fs::read(from) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    write_atomic(to, &data)?;
    Ok(true)
}

fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let temp_path = sibling_with_suffix(path, ".tmp");
    let result = (|| {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}
