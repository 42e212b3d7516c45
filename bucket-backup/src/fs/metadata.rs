//! Cheap per-file facts used by the change detector.
//!
//! Reading a [`FileStat`] costs one `stat` call; no file content is read.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;

/// Size and modification time of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// File size in bytes
    pub size: u64,

    /// Last modified time, as reported by the source filesystem
    pub mod_time: DateTime<Utc>,
}

impl FileStat {
    /// Stat a path, following symlinks
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Self::from_metadata(&metadata)
    }

    pub fn from_metadata(metadata: &fs::Metadata) -> std::io::Result<Self> {
        Ok(Self {
            size: metadata.len(),
            mod_time: DateTime::<Utc>::from(metadata.modified()?),
        })
    }
}
