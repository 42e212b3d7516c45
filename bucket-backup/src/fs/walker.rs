//! Directory traversal for change detection.
//!
//! Walks a source tree and reports every regular file with its
//! slash-normalized relative path and stat. Symlinks to files are resolved;
//! symlinks to directories are not followed. Problems with a single entry
//! are logged and skipped; only a failure on the root itself aborts the walk.

use std::path::{Component, Path, PathBuf};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

use crate::fs::metadata::FileStat;
use crate::utils::errors::{BackupError, Result};

/// A regular file discovered during walking
#[derive(Debug, Clone)]
pub struct WalkedFile {
    /// Full path to the file
    pub path: PathBuf,

    /// Path relative to the walk root, `/`-separated
    pub relative_path: String,

    /// Size and modification time
    pub stat: FileStat,
}

impl WalkedFile {
    /// Build from a DirEntry.
    /// For symlinks, resolves to the target to get the real file stat.
    /// Returns None for directories, symlinks to directories and special files.
    fn from_entry(entry: &DirEntry, root: &Path) -> std::io::Result<Option<Self>> {
        let file_type = entry.file_type();
        if file_type.is_dir() {
            return Ok(None);
        }

        let path = entry.path().to_path_buf();
        let metadata = if file_type.is_symlink() {
            // Broken symlinks surface as an error here
            let resolved = std::fs::metadata(&path)?;
            if !resolved.is_file() {
                return Ok(None);
            }
            resolved
        } else if file_type.is_file() {
            entry.metadata().map_err(std::io::Error::from)?
        } else {
            return Ok(None);
        };

        let Ok(rel) = path.strip_prefix(root) else {
            return Ok(None);
        };
        let Some(relative_path) = to_slash(rel) else {
            warn!(path = %path.display(), "Skipping file whose name is not valid UTF-8");
            return Ok(None);
        };

        Ok(Some(Self {
            path,
            relative_path,
            stat: FileStat::from_metadata(&metadata)?,
        }))
    }
}

/// Join the normal components of a relative path with `/`.
/// Returns `None` if any component is not valid UTF-8.
pub fn to_slash(path: &Path) -> Option<String> {
    let parts = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_str()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}

/// Walk a directory tree, calling `callback` for each regular file in walk order.
///
/// # Errors
/// Returns [`BackupError::Walk`] if the root cannot be read. Errors on any
/// other entry are logged and the entry is skipped.
pub fn walk_files<F>(root: &Path, mut callback: F) -> Result<()>
where
    F: FnMut(WalkedFile),
{
    let root_metadata = std::fs::metadata(root).map_err(|source| BackupError::Walk {
        path: root.to_path_buf(),
        source,
    })?;
    if !root_metadata.is_dir() {
        return Err(BackupError::Walk {
            path: root.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "not a directory"),
        });
    }

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(BackupError::Walk {
                    path: root.to_path_buf(),
                    source: e.into(),
                });
            }
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        match WalkedFile::from_entry(&entry, root) {
            Ok(Some(file)) => callback(file),
            Ok(None) => {}
            Err(e) => warn!(path = %entry.path().display(), "Skipping file: {}", e),
        }
    }

    Ok(())
}
