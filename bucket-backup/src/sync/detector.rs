//! Change detection against the local manifest.
//!
//! For each regular file under the source root:
//!
//! 1. excluded paths are ignored entirely;
//! 2. a file whose size is unchanged and whose mtime is not newer than the
//!    manifest's is taken as unchanged without reading it;
//! 3. otherwise the file is fingerprinted. Same fingerprint as the manifest
//!    means only metadata moved: the record is refreshed but nothing is
//!    uploaded. A different fingerprint, or no record at all, replaces the
//!    record with a pending one and reports the file as changed.

use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::fs::filter::ExcludeFilter;
use crate::fs::fingerprint::fingerprint_file;
use crate::fs::walker::{walk_files, WalkedFile};
use crate::manifest::{FileRecord, Manifest};
use crate::utils::errors::Result;

/// Tallies for one detection pass, logged at the end of the walk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DetectionSummary {
    pub scanned: usize,
    pub excluded: usize,
    pub unchanged: usize,
    pub metadata_only: usize,
    pub changed: usize,
    pub unreadable: usize,
}

/// Walk `source_root`, update `manifest` in place and return the records of
/// files whose content must be uploaded, in walk order.
///
/// # Errors
/// Fails only when the source root itself cannot be walked.
pub fn detect_changes(
    source_root: &Path,
    manifest: &mut Manifest,
    exclude_patterns: &[String],
) -> Result<Vec<FileRecord>> {
    let filter = ExcludeFilter::new(exclude_patterns);
    detect_changes_with_filter(source_root, manifest, &filter).map(|(changed, _)| changed)
}

/// Like [`detect_changes`], with a precompiled filter; also returns the tallies.
pub fn detect_changes_with_filter(
    source_root: &Path,
    manifest: &mut Manifest,
    filter: &ExcludeFilter,
) -> Result<(Vec<FileRecord>, DetectionSummary)> {
    detect_with(source_root, manifest, filter, fingerprint_file)
}

fn detect_with<F>(
    source_root: &Path,
    manifest: &mut Manifest,
    filter: &ExcludeFilter,
    fingerprint: F,
) -> Result<(Vec<FileRecord>, DetectionSummary)>
where
    F: Fn(&Path) -> io::Result<String>,
{
    let mut changed = Vec::new();
    let mut summary = DetectionSummary::default();

    walk_files(source_root, |file| {
        summary.scanned += 1;
        if filter.is_excluded(&file.relative_path) {
            summary.excluded += 1;
            return;
        }

        match classify(&file, manifest, &fingerprint) {
            Outcome::Unchanged => summary.unchanged += 1,
            Outcome::MetadataOnly => summary.metadata_only += 1,
            Outcome::Unreadable => summary.unreadable += 1,
            Outcome::Changed(record) => {
                summary.changed += 1;
                changed.push(record);
            }
        }
    })?;

    info!(
        "Scan complete: {} files, {} changed, {} unchanged, {} metadata-only, {} excluded, {} unreadable",
        summary.scanned,
        summary.changed,
        summary.unchanged,
        summary.metadata_only,
        summary.excluded,
        summary.unreadable
    );

    Ok((changed, summary))
}

enum Outcome {
    Unchanged,
    MetadataOnly,
    Unreadable,
    Changed(FileRecord),
}

fn classify<F>(file: &WalkedFile, manifest: &mut Manifest, fingerprint: &F) -> Outcome
where
    F: Fn(&Path) -> io::Result<String>,
{
    let rel = file.relative_path.as_str();
    let stat = file.stat;

    let possibly_modified = match manifest.get(rel) {
        None => true,
        Some(record) => stat.mod_time > record.mod_time || stat.size != record.size,
    };

    if !possibly_modified {
        manifest.mark_uploaded(rel);
        debug!(path = %rel, "Unchanged");
        return Outcome::Unchanged;
    }

    let checksum = match fingerprint(&file.path) {
        Ok(checksum) => checksum,
        Err(e) => {
            warn!(path = %rel, "Cannot fingerprint, skipping this run: {}", e);
            return Outcome::Unreadable;
        }
    };

    if let Some(record) = manifest.get_mut(rel) {
        if record.checksum == checksum {
            record.size = stat.size;
            record.mod_time = stat.mod_time;
            record.uploaded = true;
            debug!(path = %rel, "Content unchanged, metadata updated");
            return Outcome::MetadataOnly;
        }
    }

    let record = FileRecord {
        path: rel.to_string(),
        size: stat.size,
        mod_time: stat.mod_time,
        checksum,
        uploaded: false,
    };
    info!(
        path = %rel,
        "Changed (size: {}, checksum: {}), will upload",
        record.size,
        &record.checksum[..8.min(record.checksum.len())]
    );
    manifest.replace(record.clone());
    Outcome::Changed(record)
}
