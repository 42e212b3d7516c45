//! Remote reconciliation: uploads, deletion propagation and retention.
//!
//! Every remote key is `prefix + relative path`. Failures are counted in
//! [`SyncStats`] and never stop the phase they happen in; the three phases
//! always run in order: uploads, deletions (when enabled), retention.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Cursor};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::{Config, MetadataStrategy};
use crate::fs::filter::ExcludeFilter;
use crate::manifest::{FileRecord, Manifest};
use crate::storage::companion::{companion_path, CompanionMetadata};
use crate::storage::{ObjectAttributes, ObjectRef, ObjectStore, StorageError};
use crate::sync::stats::SyncStats;
use crate::transfer::progress::{format_bytes, format_speed, TransferTally};

/// The slice of configuration the reconciler needs.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub source_root: PathBuf,
    pub prefix: String,
    pub exclude: Vec<String>,
    pub sync_delete: bool,
    pub retention_days: i64,
    pub strategy: MetadataStrategy,
}

impl ReconcileOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_root: config.source.dir.clone(),
            prefix: config.storage.prefix.clone(),
            exclude: config.source.exclude.clone(),
            sync_delete: config.sync.sync_delete,
            retention_days: config.sync.retention_days,
            strategy: config.sync.metadata_strategy,
        }
    }
}

/// Remote objects under the prefix, keyed by full object name.
pub type RemoteIndex = HashMap<String, ObjectRef>;

#[derive(Debug)]
enum UploadOutcome {
    Uploaded(u64),
    AlreadyCurrent,
    Failed(String),
}

pub struct Reconciler<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    options: ReconcileOptions,
    filter: ExcludeFilter,
}

impl<'a, S: ObjectStore + ?Sized> Reconciler<'a, S> {
    pub fn new(store: &'a S, options: ReconcileOptions) -> Self {
        let filter = ExcludeFilter::new(&options.exclude);
        Self {
            store,
            options,
            filter,
        }
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// Remote key for a relative path.
    pub fn remote_path(&self, relative_path: &str) -> String {
        format!("{}{}", self.options.prefix, relative_path)
    }

    /// Run all three phases and return the combined counters.
    pub fn reconcile(
        &self,
        changed: Vec<FileRecord>,
        manifest: &mut Manifest,
        now: DateTime<Utc>,
    ) -> SyncStats {
        let mut stats = SyncStats::default();

        self.upload_changed(changed, manifest, &mut stats);

        if self.options.sync_delete {
            match self.remote_index() {
                Ok(index) => self.propagate_deletions(manifest, &index, &mut stats),
                Err(e) => {
                    warn!("Cannot list remote objects, skipping deletion sync: {}", e);
                    stats.failed += 1;
                }
            }
        } else {
            debug!("Sync delete disabled");
        }

        if self.options.retention_days > 0 {
            self.sweep_retention(now, &mut stats);
        } else {
            debug!("Retention disabled");
        }

        stats
    }

    /// List every object under the prefix.
    pub fn remote_index(&self) -> Result<RemoteIndex, StorageError> {
        let objects = self.store.list(&self.options.prefix)?;
        info!("Found {} objects under '{}'", objects.len(), self.options.prefix);
        Ok(objects
            .into_iter()
            .map(|obj| (obj.name().to_string(), obj))
            .collect())
    }

    // ===== Upload protocol =====

    /// Upload each changed file, marking its record uploaded on success.
    pub fn upload_changed(
        &self,
        changed: Vec<FileRecord>,
        manifest: &mut Manifest,
        stats: &mut SyncStats,
    ) {
        if changed.is_empty() {
            info!("No changed files to upload");
            return;
        }

        let mut tally = TransferTally::new(changed.len());
        info!(
            "Uploading {} changed files (duplicate check: {})",
            changed.len(),
            self.options.strategy
        );

        for record in changed {
            let position = tally.position();
            match self.upload_one(&record) {
                UploadOutcome::Uploaded(bytes) => {
                    info!(path = %record.path, "{} Uploaded {}", position, format_bytes(bytes));
                    tally.record_success(bytes);
                    stats.uploaded += 1;
                    stats.bytes_uploaded += bytes;
                    manifest.mark_uploaded(&record.path);
                }
                UploadOutcome::AlreadyCurrent => {
                    tally.record_attempt();
                    stats.skipped += 1;
                    manifest.mark_uploaded(&record.path);
                }
                UploadOutcome::Failed(reason) => {
                    warn!(path = %record.path, "{} Upload failed: {}", position, reason);
                    tally.record_attempt();
                    stats.failed += 1;
                }
            }
        }

        info!(
            "Upload phase done: {} transferred in {:.1}s ({})",
            format_bytes(tally.transferred_bytes),
            tally.elapsed().as_secs_f64(),
            format_speed(tally.average_speed())
        );
    }

    fn upload_one(&self, record: &FileRecord) -> UploadOutcome {
        let remote = self.remote_path(&record.path);

        match self.store.attributes(&remote) {
            Ok(attrs) => {
                if self.remote_is_current(record, &remote, &attrs) {
                    return UploadOutcome::AlreadyCurrent;
                }
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                debug!(path = %record.path, "Cannot read remote attributes, uploading: {}", e);
            }
        }

        let local = self.options.source_root.join(&record.path);
        let mut file = match File::open(&local) {
            Ok(file) => file,
            Err(e) => return UploadOutcome::Failed(format!("cannot open {}: {}", local.display(), e)),
        };

        let bytes = match self.store.upload(&remote, &mut file) {
            Ok(bytes) => bytes,
            Err(e) => return UploadOutcome::Failed(e.to_string()),
        };

        if self.options.strategy == MetadataStrategy::Full {
            if let Err(e) = self.write_companion(&remote, &record.checksum, bytes) {
                warn!(path = %record.path, "Could not store companion metadata: {}", e);
            }
        }

        UploadOutcome::Uploaded(bytes)
    }

    /// Duplicate-avoidance check for an object that already exists remotely.
    fn remote_is_current(&self, record: &FileRecord, remote: &str, attrs: &ObjectAttributes) -> bool {
        match self.options.strategy {
            MetadataStrategy::None => false,
            MetadataStrategy::Basic => {
                let current = attrs.size == record.size;
                if current {
                    debug!(path = %record.path, "Same size remotely, skipping upload");
                }
                current
            }
            MetadataStrategy::Full => match self.read_companion(remote) {
                Ok(meta) if meta.checksum == record.checksum => {
                    debug!(path = %record.path, "Same checksum remotely, skipping upload");
                    true
                }
                Ok(_) => false,
                Err(e) => {
                    debug!(path = %record.path, "No usable companion metadata: {}", e);
                    false
                }
            },
        }
    }

    fn read_companion(&self, remote: &str) -> Result<CompanionMetadata, StorageError> {
        let reader = self.store.get_object(&companion_path(remote))?;
        CompanionMetadata::from_reader(reader)
            .map_err(|e| StorageError::Backend(format!("malformed companion metadata: {e}")))
    }

    fn write_companion(&self, remote: &str, checksum: &str, size: u64) -> Result<(), StorageError> {
        let json = CompanionMetadata::new(checksum, size)
            .to_json()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        self.store
            .upload(&companion_path(remote), &mut Cursor::new(json))
            .map(|_| ())
    }

    // ===== Deletion protocol =====

    /// Delete remote copies of manifest paths that no longer exist locally.
    pub fn propagate_deletions(
        &self,
        manifest: &mut Manifest,
        index: &RemoteIndex,
        stats: &mut SyncStats,
    ) {
        for path in manifest.paths() {
            let local = self.options.source_root.join(&path);
            match std::fs::metadata(&local) {
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path, "Cannot check local file, keeping remote copy: {}", e);
                    continue;
                }
            }

            if self.filter.is_excluded(&path) {
                debug!(path = %path, "Deleted locally but excluded, leaving remote copy");
                stats.skipped += 1;
                continue;
            }

            let remote = self.remote_path(&path);
            let Some(object) = index.get(&remote) else {
                debug!(path = %path, "Deleted locally, no remote copy");
                manifest.remove(&path);
                continue;
            };

            info!(path = %path, "Deleting removed file");
            match self.store.delete(object) {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(path = %path, "Delete failed: {}", e);
                    stats.failed += 1;
                    continue;
                }
            }

            if self.options.strategy == MetadataStrategy::Full {
                self.delete_companion(&remote, index);
            }
            stats.deleted += 1;
            manifest.remove(&path);
        }
    }

    /// Best-effort removal of the companion, when the listing returned one.
    fn delete_companion(&self, remote: &str, index: &RemoteIndex) {
        let meta = companion_path(remote);
        let Some(object) = index.get(&meta) else {
            return;
        };
        match self.store.delete(object) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => debug!("Could not delete companion metadata {}: {}", meta, e),
        }
    }

    // ===== Retention protocol =====

    /// Delete every object under the prefix uploaded strictly before
    /// `now - retention_days`.
    pub fn sweep_retention(&self, now: DateTime<Utc>, stats: &mut SyncStats) {
        let Some(cutoff) = Duration::try_days(self.options.retention_days)
            .and_then(|age| now.checked_sub_signed(age))
        else {
            debug!("Retention window reaches past the calendar, nothing can expire");
            return;
        };

        info!("Applying retention policy: removing objects uploaded before {}", cutoff);

        let objects = match self.store.list(&self.options.prefix) {
            Ok(objects) => objects,
            Err(e) => {
                warn!("Retention sweep skipped, cannot list objects: {}", e);
                return;
            }
        };

        for object in objects {
            let attrs = match self.store.attributes(object.name()) {
                Ok(attrs) => attrs,
                Err(e) => {
                    warn!("Cannot read attributes of {}: {}", object.name(), e);
                    continue;
                }
            };

            if attrs.upload_timestamp >= cutoff {
                continue;
            }

            info!(
                "Deleting old backup: {} (uploaded: {})",
                object.name(),
                attrs.upload_timestamp
            );
            match self.store.delete(&object) {
                Ok(()) => stats.expired += 1,
                Err(e) => warn!("Error deleting {}: {}", object.name(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryObjectStore;
    use chrono::TimeZone;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;

    const PREFIX: &str = "backups/";

    fn options(root: &std::path::Path, strategy: MetadataStrategy) -> ReconcileOptions {
        ReconcileOptions {
            source_root: root.to_path_buf(),
            prefix: PREFIX.to_string(),
            exclude: Vec::new(),
            sync_delete: false,
            retention_days: 0,
            strategy,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    /// Write a file and return its pending record, already inserted in `manifest`.
    fn changed_file(root: &std::path::Path, manifest: &mut Manifest, rel: &str, data: &[u8]) -> FileRecord {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, data).unwrap();
        let record = FileRecord {
            path: rel.to_string(),
            size: data.len() as u64,
            mod_time: now(),
            checksum: crate::fs::fingerprint::fingerprint_file(&path).unwrap(),
            uploaded: false,
        };
        manifest.insert(record.clone());
        record
    }

    #[test]
    fn test_uploads_changed_files() {
        let dir = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        let mut manifest = Manifest::new();
        let a = changed_file(dir.path(), &mut manifest, "a.txt", b"alpha");
        let b = changed_file(dir.path(), &mut manifest, "sub/b.txt", b"beta");

        let reconciler = Reconciler::new(&store, options(dir.path(), MetadataStrategy::Basic));
        let stats = reconciler.reconcile(vec![a, b], &mut manifest, now());

        assert_eq!(stats.uploaded, 2);
        assert_eq!(stats.bytes_uploaded, 9);
        assert_eq!(store.data("backups/sub/b.txt").unwrap(), b"beta");
        assert!(manifest.records().all(|r| r.uploaded));
    }

    #[test]
    fn test_upload_failure_is_isolated() {
        let dir = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        store.fail_upload("backups/b.txt");

        let mut manifest = Manifest::new();
        let changed = vec![
            changed_file(dir.path(), &mut manifest, "a.txt", b"A"),
            changed_file(dir.path(), &mut manifest, "b.txt", b"B"),
            changed_file(dir.path(), &mut manifest, "c.txt", b"C"),
        ];

        let reconciler = Reconciler::new(&store, options(dir.path(), MetadataStrategy::None));
        let stats = reconciler.reconcile(changed, &mut manifest, now());

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.uploaded, 2);
        assert!(manifest.get("a.txt").unwrap().uploaded);
        assert!(!manifest.get("b.txt").unwrap().uploaded);
        assert!(manifest.get("c.txt").unwrap().uploaded);
    }

    #[test]
    fn test_missing_local_file_counts_as_failure() {
        let dir = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        let mut manifest = Manifest::new();
        let record = changed_file(dir.path(), &mut manifest, "gone.txt", b"x");
        fs::remove_file(dir.path().join("gone.txt")).unwrap();

        let reconciler = Reconciler::new(&store, options(dir.path(), MetadataStrategy::None));
        let stats = reconciler.reconcile(vec![record], &mut manifest, now());

        assert_eq!(stats.failed, 1);
        assert!(store.uploads().is_empty());
    }

    #[test]
    fn test_strategy_none_always_uploads() {
        let dir = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        store.insert("backups/a.txt", "alpha", now());

        let mut manifest = Manifest::new();
        let record = changed_file(dir.path(), &mut manifest, "a.txt", b"alpha");

        let reconciler = Reconciler::new(&store, options(dir.path(), MetadataStrategy::None));
        let stats = reconciler.reconcile(vec![record], &mut manifest, now());

        assert_eq!(stats.uploaded, 1);
        assert_eq!(store.uploads(), vec!["backups/a.txt"]);
    }

    #[test]
    fn test_strategy_basic_skips_same_size() {
        let dir = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        store.insert("backups/same.txt", "12345", now());
        store.insert("backups/diff.txt", "123", now());

        let mut manifest = Manifest::new();
        let changed = vec![
            changed_file(dir.path(), &mut manifest, "same.txt", b"abcde"),
            changed_file(dir.path(), &mut manifest, "diff.txt", b"abcde"),
        ];

        let reconciler = Reconciler::new(&store, options(dir.path(), MetadataStrategy::Basic));
        let stats = reconciler.reconcile(changed, &mut manifest, now());

        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.uploaded, 1);
        assert_eq!(store.uploads(), vec!["backups/diff.txt"]);
        assert!(manifest.get("same.txt").unwrap().uploaded);
        // Basic never writes companions
        assert!(!store.contains("backups/diff.txt.meta"));
    }

    #[test]
    fn test_strategy_full_uses_companion_checksum() {
        let dir = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        let mut manifest = Manifest::new();
        let record = changed_file(dir.path(), &mut manifest, "doc.txt", b"contents");

        let reconciler = Reconciler::new(&store, options(dir.path(), MetadataStrategy::Full));

        // First upload writes the object and its companion
        let stats = reconciler.reconcile(vec![record.clone()], &mut manifest, now());
        assert_eq!(stats.uploaded, 1);
        let mut meta = String::new();
        store
            .get_object("backups/doc.txt.meta")
            .unwrap()
            .read_to_string(&mut meta)
            .unwrap();
        let meta: CompanionMetadata = serde_json::from_str(&meta).unwrap();
        assert_eq!(meta.checksum, record.checksum);
        assert_eq!(meta.size, 8);

        // Same checksum: skipped
        let stats = reconciler.reconcile(vec![record.clone()], &mut manifest, now());
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.uploaded, 0);

        // Different checksum with the same size: uploaded again
        let mut edited = record;
        edited.checksum = "0".repeat(40);
        let stats = reconciler.reconcile(vec![edited], &mut manifest, now());
        assert_eq!(stats.uploaded, 1);
    }

    #[test]
    fn test_strategy_full_without_companion_uploads() {
        let dir = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        store.insert("backups/doc.txt", "contents", now());

        let mut manifest = Manifest::new();
        let record = changed_file(dir.path(), &mut manifest, "doc.txt", b"contents");

        let reconciler = Reconciler::new(&store, options(dir.path(), MetadataStrategy::Full));
        let stats = reconciler.reconcile(vec![record], &mut manifest, now());
        assert_eq!(stats.uploaded, 1);
        assert!(store.contains("backups/doc.txt.meta"));
    }

    #[test]
    fn test_companion_write_failure_keeps_upload() {
        let dir = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        store.fail_upload("backups/doc.txt.meta");

        let mut manifest = Manifest::new();
        let record = changed_file(dir.path(), &mut manifest, "doc.txt", b"contents");

        let reconciler = Reconciler::new(&store, options(dir.path(), MetadataStrategy::Full));
        let stats = reconciler.reconcile(vec![record], &mut manifest, now());

        assert_eq!(stats.uploaded, 1);
        assert_eq!(stats.failed, 0);
        assert!(manifest.get("doc.txt").unwrap().uploaded);
    }

    #[test]
    fn test_deletion_propagation() {
        let dir = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        store.insert("backups/x.txt", "x", now());
        store.insert("backups/x.txt.meta", "{}", now());

        let mut manifest = Manifest::new();
        changed_file(dir.path(), &mut manifest, "x.txt", b"x");
        manifest.mark_uploaded("x.txt");
        fs::remove_file(dir.path().join("x.txt")).unwrap();

        let mut opts = options(dir.path(), MetadataStrategy::Full);
        opts.sync_delete = true;
        let reconciler = Reconciler::new(&store, opts);
        let stats = reconciler.reconcile(Vec::new(), &mut manifest, now());

        assert_eq!(stats.deleted, 1);
        assert!(!store.contains("backups/x.txt"));
        assert!(!store.contains("backups/x.txt.meta"));
        assert!(!manifest.contains("x.txt"));
    }

    #[test]
    fn test_deletion_missing_companion_is_fine() {
        let dir = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        store.insert("backups/x.txt", "x", now());

        let mut manifest = Manifest::new();
        changed_file(dir.path(), &mut manifest, "x.txt", b"x");
        fs::remove_file(dir.path().join("x.txt")).unwrap();

        let mut opts = options(dir.path(), MetadataStrategy::Full);
        opts.sync_delete = true;
        let stats = Reconciler::new(&store, opts).reconcile(Vec::new(), &mut manifest, now());

        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.failed, 0);
        // Only objects returned by the listing are deleted
        assert_eq!(store.delete_calls(), vec!["backups/x.txt"]);
    }

    #[test]
    fn test_deletion_of_excluded_path_is_skipped() {
        let dir = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        store.insert("backups/cache.tmp", "x", now());

        let mut manifest = Manifest::new();
        changed_file(dir.path(), &mut manifest, "cache.tmp", b"x");
        fs::remove_file(dir.path().join("cache.tmp")).unwrap();

        let mut opts = options(dir.path(), MetadataStrategy::Basic);
        opts.sync_delete = true;
        opts.exclude = vec!["*.tmp".to_string()];
        let stats = Reconciler::new(&store, opts).reconcile(Vec::new(), &mut manifest, now());

        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.deleted, 0);
        assert!(store.contains("backups/cache.tmp"));
        assert!(manifest.contains("cache.tmp"));
    }

    #[test]
    fn test_deletion_disabled_keeps_remote() {
        let dir = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        store.insert("backups/x.txt", "x", now());

        let mut manifest = Manifest::new();
        changed_file(dir.path(), &mut manifest, "x.txt", b"x");
        fs::remove_file(dir.path().join("x.txt")).unwrap();

        let stats = Reconciler::new(&store, options(dir.path(), MetadataStrategy::Basic))
            .reconcile(Vec::new(), &mut manifest, now());

        assert_eq!(stats.deleted, 0);
        assert!(store.contains("backups/x.txt"));
        assert!(manifest.contains("x.txt"));
    }

    #[test]
    fn test_deletion_failure_keeps_manifest_entry() {
        let dir = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        store.insert("backups/x.txt", "x", now());
        store.fail_delete("backups/x.txt");

        let mut manifest = Manifest::new();
        changed_file(dir.path(), &mut manifest, "x.txt", b"x");
        fs::remove_file(dir.path().join("x.txt")).unwrap();

        let mut opts = options(dir.path(), MetadataStrategy::Basic);
        opts.sync_delete = true;
        let stats = Reconciler::new(&store, opts).reconcile(Vec::new(), &mut manifest, now());

        assert_eq!(stats.failed, 1);
        assert!(manifest.contains("x.txt"));
    }

    #[test]
    fn test_list_failure_skips_deletions() {
        let dir = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        store.insert("backups/x.txt", "x", now());
        store.fail_list(true);

        let mut manifest = Manifest::new();
        changed_file(dir.path(), &mut manifest, "x.txt", b"x");
        fs::remove_file(dir.path().join("x.txt")).unwrap();

        let mut opts = options(dir.path(), MetadataStrategy::Basic);
        opts.sync_delete = true;
        let stats = Reconciler::new(&store, opts).reconcile(Vec::new(), &mut manifest, now());

        assert_eq!(stats.failed, 1);
        assert!(store.contains("backups/x.txt"));
        assert!(manifest.contains("x.txt"));
    }

    #[test]
    fn test_retention_boundary() {
        let dir = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        let days = 30;
        let window = Duration::days(days);
        store.insert("backups/old.txt", "o", now() - window - Duration::seconds(1));
        store.insert("backups/young.txt", "y", now() - window + Duration::seconds(1));
        store.insert("elsewhere/old.txt", "o", now() - Duration::days(365));

        let mut opts = options(dir.path(), MetadataStrategy::Basic);
        opts.retention_days = days;
        let mut manifest = Manifest::new();
        let stats = Reconciler::new(&store, opts).reconcile(Vec::new(), &mut manifest, now());

        assert_eq!(stats.expired, 1);
        assert!(!store.contains("backups/old.txt"));
        assert!(store.contains("backups/young.txt"));
        // Outside the prefix: untouched
        assert!(store.contains("elsewhere/old.txt"));
    }

    #[test]
    fn test_retention_disabled_for_non_positive_days() {
        let dir = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        store.insert("backups/ancient.txt", "a", now() - Duration::days(3650));

        for days in [0, -5] {
            let mut opts = options(dir.path(), MetadataStrategy::Basic);
            opts.retention_days = days;
            let mut manifest = Manifest::new();
            let stats = Reconciler::new(&store, opts).reconcile(Vec::new(), &mut manifest, now());
            assert_eq!(stats.expired, 0);
        }
        assert!(store.contains("backups/ancient.txt"));
    }

    #[test]
    fn test_retention_delete_failure_continues() {
        let dir = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        let ancient = now() - Duration::days(100);
        store.insert("backups/a.txt", "a", ancient);
        store.insert("backups/b.txt", "b", ancient);
        store.fail_delete("backups/a.txt");

        let mut opts = options(dir.path(), MetadataStrategy::Basic);
        opts.retention_days = 7;
        let mut manifest = Manifest::new();
        let stats = Reconciler::new(&store, opts).reconcile(Vec::new(), &mut manifest, now());

        assert_eq!(stats.expired, 1);
        assert_eq!(stats.failed, 0);
        assert!(store.contains("backups/a.txt"));
        assert!(!store.contains("backups/b.txt"));
    }
}
