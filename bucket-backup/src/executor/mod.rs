//! Backup run orchestration.
//!
//! One run is strictly sequential:
//! - load the manifest (falling back to its backup copy)
//! - detect changes against the source tree
//! - reconcile with the bucket: uploads, deletions, retention
//! - persist the manifest
//! - notify and report

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::fs::filter::ExcludeFilter;
use crate::manifest::{Manifest, ManifestStore};
use crate::notify::Notifier;
use crate::storage::ObjectStore;
use crate::sync::detector::detect_changes_with_filter;
use crate::sync::reconciler::{ReconcileOptions, Reconciler};
use crate::sync::stats::SyncStats;
use crate::transfer::progress::{format_bytes, format_duration, format_speed};
use crate::utils::errors::{BackupError, Result};

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub stats: SyncStats,
    pub changed_files: usize,
    pub duration: Duration,
    /// False when the manifest could not be persisted; the next run then
    /// rebuilds its state from the previous manifest and the filesystem
    pub manifest_saved: bool,
}

impl RunReport {
    /// A run succeeds when no upload, delete or listing failed.
    pub fn success(&self) -> bool {
        self.stats.is_success()
    }

    /// Average upload throughput over the whole run, in bytes per second
    pub fn average_speed(&self) -> u64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            (self.stats.bytes_uploaded as f64 / secs) as u64
        } else {
            0
        }
    }
}

/// A single backup run over one configuration
pub struct BackupRun<'a, S: ObjectStore + ?Sized, N: Notifier + ?Sized> {
    config: &'a Config,
    store: &'a S,
    notifier: &'a N,
    manifest_store: ManifestStore,
}

impl<'a, S: ObjectStore + ?Sized, N: Notifier + ?Sized> BackupRun<'a, S, N> {
    pub fn new(config: &'a Config, store: &'a S, notifier: &'a N) -> Self {
        Self {
            config,
            store,
            notifier,
            manifest_store: ManifestStore::new(&config.sync.state_path),
        }
    }

    pub fn manifest_store(&self) -> &ManifestStore {
        &self.manifest_store
    }

    /// Execute the run against the wall clock
    pub fn execute(&self) -> Result<RunReport> {
        self.execute_at(Utc::now())
    }

    /// Execute the run, using `now` as the retention reference and the
    /// recorded completion time.
    ///
    /// # Errors
    /// Only fatal conditions are returned: an unreadable manifest with no
    /// usable backup, or a source root that cannot be walked. Everything
    /// else is counted in the report.
    pub fn execute_at(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let start_time = Instant::now();

        info!(
            "Starting backup of {} to {} store under '{}' (duplicate check: {}, sync delete: {}, retention: {} days)",
            self.config.source.dir.display(),
            self.store.backend_name(),
            self.config.storage.prefix,
            self.config.sync.metadata_strategy,
            self.config.sync.sync_delete,
            self.config.sync.retention_days
        );

        let mut manifest = self.load_manifest()?;
        match manifest.last_run() {
            Some(last) => info!("Loaded manifest: {} records, last run {}", manifest.len(), last),
            None => info!("Loaded manifest: {} records, never run", manifest.len()),
        }

        let filter = ExcludeFilter::new(&self.config.source.exclude);
        let changed = match detect_changes_with_filter(&self.config.source.dir, &mut manifest, &filter) {
            Ok((changed, _)) => changed,
            Err(e) => {
                error!("Change detection failed: {}", e);
                self.send_notification(false, &SyncStats::default());
                return Err(e);
            }
        };
        let changed_files = changed.len();

        let reconciler = Reconciler::new(self.store, ReconcileOptions::from_config(self.config));
        let stats = reconciler.reconcile(changed, &mut manifest, now);

        manifest.set_last_run(now);
        let pending = manifest.settle_pending();
        if pending > 0 {
            warn!("{} files not uploaded, they will be retried next run", pending);
        }
        let manifest_saved = self.persist(&manifest);

        let report = RunReport {
            stats,
            changed_files,
            duration: start_time.elapsed(),
            manifest_saved,
        };

        self.send_notification(report.success(), &report.stats);
        log_summary(&report);

        Ok(report)
    }

    fn load_manifest(&self) -> Result<Manifest> {
        match self.manifest_store.load() {
            Ok(manifest) => Ok(manifest),
            Err(BackupError::Manifest(reason)) => {
                warn!("Manifest unreadable ({}), trying backup copy", reason);
                self.manifest_store.load_backup()
            }
            Err(e) => Err(e),
        }
    }

    /// Back up the previous manifest, then save the new one. On a failed
    /// save the backup is put back in place.
    fn persist(&self, manifest: &Manifest) -> bool {
        if let Err(e) = self.manifest_store.backup() {
            warn!("Could not back up manifest: {}", e);
        }

        match self.manifest_store.save(manifest) {
            Ok(()) => {
                info!(
                    "Manifest saved to {} ({} records)",
                    self.manifest_store.path().display(),
                    manifest.len()
                );
                true
            }
            Err(e) => {
                error!("Failed to save manifest: {}", e);
                if let Err(e) = self.manifest_store.restore() {
                    error!("Failed to restore manifest backup: {}", e);
                }
                false
            }
        }
    }

    fn send_notification(&self, success: bool, stats: &SyncStats) {
        if let Err(e) = self.notifier.notify(success, stats) {
            warn!("Failed to send notification: {}", e);
        }
    }
}

fn log_summary(report: &RunReport) {
    let stats = &report.stats;
    info!(
        "Backup {} in {}: {} changed, {} uploaded ({}, {}), {} deleted, {} skipped, {} failed, {} expired",
        if report.success() { "completed" } else { "completed with failures" },
        format_duration(report.duration.as_secs()),
        report.changed_files,
        stats.uploaded,
        format_bytes(stats.bytes_uploaded),
        format_speed(report.average_speed()),
        stats.deleted,
        stats.skipped,
        stats.failed,
        stats.expired
    );
}
