//! End-of-run notification.

use tracing::info;

use crate::sync::stats::SyncStats;
use crate::utils::errors::Result;

/// A rendered run summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn for_run(success: bool, stats: &SyncStats) -> Self {
        let subject = if success {
            "Backup Succeeded"
        } else {
            "Backup Failed"
        };

        let body = format!(
            "Backup Summary:\nFiles uploaded: {}\nFiles deleted: {}\nFiles skipped: {}\nFiles failed: {}",
            stats.uploaded, stats.deleted, stats.skipped, stats.failed
        );

        Self {
            subject: subject.to_string(),
            body,
        }
    }
}

/// Receives the outcome of a run.
pub trait Notifier {
    fn notify(&self, success: bool, stats: &SyncStats) -> Result<()>;
}

/// Writes the summary to the log when enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier {
    enabled: bool,
}

impl LogNotifier {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, success: bool, stats: &SyncStats) -> Result<()> {
        if !self.enabled {
            info!("Notification disabled");
            return Ok(());
        }

        let notification = Notification::for_run(success, stats);
        info!("{}\n{}", notification.subject, notification.body);
        Ok(())
    }
}
