//! Run counters.

use serde::Serialize;

/// Per-run outcome counters.
///
/// `uploaded`, `deleted`, `skipped` and `failed` make up the run summary;
/// `expired` and `bytes_uploaded` are informational.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Files transferred to the bucket
    pub uploaded: usize,

    /// Remote objects removed because their file was deleted locally
    pub deleted: usize,

    /// Files not transferred because the remote copy was already current,
    /// plus local deletions left alone because the path is excluded
    pub skipped: usize,

    /// Upload, delete or listing failures
    pub failed: usize,

    /// Remote objects removed by the retention sweep
    pub expired: usize,

    /// Bytes transferred for uploaded files
    pub bytes_uploaded: u64,
}

impl SyncStats {
    /// True when nothing failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}
