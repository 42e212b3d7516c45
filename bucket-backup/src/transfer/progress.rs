//! Upload throughput tracking and human-readable formatting.

use std::time::{Duration, Instant};

/// Running totals for the upload phase of a run
#[derive(Debug, Clone)]
pub struct TransferTally {
    start_time: Instant,

    /// Files to transfer in this phase
    pub total_files: usize,

    /// Files attempted so far (successful or not)
    pub files_processed: usize,

    /// Bytes successfully transferred
    pub transferred_bytes: u64,
}

impl TransferTally {
    /// Start a tally for `total_files` transfers
    pub fn new(total_files: usize) -> Self {
        Self {
            start_time: Instant::now(),
            total_files,
            files_processed: 0,
            transferred_bytes: 0,
        }
    }

    /// Record one finished transfer of `bytes` bytes
    pub fn record_success(&mut self, bytes: u64) {
        self.files_processed += 1;
        self.transferred_bytes += bytes;
    }

    /// Record one attempted transfer that moved no bytes
    pub fn record_attempt(&mut self) {
        self.files_processed += 1;
    }

    /// Position label for log lines, e.g. `[3/10]`
    pub fn position(&self) -> String {
        format!("[{}/{}]", self.files_processed + 1, self.total_files)
    }

    /// Get total elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get average speed since start
    pub fn average_speed(&self) -> u64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            (self.transferred_bytes as f64 / elapsed) as u64
        } else {
            0
        }
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format speed as human-readable string
pub fn format_speed(bytes_per_second: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_second))
}

/// Format duration as human-readable string
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
