//! Bucket Backup Library
//!
//! One-shot incremental backup of a directory tree to an object-storage
//! bucket, driven by a locally persisted manifest.

pub mod config;
pub mod executor;
pub mod fs;
pub mod manifest;
pub mod notify;
pub mod storage;
pub mod sync;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use executor::{BackupRun, RunReport};
pub use utils::errors::{BackupError, Result};
