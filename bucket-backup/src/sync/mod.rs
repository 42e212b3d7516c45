//! Change detection and remote reconciliation.

pub mod detector;
pub mod reconciler;
pub mod stats;

pub use detector::{detect_changes, detect_changes_with_filter, DetectionSummary};
pub use reconciler::{ReconcileOptions, Reconciler, RemoteIndex};
pub use stats::SyncStats;
