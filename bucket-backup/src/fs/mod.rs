//! Local filesystem side of the backup: walking, filtering, fingerprinting.

pub mod filter;
pub mod fingerprint;
pub mod metadata;
pub mod walker;

pub use filter::{is_excluded, ExcludeFilter};
pub use fingerprint::fingerprint_file;
pub use metadata::FileStat;
pub use walker::{walk_files, WalkedFile};
