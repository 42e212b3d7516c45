//! Companion metadata objects.
//!
//! Under the `full` duplicate-avoidance strategy every uploaded object gets a
//! small JSON sibling at `<key>.meta` recording the checksum it was uploaded
//! with, so later runs can skip re-uploading identical content.

use serde::{Deserialize, Serialize};
use std::io::Read;

/// Suffix appended to an object key to name its companion.
pub const COMPANION_SUFFIX: &str = ".meta";

/// Format version written into new companion records.
pub const COMPANION_VERSION: &str = "1.0";

/// Key of the companion object for `remote_path`.
pub fn companion_path(remote_path: &str) -> String {
    format!("{remote_path}{COMPANION_SUFFIX}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionMetadata {
    pub checksum: String,
    pub size: u64,
    pub version: String,
}

impl CompanionMetadata {
    pub fn new(checksum: impl Into<String>, size: u64) -> Self {
        Self {
            checksum: checksum.into(),
            size,
            version: COMPANION_VERSION.to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_reader<R: Read>(reader: R) -> serde_json::Result<Self> {
        serde_json::from_reader(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_companion_path() {
        assert_eq!(companion_path("backups/a/b.txt"), "backups/a/b.txt.meta");
    }

    #[test]
    fn test_wire_format() {
        let meta = CompanionMetadata::new("deadbeef", 12);
        let json: serde_json::Value = serde_json::from_slice(&meta.to_json().unwrap()).unwrap();

        assert_eq!(json["checksum"], "deadbeef");
        assert_eq!(json["size"], 12);
        assert_eq!(json["version"], "1.0");
    }

    #[test]
    fn test_reads_records_from_older_writers() {
        let raw = br#"{"checksum":"abc","size":5,"version":"1.0","extra":true}"#;
        let meta = CompanionMetadata::from_reader(&raw[..]).unwrap();
        assert_eq!(meta.checksum, "abc");
        assert_eq!(meta.size, 5);
    }
}
