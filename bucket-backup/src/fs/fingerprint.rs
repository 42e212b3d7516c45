//! Content fingerprints used as the equality oracle for change detection.
//!
//! A fingerprint is the SHA-1 digest of the file's bytes, hex encoded
//! (40 characters). It is only compared against earlier fingerprints of the
//! same path, never used to authenticate content.

use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Length of a hex-encoded fingerprint.
pub const FINGERPRINT_HEX_LEN: usize = 40;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Stream the file once through SHA-1 and return the hex digest.
///
/// # Errors
/// Returns the I/O error if the file cannot be opened or a read fails midway.
pub fn fingerprint_file(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    fingerprint_reader(file)
}

/// Fingerprint everything readable from `reader`.
pub fn fingerprint_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha1::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_known_digest() -> io::Result<()> {
        let digest = fingerprint_reader(&b"abc"[..])?;
        assert_eq!(digest, "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(digest.len(), FINGERPRINT_HEX_LEN);
        Ok(())
    }

    #[test]
    fn test_empty_input() -> io::Result<()> {
        assert_eq!(
            fingerprint_reader(io::empty())?,
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
        Ok(())
    }

    #[test]
    fn test_file_larger_than_buffer() -> io::Result<()> {
        let data = vec![7u8; READ_BUFFER_SIZE * 3 + 11];
        let mut temp_file = NamedTempFile::new()?;
        temp_file.write_all(&data)?;
        temp_file.flush()?;

        assert_eq!(fingerprint_file(temp_file.path())?, fingerprint_reader(&data[..])?);
        Ok(())
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = fingerprint_file(&dir.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
