//! Content hashing for backup integrity checks

use crate::Result;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// SHA-256 of a buffer, hex-encoded
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Streaming SHA-256 of a file, hex-encoded
///
/// Checksums are always taken over the final on-disk artifact, after any
/// compression and encryption stages have run.
pub fn checksum_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256 of the empty string
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_file_checksum_matches_buffer_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.bin");
        let content = vec![0x5Au8; 20_000];
        std::fs::write(&path, &content).unwrap();

        assert_eq!(checksum_file(&path).unwrap(), sha256_hex(&content));
    }

    #[test]
    fn test_checksum_detects_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.bin");
        std::fs::write(&path, b"original").unwrap();
        let before = checksum_file(&path).unwrap();

        std::fs::write(&path, b"tampered").unwrap();
        assert_ne!(before, checksum_file(&path).unwrap());
    }
}
