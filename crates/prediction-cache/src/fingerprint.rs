//! Content fingerprints used as cache keys

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

/// SHA-256 of the file contents, truncated to 16 bytes and hex encoded.
/// Renaming or touching a file keeps its fingerprint; editing its pixels does not.
pub fn fingerprint_file(path: &Path) -> Result<String> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open image for fingerprinting: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)
        .with_context(|| format!("Failed to read image: {}", path.display()))?;

    Ok(hex::encode(&hasher.finalize()[..16]))
}

/// Fingerprint of an in-memory image buffer
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_fingerprint_stable_and_content_based() -> Result<()> {
        let dir = tempdir()?;
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("renamed.jpg");
        fs::write(&a, b"same pixels")?;
        fs::write(&b, b"same pixels")?;

        let fa = fingerprint_file(&a)?;
        assert_eq!(fa.len(), 32);
        assert_eq!(fa, fingerprint_file(&a)?);
        assert_eq!(fa, fingerprint_file(&b)?);
        assert_eq!(fa, fingerprint_bytes(b"same pixels"));

        fs::write(&b, b"edited pixels")?;
        assert_ne!(fa, fingerprint_file(&b)?);
        Ok(())
    }

    #[test]
    fn test_missing_file_errors() {
        let dir = tempdir().unwrap();
        assert!(fingerprint_file(&dir.path().join("missing.jpg")).is_err());
    }
}
