use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CleaningError, Result};

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Rejects anything that is not a lowercase hex sha256 digest.
pub fn check_digest(hex: &str) -> Result<()> {
    let well_formed = hex.len() == 64 && hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
    if !well_formed {
        return Err(CleaningError::DigestMismatch {
            file: "content address".to_string(),
            expected: "64 lowercase hex characters".to_string(),
            actual: hex.to_string(),
        });
    }
    Ok(())
}

/// Relative object key for a digest: `sha256/ab/cd/abcd...`
pub fn cas_key(hex: &str) -> Result<String> {
    check_digest(hex)?;
    Ok(format!("sha256/{}/{}/{}", &hex[0..2], &hex[2..4], hex))
}

pub fn cas_path(root: &Path, hex: &str) -> Result<PathBuf> {
    check_digest(hex)?;
    Ok(root.join("sha256").join(&hex[0..2]).join(&hex[2..4]).join(hex))
}

/// Writes `bytes` under its digest below `root` and returns the hex digest.
/// Identical content is stored once.
pub fn write_cas(root: &Path, bytes: &[u8]) -> Result<String> {
    let hex = sha256_hex(bytes);
    let path = cas_path(root, &hex)?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    if !path.exists() {
        fs::write(&path, bytes)?;
    }
    Ok(hex)
}

/// Checks fetched content against the digest it was stored under.
pub fn verify(file: &str, bytes: &[u8], expected: &str) -> Result<()> {
    let actual = sha256_hex(bytes);
    if actual != expected {
        return Err(CleaningError::DigestMismatch {
            file: file.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}
