//! Content-hash change detection.
//!
//! Digests are SHA-256 over the raw file bytes, rendered as lowercase hex. Modification
//! times are never consulted: a fresh clone resets them without changing content.

use sha2::{Digest, Sha256};
use std::path::Path;

#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn hash_file(path: impl AsRef<Path>) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hash_bytes(&bytes))
}

/// True unless the file is readable and hashes to `stored`.
///
/// A vanished file also reports true; callers check existence separately to tell a
/// deletion from a modification.
#[must_use]
pub fn needs_reindex(path: impl AsRef<Path>, stored: Option<&str>) -> bool {
    let Some(stored) = stored else {
        return true;
    };
    match hash_file(path.as_ref()) {
        Ok(current) => current != stored,
        Err(e) => {
            log::debug!("Cannot hash {}: {e}", path.as_ref().display());
            true
        }
    }
}
