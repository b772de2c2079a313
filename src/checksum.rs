// src/checksum.rs

//! SHA-256 helpers
//!
//! The `sha256` a manifest declares is the *payload digest*: a hash over the
//! package name and version, then the files the manifest lists, in manifest
//! order. Name and version each contribute their length and bytes; each entry
//! contributes its path length and path bytes, then its content length and
//! content bytes (lengths as little-endian u64). Relabelling the package or
//! renaming, reordering or editing any listed file changes the digest.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::debug;

/// Hex payload digest of `name`, `version` and `files` (as listed in the manifest) under `root`
pub fn payload_digest(
    root: &Path,
    name: &str,
    version: &str,
    files: &[String],
) -> Result<String> {
    let mut hasher = Sha256::new();
    for field in [name, version] {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }

    for entry in files {
        let path = root.join(entry);
        if !path.is_file() {
            return Err(Error::MissingFile(entry.clone()));
        }

        let mut file = File::open(&path).map_err(|e| {
            Error::IoError(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let size = file.metadata()?.len();

        hasher.update((entry.len() as u64).to_le_bytes());
        hasher.update(entry.as_bytes());
        hasher.update(size.to_le_bytes());
        let copied = io::copy(&mut file, &mut hasher).map_err(|e| {
            Error::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        if copied != size {
            return Err(Error::IoError(format!(
                "{} changed while hashing",
                path.display()
            )));
        }
    }

    let digest = format!("{:x}", hasher.finalize());
    debug!("Payload digest over {} file(s): {}", files.len(), digest);
    Ok(digest)
}

/// Compare hex digests, ignoring case and surrounding whitespace
pub fn digests_match(declared: &str, actual: &str) -> bool {
    declared.trim().eq_ignore_ascii_case(actual.trim())
}
