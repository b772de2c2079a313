// src/verify.rs

//! Cached archive verification

use crate::archive::manifest::{Manifest, destination_for};
use crate::archive::open_archive;
use crate::checksum::{digests_match, payload_digest};
use crate::error::{Error, Result};
use crate::fetch::{archive_file_name, validate_package_id};
use crate::layout::Layout;
use std::path::Path;
use tracing::{debug, info, warn};

/// Result of comparing the declared payload digest with the archive contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumVerdict {
    Match { declared: String, actual: String },
    Mismatch { declared: String, actual: String },
    /// Manifest declares no `sha256`; nothing to compare
    NotDeclared,
}

impl ChecksumVerdict {
    /// Only a mismatch fails verification
    pub fn passed(&self) -> bool {
        !matches!(self, ChecksumVerdict::Mismatch { .. })
    }
}

#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub package_id: String,
    pub name: Option<String>,
    pub version: Option<String>,
    pub verdict: ChecksumVerdict,
}

/// Verify the cached archive for `package_id` without fetching it
pub fn verify_package(layout: &Layout, package_id: &str) -> Result<VerifyReport> {
    validate_package_id(package_id)?;

    let archive_path = layout.store_dir().join(archive_file_name(package_id));
    if !archive_path.is_file() {
        return Err(Error::NotFound(format!(
            "{} is not in the cache ({})",
            package_id,
            archive_path.display()
        )));
    }

    let opened = open_archive(&archive_path, &layout.staging_dir())?;
    let manifest = opened.manifest().clone();

    let verdict = match manifest.declared_sha256() {
        None => ChecksumVerdict::NotDeclared,
        Some(declared) => {
            let actual = match archive_digest(opened.root(), &manifest) {
                Ok(actual) => actual,
                Err(e) => {
                    warn!("{}: payload cannot be hashed: {}", package_id, e);
                    format!("unverifiable ({})", e)
                }
            };
            if digests_match(declared, &actual) {
                ChecksumVerdict::Match {
                    declared: declared.to_string(),
                    actual,
                }
            } else {
                ChecksumVerdict::Mismatch {
                    declared: declared.to_string(),
                    actual,
                }
            }
        }
    };

    if let Err(e) = opened.close() {
        warn!("{}", e);
    }

    match &verdict {
        ChecksumVerdict::Mismatch { .. } => warn!("{} failed verification", package_id),
        ChecksumVerdict::Match { .. } => info!("{} verified", package_id),
        ChecksumVerdict::NotDeclared => debug!("{} declares no checksum", package_id),
    }

    Ok(VerifyReport {
        package_id: package_id.to_string(),
        name: manifest.name().map(str::to_string),
        version: manifest.version().map(str::to_string),
        verdict,
    })
}

/// Payload digest of an opened archive; entries must stay inside `root`
fn archive_digest(root: &Path, manifest: &Manifest) -> Result<String> {
    let files = manifest.file_list()?;
    for entry in &files {
        destination_for(entry)?;
    }
    payload_digest(
        root,
        manifest.name().unwrap_or_default(),
        manifest.version().unwrap_or_default(),
        &files,
    )
}
