// src/archive/mod.rs

//! Package archive opening
//!
//! A package is a gzip-compressed tarball holding exactly one top-level
//! directory (the package root) with `manifest.json` directly inside it.
//! Opening extracts the tarball into a fresh scratch directory that lives as
//! long as the returned [`OpenedArchive`].

pub mod manifest;

pub use manifest::{MANIFEST_FILE, Manifest, ManifestEntry, PAYLOAD_DIR, ValidManifest};

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tar::Archive;
use tempfile::TempDir;
use tracing::debug;

/// Prefix for scratch directory names
const SCRATCH_PREFIX: &str = "parcel-";

/// An extracted package and its parsed manifest
///
/// Dropping it removes the scratch directory.
#[derive(Debug)]
pub struct OpenedArchive {
    scratch: TempDir,
    root: PathBuf,
    manifest: Manifest,
}

impl OpenedArchive {
    /// The package root inside the scratch directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Remove the scratch directory now, reporting any failure
    pub fn close(self) -> Result<()> {
        let path = self.scratch.path().to_path_buf();
        self.scratch.close().map_err(|e| {
            Error::IoError(format!(
                "Failed to remove scratch directory {}: {}",
                path.display(),
                e
            ))
        })
    }
}

/// Extract `archive_path` under `staging_dir` and read its manifest
pub fn open_archive(archive_path: &Path, staging_dir: &Path) -> Result<OpenedArchive> {
    debug!("Opening package archive: {}", archive_path.display());

    let file = File::open(archive_path).map_err(|e| {
        Error::IoError(format!(
            "Failed to open archive {}: {}",
            archive_path.display(),
            e
        ))
    })?;

    fs::create_dir_all(staging_dir).map_err(|e| {
        Error::IoError(format!(
            "Failed to create staging directory {}: {}",
            staging_dir.display(),
            e
        ))
    })?;

    let scratch = tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempdir_in(staging_dir)
        .map_err(|e| {
            Error::IoError(format!(
                "Failed to create scratch directory in {}: {}",
                staging_dir.display(),
                e
            ))
        })?;

    let mut archive = Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);
    archive.set_preserve_mtime(true);
    archive.unpack(scratch.path()).map_err(|e| {
        Error::Malformed(format!(
            "Failed to extract {}: {}",
            archive_path.display(),
            e
        ))
    })?;

    let root = package_root(scratch.path())?;

    let manifest_path = root.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        // scratch is dropped (and removed) on return
        return Err(Error::Malformed(format!(
            "{} missing from {}",
            MANIFEST_FILE,
            archive_path.display()
        )));
    }

    let raw = fs::read_to_string(&manifest_path).map_err(|e| {
        Error::Malformed(format!("Failed to read {}: {}", manifest_path.display(), e))
    })?;
    let manifest = Manifest::from_json_str(&raw)?;

    debug!(
        "Extracted {} into {}",
        archive_path.display(),
        scratch.path().display()
    );

    Ok(OpenedArchive {
        scratch,
        root,
        manifest,
    })
}

/// The single top-level directory of an extracted package
fn package_root(scratch: &Path) -> Result<PathBuf> {
    let mut entries = fs::read_dir(scratch)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();

    match entries.as_slice() {
        [] => Err(Error::Malformed("empty package".to_string())),
        [root] if root.is_dir() => Ok(root.clone()),
        [root] => Err(Error::Malformed(format!(
            "package root {} is not a directory",
            root.file_name().unwrap_or_default().to_string_lossy()
        ))),
        many => Err(Error::Malformed(format!(
            "expected a single top-level directory, found {} entries",
            many.len()
        ))),
    }
}
