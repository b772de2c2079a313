// src/install.rs

//! Transactional package installation
//!
//! An install fetches the archive, extracts it into a scratch directory,
//! validates the manifest and then applies each listed file to the
//! installation root. Pre-existing files are moved aside first. If anything
//! fails after the first file is touched (including the registry write) the
//! transaction is rolled back: installed files are deleted, backups are put
//! back and directories the transaction created are removed again.

use crate::archive::{ManifestEntry, OpenedArchive, ValidManifest, open_archive};
use crate::checksum::{digests_match, payload_digest};
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::fs_utils::{
    backup_path_for, copy_preserving, is_within, path_exists, prune_empty_dirs,
    remove_file_if_exists,
};
use crate::layout::Layout;
use crate::registry::{InstallRecord, Registry, owner_of};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of the payload checksum check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumStatus {
    /// Manifest declared a digest and the payload matched it
    Verified,
    /// Manifest declared no digest
    NotDeclared,
}

/// Summary of a committed install
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub name: String,
    pub version: String,
    /// Cached archive the package came from
    pub archive: PathBuf,
    /// Installed files, in manifest order
    pub files: Vec<PathBuf>,
    /// Version recorded before this install, if the package was already installed
    pub replaced_version: Option<String>,
    pub checksum: ChecksumStatus,
    /// Non-fatal problems met after commit
    pub warnings: Vec<String>,
}

/// Install `package_id` (`name-version`) into the layout's installation root
pub fn install_package(
    fetcher: &Fetcher,
    registry: &mut dyn Registry,
    layout: &Layout,
    package_id: &str,
) -> Result<InstallReport> {
    info!("Installing {}", package_id);

    let archive_path = fetcher.fetch(package_id)?;
    let opened = open_archive(&archive_path, &layout.staging_dir())?;
    let manifest = opened.manifest().validate()?;

    if format!("{}-{}", manifest.name, manifest.version) != package_id {
        debug!(
            "Manifest identifies {} {} for archive {}",
            manifest.name, manifest.version, package_id
        );
    }

    let checksum = check_payload(&opened, &manifest)?;

    let install_root = layout.install_root();
    fs::create_dir_all(install_root).map_err(|e| {
        Error::IoError(format!(
            "Failed to create installation root {}: {}",
            install_root.display(),
            e
        ))
    })?;

    let destinations: Vec<PathBuf> = manifest
        .entries
        .iter()
        .map(|entry| install_root.join(&entry.destination))
        .collect();
    check_conflicts(&*registry, &manifest.name, &destinations)?;
    check_destinations(install_root, &destinations)?;

    let previous = registry.get(&manifest.name)?;

    let mut transaction = Transaction::new(install_root);
    if let Err(e) = transaction.apply_all(opened.root(), &manifest.entries, &destinations) {
        warn!("Install of {} failed, rolling back: {}", package_id, e);
        transaction.rollback();
        return Err(e);
    }

    let record = InstallRecord::new(&manifest.version, &archive_path, &destinations);
    if let Err(e) = registry.set(&manifest.name, record) {
        warn!("Registry update for {} failed, rolling back: {}", manifest.name, e);
        transaction.rollback();
        return Err(e);
    }

    let mut warnings = transaction.commit();

    if let Some(previous) = &previous {
        warnings.extend(prune_stale_files(
            &*registry,
            &manifest.name,
            previous,
            &destinations,
            install_root,
        )?);
    }

    if let Err(e) = opened.close() {
        warn!("{}", e);
        warnings.push(e.to_string());
    }

    info!(
        "Installed {} {} ({} file(s))",
        manifest.name,
        manifest.version,
        destinations.len()
    );

    Ok(InstallReport {
        name: manifest.name,
        version: manifest.version,
        archive: archive_path,
        files: destinations,
        replaced_version: previous.map(|record| record.version),
        checksum,
        warnings,
    })
}

/// Compare the declared payload digest against the extracted files
fn check_payload(opened: &OpenedArchive, manifest: &ValidManifest) -> Result<ChecksumStatus> {
    let Some(declared) = manifest.sha256.as_deref() else {
        warn!(
            "{} {} declares no sha256, installing unverified",
            manifest.name, manifest.version
        );
        return Ok(ChecksumStatus::NotDeclared);
    };

    let actual = payload_digest(
        opened.root(),
        &manifest.name,
        &manifest.version,
        &manifest.sources(),
    )?;

    if !digests_match(declared, &actual) {
        return Err(Error::ChecksumMismatch {
            expected: declared.to_string(),
            actual,
        });
    }

    debug!("Payload digest verified for {}", manifest.name);
    Ok(ChecksumStatus::Verified)
}

/// Refuse destinations already owned by another package
fn check_conflicts(registry: &dyn Registry, name: &str, destinations: &[PathBuf]) -> Result<()> {
    let others = registry.list()?;
    for destination in destinations {
        if let Some((owner, _)) = others
            .iter()
            .find(|(other, record)| other != name && record.owns(destination))
        {
            return Err(Error::Conflict(format!(
                "{} is owned by installed package {}",
                destination.display(),
                owner
            )));
        }
    }
    Ok(())
}

/// Refuse destinations that exist as directories or sit below an existing non-directory
fn check_destinations(install_root: &Path, destinations: &[PathBuf]) -> Result<()> {
    for destination in destinations {
        if fs::symlink_metadata(destination).is_ok_and(|meta| meta.is_dir()) {
            return Err(Error::Conflict(format!(
                "{} exists as a directory",
                destination.display()
            )));
        }

        let blocked = destination
            .ancestors()
            .skip(1)
            .take_while(|ancestor| *ancestor != install_root)
            .find(|ancestor| path_exists(ancestor) && !ancestor.is_dir());
        if let Some(ancestor) = blocked {
            return Err(Error::Conflict(format!(
                "{} needs {} to be a directory",
                destination.display(),
                ancestor.display()
            )));
        }
    }
    Ok(())
}

/// Remove files the previous version installed that the new one no longer ships
fn prune_stale_files(
    registry: &dyn Registry,
    name: &str,
    previous: &InstallRecord,
    current: &[PathBuf],
    install_root: &Path,
) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    for stale in previous
        .files
        .iter()
        .map(PathBuf::from)
        .filter(|path| !current.contains(path))
    {
        if !is_within(&stale, install_root) {
            let message = format!(
                "Not removing stale file {} outside {}",
                stale.display(),
                install_root.display()
            );
            warn!("{}", message);
            warnings.push(message);
            continue;
        }
        if let Some(owner) = owner_of(registry, &stale, name)? {
            debug!("Keeping {} (now owned by {})", stale.display(), owner);
            continue;
        }

        match remove_file_if_exists(&stale) {
            Ok(_) => {
                debug!("Removed stale file {}", stale.display());
                if let Some(parent) = stale.parent() {
                    prune_empty_dirs(parent, install_root);
                }
            }
            Err(e) => {
                let message = format!("Failed to remove stale file {}: {}", stale.display(), e);
                warn!("{}", message);
                warnings.push(message);
            }
        }
    }

    Ok(warnings)
}

/// Filesystem changes made by one install, in the order they were made
struct Transaction<'a> {
    install_root: &'a Path,
    created_dirs: Vec<PathBuf>,
    /// (backup, original)
    backups: Vec<(PathBuf, PathBuf)>,
    installed: Vec<PathBuf>,
}

impl<'a> Transaction<'a> {
    fn new(install_root: &'a Path) -> Self {
        Self {
            install_root,
            created_dirs: Vec::new(),
            backups: Vec::new(),
            installed: Vec::new(),
        }
    }

    fn apply_all(
        &mut self,
        package_root: &Path,
        entries: &[ManifestEntry],
        destinations: &[PathBuf],
    ) -> Result<()> {
        for destination in destinations {
            if let Some(parent) = destination.parent() {
                self.create_dirs(parent)?;
            }
        }

        for (entry, destination) in entries.iter().zip(destinations) {
            self.apply(package_root, entry, destination)?;
        }
        Ok(())
    }

    /// Create `dir` and any missing ancestors below the installation root
    fn create_dirs(&mut self, dir: &Path) -> Result<()> {
        let mut missing: Vec<&Path> = dir
            .ancestors()
            .take_while(|ancestor| *ancestor != self.install_root && !path_exists(ancestor))
            .collect();
        missing.reverse();

        for dir in missing {
            fs::create_dir(dir).map_err(|e| {
                Error::IoError(format!("Failed to create directory {}: {}", dir.display(), e))
            })?;
            debug!("Created directory {}", dir.display());
            self.created_dirs.push(dir.to_path_buf());
        }
        Ok(())
    }

    fn apply(&mut self, package_root: &Path, entry: &ManifestEntry, destination: &Path) -> Result<()> {
        let source = package_root.join(&entry.source);
        if !source.is_file() {
            return Err(Error::MissingFile(entry.source.clone()));
        }

        if path_exists(destination) {
            let backup = backup_path_for(destination);
            fs::rename(destination, &backup).map_err(|e| {
                Error::IoError(format!(
                    "Failed to back up {} to {}: {}",
                    destination.display(),
                    backup.display(),
                    e
                ))
            })?;
            debug!("Backed up {} to {}", destination.display(), backup.display());
            self.backups.push((backup, destination.to_path_buf()));
        }

        // recorded before copying so a partial copy is removed on rollback
        self.installed.push(destination.to_path_buf());
        copy_preserving(&source, destination).map_err(|e| {
            Error::IoError(format!(
                "Failed to install {} to {}: {}",
                entry.source,
                destination.display(),
                e
            ))
        })?;
        debug!("Installed {}", destination.display());
        Ok(())
    }

    /// Discard backups; failures are returned as warnings
    fn commit(self) -> Vec<String> {
        let mut warnings = Vec::new();
        for (backup, _) in &self.backups {
            if let Err(e) = remove_file_if_exists(backup) {
                let message = format!("Failed to remove backup {}: {}", backup.display(), e);
                warn!("{}", message);
                warnings.push(message);
            }
        }
        warnings
    }

    /// Undo every change, best-effort
    fn rollback(self) {
        for path in self.installed.iter().rev() {
            if let Err(e) = remove_file_if_exists(path) {
                warn!("Rollback: failed to remove {}: {}", path.display(), e);
            }
        }

        for (backup, original) in self.backups.iter().rev() {
            if let Err(e) = remove_file_if_exists(original) {
                warn!("Rollback: failed to clear {}: {}", original.display(), e);
            }
            match fs::rename(backup, original) {
                Ok(()) => debug!("Restored {}", original.display()),
                Err(e) => warn!(
                    "Rollback: failed to restore {} from {}: {}",
                    original.display(),
                    backup.display(),
                    e
                ),
            }
        }

        for dir in self.created_dirs.iter().rev() {
            if fs::remove_dir(dir).is_err() {
                debug!("Rollback: leaving non-empty directory {}", dir.display());
            }
        }
    }
}
