// src/remove.rs

//! Package removal
//!
//! Removal is collect-and-continue: a file that cannot be deleted becomes a
//! warning in the [`RemoveReport`] and the remaining files are still
//! processed. Only a registry failure aborts.

use crate::error::Result;
use crate::fs_utils::{is_backup_name, is_within, prune_empty_dirs, remove_file_if_exists};
use crate::registry::Registry;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Whether anything was removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveStatus {
    NotInstalled,
    Removed,
}

#[derive(Debug, Clone)]
pub struct RemoveReport {
    pub name: String,
    /// Version that was installed, if any
    pub version: Option<String>,
    pub status: RemoveStatus,
    pub removed_files: Vec<PathBuf>,
    pub removed_backups: Vec<PathBuf>,
    pub pruned_dirs: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

impl RemoveReport {
    fn not_installed(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: None,
            status: RemoveStatus::NotInstalled,
            removed_files: Vec::new(),
            removed_backups: Vec::new(),
            pruned_dirs: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Remove package `name` and its files from `install_root`
pub fn remove_package(
    registry: &mut dyn Registry,
    install_root: &Path,
    name: &str,
) -> Result<RemoveReport> {
    let Some(record) = registry.get(name)? else {
        info!("{} is not installed", name);
        return Ok(RemoveReport::not_installed(name));
    };

    info!("Removing {} {}", name, record.version);

    let mut report = RemoveReport {
        version: Some(record.version.clone()),
        status: RemoveStatus::Removed,
        ..RemoveReport::not_installed(name)
    };
    let mut touched_dirs = BTreeSet::new();
    let backup_bases: BTreeSet<String> = record
        .files
        .iter()
        .filter_map(|f| Path::new(f).file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();

    for file in record.files.iter().map(PathBuf::from) {
        if !is_within(&file, install_root) {
            report.warn(format!(
                "Skipping {}: outside installation root {}",
                file.display(),
                install_root.display()
            ));
            continue;
        }

        match remove_file_if_exists(&file) {
            Ok(true) => {
                debug!("Removed {}", file.display());
                report.removed_files.push(file.clone());
            }
            Ok(false) => debug!("{} already gone", file.display()),
            Err(e) => report.warn(format!("Failed to remove {}: {}", file.display(), e)),
        }
        if let Some(parent) = file.parent() {
            touched_dirs.insert(parent.to_path_buf());
        }
    }

    let mut stray = Vec::new();
    collect_backups(install_root, &backup_bases, &mut stray, &mut report);
    for backup in stray {
        match fs::remove_file(&backup) {
            Ok(()) => {
                debug!("Removed stray backup {}", backup.display());
                if let Some(parent) = backup.parent() {
                    touched_dirs.insert(parent.to_path_buf());
                }
                report.removed_backups.push(backup);
            }
            Err(e) => report.warn(format!(
                "Failed to remove backup {}: {}",
                backup.display(),
                e
            )),
        }
    }

    // deepest first so parents see their children gone
    for dir in touched_dirs.iter().rev() {
        report.pruned_dirs.extend(prune_empty_dirs(dir, install_root));
    }

    registry.delete(name)?;

    info!(
        "Removed {} ({} file(s), {} backup(s))",
        name,
        report.removed_files.len(),
        report.removed_backups.len()
    );
    Ok(report)
}

/// Find backups of any file named in `bases` anywhere below `dir`
///
/// Symlinks are not followed; unreadable entries become warnings.
fn collect_backups(
    dir: &Path,
    bases: &BTreeSet<String>,
    found: &mut Vec<PathBuf>,
    report: &mut RemoveReport,
) {
    for entry in WalkDir::new(dir).follow_links(false).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                report.warn(format!("Failed to scan {}: {}", dir.display(), e));
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }

        let is_backup = {
            let file_name = entry.file_name().to_string_lossy();
            bases.iter().any(|base| is_backup_name(&file_name, base))
        };
        if is_backup {
            found.push(entry.into_path());
        }
    }
}
