// src/fs_utils.rs

//! Filesystem helpers shared by install and remove

use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Suffix appended to a file moved aside during install
pub const BACKUP_SUFFIX: &str = ".parcel.bak";

/// Whether something (including a dangling symlink) exists at `path`
pub fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// First free backup path for `path`: `<path>.parcel.bak`, then `…bak1`, `…bak2`, …
pub fn backup_path_for(path: &Path) -> PathBuf {
    let mut n = 0u32;
    loop {
        let mut name = OsString::from(path.as_os_str());
        name.push(BACKUP_SUFFIX);
        if n > 0 {
            name.push(n.to_string());
        }
        let candidate = PathBuf::from(name);
        if !path_exists(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Whether `file_name` is a backup of a file called `base`
pub fn is_backup_name(file_name: &str, base: &str) -> bool {
    file_name
        .strip_prefix(base)
        .and_then(|rest| rest.strip_prefix(BACKUP_SUFFIX))
        .is_some_and(|digits| digits.chars().all(|c| c.is_ascii_digit()))
}

/// Copy a regular file, carrying over permissions and modification time
pub fn copy_preserving(source: &Path, dest: &Path) -> io::Result<u64> {
    let mut input = File::open(source)?;
    let metadata = input.metadata()?;
    let mut output = File::create(dest)?;
    let copied = io::copy(&mut input, &mut output)?;
    // mtime first: the source mode may be read-only
    if let Ok(modified) = metadata.modified() {
        output.set_modified(modified)?;
    }
    output.set_permissions(metadata.permissions())?;
    Ok(copied)
}

/// Delete the file at `path` if one exists
pub fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Remove empty directories from `start` upward, never touching `stop` or anything above it
///
/// Returns the directories removed.
pub fn prune_empty_dirs(start: &Path, stop: &Path) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    let mut current = Some(start);

    while let Some(dir) = current {
        if dir == stop || !dir.starts_with(stop) {
            break;
        }
        // fails on non-empty directories, which ends the walk
        if fs::remove_dir(dir).is_err() {
            break;
        }
        removed.push(dir.to_path_buf());
        current = dir.parent();
    }

    removed
}

/// Whether `path` lies strictly inside `root`, ignoring `.` and rejecting `..`
pub fn is_within(path: &Path, root: &Path) -> bool {
    use std::path::Component;

    match path.strip_prefix(root) {
        Ok(rest) => {
            rest.components().next().is_some()
                && !rest
                    .components()
                    .any(|component| matches!(component, Component::ParentDir))
        }
        Err(_) => false,
    }
}
