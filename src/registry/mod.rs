// src/registry/mod.rs

//! Installed-package registry
//!
//! The registry is the single source of truth for what is installed. It is a
//! plain key-value store keyed by package name; callers own all business
//! logic. [`JsonRegistry`] persists to a JSON file, [`MemoryRegistry`] keeps
//! everything in memory.

pub mod json;
pub mod memory;

pub use json::JsonRegistry;
pub use memory::MemoryRegistry;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What a successful install left on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecord {
    pub version: String,
    /// Cached archive the package was installed from
    #[serde(rename = "archive")]
    pub archive_path: String,
    /// Absolute paths of installed files, in manifest order
    pub files: Vec<String>,
    /// RFC 3339 install time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_at: Option<String>,
}

impl InstallRecord {
    pub fn new(version: impl Into<String>, archive_path: &Path, files: &[PathBuf]) -> Self {
        Self {
            version: version.into(),
            archive_path: archive_path.display().to_string(),
            files: files.iter().map(|p| p.display().to_string()).collect(),
            installed_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    /// Whether this record lists `path`
    pub fn owns(&self, path: &Path) -> bool {
        self.files.iter().any(|f| Path::new(f) == path)
    }
}

/// Key-value store of install records
///
/// Mutations are durable once they return `Ok`.
pub trait Registry {
    /// Look up a package by name
    fn get(&self, name: &str) -> Result<Option<InstallRecord>>;

    /// Insert or replace the record for `name`
    fn set(&mut self, name: &str, record: InstallRecord) -> Result<()>;

    /// Remove the record for `name`, returning it if it existed
    fn delete(&mut self, name: &str) -> Result<Option<InstallRecord>>;

    /// All records, sorted by package name
    fn list(&self) -> Result<Vec<(String, InstallRecord)>>;
}

/// Name of the package (other than `except`) that owns `path`, if any
pub fn owner_of(
    registry: &dyn Registry,
    path: &Path,
    except: &str,
) -> Result<Option<String>> {
    Ok(registry
        .list()?
        .into_iter()
        .find(|(name, record)| name != except && record.owns(path))
        .map(|(name, _)| name))
}
