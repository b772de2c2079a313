// src/registry/json.rs

//! JSON file registry
//!
//! The whole registry is one JSON object mapping package name to record. It
//! is loaded once on open and rewritten atomically (temp file + rename) on
//! every mutation.

use super::{InstallRecord, Registry};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Registry persisted to a JSON file
#[derive(Debug)]
pub struct JsonRegistry {
    path: PathBuf,
    records: BTreeMap<String, InstallRecord>,
}

impl JsonRegistry {
    /// Load the registry at `path`; a missing file is an empty registry
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                Error::Registry(format!("Failed to parse {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(Error::Registry(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        debug!(
            "Loaded registry {} ({} package(s))",
            path.display(),
            records.len()
        );
        Ok(Self { path, records })
    }

    /// Write the current records to disk
    fn save(&self) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| {
            Error::IoError(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        let mut payload = serde_json::to_string_pretty(&self.records)
            .map_err(|e| Error::Registry(format!("Failed to serialize registry: {}", e)))?;
        payload.push('\n');

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| {
            Error::IoError(format!(
                "Failed to create temporary registry file in {}: {}",
                dir.display(),
                e
            ))
        })?;
        temp.write_all(payload.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| {
            Error::IoError(format!("Failed to write {}: {}", self.path.display(), e))
        })?;

        debug!("Saved registry {}", self.path.display());
        Ok(())
    }
}

impl Registry for JsonRegistry {
    fn get(&self, name: &str) -> Result<Option<InstallRecord>> {
        Ok(self.records.get(name).cloned())
    }

    fn set(&mut self, name: &str, record: InstallRecord) -> Result<()> {
        let previous = self.records.insert(name.to_string(), record);
        if let Err(e) = self.save() {
            // keep memory in step with disk
            match previous {
                Some(previous) => self.records.insert(name.to_string(), previous),
                None => self.records.remove(name),
            };
            return Err(e);
        }
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<Option<InstallRecord>> {
        let Some(previous) = self.records.remove(name) else {
            return Ok(None);
        };
        if let Err(e) = self.save() {
            self.records.insert(name.to_string(), previous);
            return Err(e);
        }
        Ok(Some(previous))
    }

    fn list(&self) -> Result<Vec<(String, InstallRecord)>> {
        Ok(self
            .records
            .iter()
            .map(|(name, record)| (name.clone(), record.clone()))
            .collect())
    }
}
