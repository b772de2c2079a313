// src/archive/manifest.rs

//! Package manifest (`manifest.json`)
//!
//! The manifest is parsed leniently: the archive opener only requires a JSON
//! object, and each field is kept as raw JSON. [`Manifest::validate`] checks
//! presence and types of the required fields and the path rules before
//! anything is installed.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// File name of the manifest inside the package root
pub const MANIFEST_FILE: &str = "manifest.json";

/// Leading path segment that holds the payload inside a package
///
/// `files/bin/tool` installs to `<root>/bin/tool`.
pub const PAYLOAD_DIR: &str = "files";

/// Manifest as written by the package author
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    version: Option<Value>,
    #[serde(default)]
    files: Option<Value>,
    #[serde(default)]
    sha256: Option<Value>,
}

/// One file to install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Path as listed, relative to the package root
    pub source: String,
    /// Path relative to the installation root
    pub destination: PathBuf,
}

/// A manifest whose required fields are present and whose entries are safe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidManifest {
    pub name: String,
    pub version: String,
    pub entries: Vec<ManifestEntry>,
    pub sha256: Option<String>,
}

impl ValidManifest {
    /// Entry paths as listed in the manifest
    pub fn sources(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.source.clone()).collect()
    }
}

impl Manifest {
    /// Parse manifest JSON; only a non-object document is rejected
    pub fn from_json_str(input: &str) -> Result<Self> {
        serde_json::from_str(input)
            .map_err(|e| Error::Malformed(format!("{} is not valid: {}", MANIFEST_FILE, e)))
    }

    /// `name`, if present as a string
    pub fn name(&self) -> Option<&str> {
        self.name.as_ref().and_then(Value::as_str)
    }

    /// `version`, if present as a string
    pub fn version(&self) -> Option<&str> {
        self.version.as_ref().and_then(Value::as_str)
    }

    /// Declared checksum, ignoring blank or non-string values
    pub fn declared_sha256(&self) -> Option<&str> {
        self.sha256
            .as_ref()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// The `files` list; must be an array of strings
    pub fn file_list(&self) -> Result<Vec<String>> {
        let Some(files) = &self.files else {
            return Err(Error::InvalidManifest("manifest has no files list".to_string()));
        };
        let Value::Array(items) = files else {
            return Err(Error::InvalidManifest(format!(
                "files must be an array, found {}",
                json_type(files)
            )));
        };

        items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    Error::InvalidManifest(format!(
                        "file entries must be strings, found {}",
                        json_type(item)
                    ))
                })
            })
            .collect()
    }

    /// Check required fields and map entries to install destinations
    pub fn validate(&self) -> Result<ValidManifest> {
        let name = required_string(self.name.as_ref(), "name")?;
        let version = required_string(self.version.as_ref(), "version")?;
        let files = self.file_list()?;

        if let Some(sha256) = &self.sha256 {
            if !sha256.is_string() && !sha256.is_null() {
                return Err(Error::InvalidManifest(format!(
                    "sha256 must be a string, found {}",
                    json_type(sha256)
                )));
            }
        }

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(files.len());
        for source in files {
            let destination = destination_for(&source)?;
            if !seen.insert(destination.clone()) {
                return Err(Error::InvalidManifest(format!(
                    "duplicate destination {} in manifest for {}",
                    destination.display(),
                    name
                )));
            }
            entries.push(ManifestEntry {
                source,
                destination,
            });
        }

        // a file cannot also be the parent directory of another entry
        for entry in &entries {
            if let Some(parent) = entry
                .destination
                .ancestors()
                .skip(1)
                .find(|ancestor| seen.contains(*ancestor))
            {
                return Err(Error::InvalidManifest(format!(
                    "{} is listed as a file but is also the directory of {}",
                    parent.display(),
                    entry.destination.display()
                )));
            }
        }

        Ok(ValidManifest {
            name: name.to_string(),
            version: version.to_string(),
            entries,
            sha256: self.declared_sha256().map(str::to_string),
        })
    }
}

/// Install-relative destination for a manifest entry
///
/// Strips one leading `files` segment. Absolute paths and `..` are rejected.
pub fn destination_for(entry: &str) -> Result<PathBuf> {
    let path = Path::new(entry);
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::InvalidManifest(format!(
                    "file entry '{}' must be a relative path inside the package",
                    entry
                )));
            }
        }
    }

    if parts.first().is_some_and(|first| *first == PAYLOAD_DIR) {
        parts.remove(0);
    }

    if parts.is_empty() {
        return Err(Error::InvalidManifest(format!(
            "file entry '{}' does not name a file",
            entry
        )));
    }

    Ok(parts.iter().collect())
}

fn required_string<'a>(value: Option<&'a Value>, field: &str) -> Result<&'a str> {
    match value {
        None | Some(Value::Null) => Err(Error::InvalidManifest(format!(
            "manifest missing {}",
            field
        ))),
        Some(Value::String(s)) if s.trim().is_empty() => Err(Error::InvalidManifest(format!(
            "manifest {} is empty",
            field
        ))),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(Error::InvalidManifest(format!(
            "{} must be a string, found {}",
            field,
            json_type(other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
