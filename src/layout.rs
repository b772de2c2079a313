// src/layout.rs

//! On-disk layout for Parcel
//!
//! Everything lives under a single home directory:
//!
//! - `store/`: cached package archives, one per package identifier
//! - `staging/`: parent of per-operation scratch directories
//! - `packages/`: the installation root (overridable)
//! - `database/registry.json`: installed-package registry

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the home directory
pub const HOME_ENV: &str = "PARCEL_HOME";

/// Resolved directory layout for one Parcel home
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    home: PathBuf,
    install_root: PathBuf,
}

impl Layout {
    /// Create a layout rooted at `home`, installing into `home/packages`
    pub fn new(home: impl Into<PathBuf>) -> Self {
        let home = absolutize(home.into());
        let install_root = home.join("packages");
        Self { home, install_root }
    }

    /// Install into `root` instead of `home/packages`
    pub fn with_install_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.install_root = absolutize(root.into());
        self
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Directory that receives package files
    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    /// Archive cache
    pub fn store_dir(&self) -> PathBuf {
        self.home.join("store")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.home.join("staging")
    }

    pub fn registry_path(&self) -> PathBuf {
        self.home.join("database").join("registry.json")
    }

    /// Create every directory the layout refers to
    pub fn ensure_dirs(&self) -> Result<()> {
        let registry_dir = self
            .registry_path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.home.clone());

        for dir in [
            self.store_dir(),
            self.staging_dir(),
            self.install_root.clone(),
            registry_dir,
        ] {
            fs::create_dir_all(&dir).map_err(|e| {
                Error::IoError(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        debug!("Layout ready under {}", self.home.display());
        Ok(())
    }
}

/// Default home: `$PARCEL_HOME`, else `$HOME/.parcel`
pub fn default_home() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }

    let home = std::env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            Error::InvalidArgument(format!(
                "HOME is not set; pass --home or set {}",
                HOME_ENV
            ))
        })?;
    Ok(PathBuf::from(home).join(".parcel"))
}

fn absolutize(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}
