// src/fetch/mod.rs

//! Archive fetching with mirror fallback
//!
//! Archives are cached in the store under `<package_id>.tar.gz`. A cached
//! archive is always complete: bytes land in a temporary file next to the
//! cache entry and are renamed into place only once the transfer finished.

pub mod client;

pub use client::{HttpClient, HttpConfig};

use crate::error::{Error, Result};
use crate::mirrors::Mirror;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Archive file extension used on mirrors and in the cache
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// Archive file name for a package identifier (`name-version.tar.gz`)
pub fn archive_file_name(package_id: &str) -> String {
    format!("{}.{}", package_id, ARCHIVE_EXTENSION)
}

/// Reject identifiers that are not a single plain path component
pub fn validate_package_id(package_id: &str) -> Result<()> {
    let mut components = Path::new(package_id).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );

    if package_id.is_empty()
        || !single_normal
        || package_id.contains('/')
        || package_id.contains('\\')
    {
        return Err(Error::InvalidArgument(format!(
            "'{}' is not a valid package identifier (expected name-version)",
            package_id
        )));
    }
    Ok(())
}

/// Fetches archives into the local cache, trying mirrors in order
#[derive(Debug)]
pub struct Fetcher {
    cache_dir: PathBuf,
    mirrors: Vec<Mirror>,
    client: Option<HttpClient>,
}

impl Fetcher {
    /// Create a fetcher
    ///
    /// Without an HTTP client, remote mirrors are `Unsupported`.
    pub fn new(cache_dir: impl Into<PathBuf>, mirrors: Vec<Mirror>, client: Option<HttpClient>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            mirrors,
            client,
        }
    }

    /// Where the archive for `package_id` lives once cached
    pub fn cached_archive_path(&self, package_id: &str) -> PathBuf {
        self.cache_dir.join(archive_file_name(package_id))
    }

    /// Obtain the archive for `package_id`, returning its cache path
    pub fn fetch(&self, package_id: &str) -> Result<PathBuf> {
        validate_package_id(package_id)?;

        let dest = self.cached_archive_path(package_id);
        if dest.is_file() {
            debug!("Cache hit for {} at {}", package_id, dest.display());
            return Ok(dest);
        }

        if self.mirrors.is_empty() {
            return Err(Error::Unavailable(format!(
                "no mirrors configured for {}",
                package_id
            )));
        }

        fs::create_dir_all(&self.cache_dir).map_err(|e| {
            Error::IoError(format!(
                "Failed to create cache directory {}: {}",
                self.cache_dir.display(),
                e
            ))
        })?;

        let file_name = archive_file_name(package_id);
        let mut last_error: Option<Error> = None;

        for mirror in &self.mirrors {
            let attempt = match mirror {
                Mirror::Local(dir) => self.fetch_local(&dir.join(&file_name), &dest),
                Mirror::Remote(base) => {
                    let client = self.client.as_ref().ok_or_else(|| {
                        Error::Unsupported(format!(
                            "mirror {} requires HTTP but no HTTP client is available (offline mode)",
                            base
                        ))
                    })?;
                    let url = format!("{}/{}", base, file_name);
                    self.store_atomically(&dest, |file| client.download(&url, file).map(|_| ()))
                }
            };

            match attempt {
                Ok(()) => {
                    info!("Fetched {} from {}", file_name, mirror);
                    return Ok(dest);
                }
                Err(e) => {
                    warn!("Mirror {} failed for {}: {}", mirror, file_name, e);
                    last_error = Some(e);
                }
            }
        }

        let detail = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no mirror attempted".to_string());
        Err(Error::Unavailable(format!(
            "{} could not be fetched from any of {} mirror(s); last error: {}",
            file_name,
            self.mirrors.len(),
            detail
        )))
    }

    fn fetch_local(&self, source: &Path, dest: &Path) -> Result<()> {
        if !source.is_file() {
            return Err(Error::NotFound(format!("{} not found", source.display())));
        }

        let permissions = fs::metadata(source)?.permissions();
        self.store_atomically(dest, |file| {
            let mut reader = File::open(source).map_err(|e| {
                Error::IoError(format!("Failed to open {}: {}", source.display(), e))
            })?;
            io::copy(&mut reader, file).map_err(|e| {
                Error::IoError(format!("Failed to copy {}: {}", source.display(), e))
            })?;
            file.set_permissions(permissions.clone())?;
            Ok(())
        })
    }

    /// Fill a temporary file in the cache directory, then rename it onto `dest`
    ///
    /// On any failure the temporary file is removed and `dest` is untouched.
    fn store_atomically<F>(&self, dest: &Path, fill: F) -> Result<()>
    where
        F: FnOnce(&mut File) -> Result<()>,
    {
        let mut temp = NamedTempFile::new_in(&self.cache_dir).map_err(|e| {
            Error::IoError(format!(
                "Failed to create temporary file in {}: {}",
                self.cache_dir.display(),
                e
            ))
        })?;

        fill(temp.as_file_mut())?;
        temp.as_file().sync_all()?;

        temp.persist(dest).map_err(|e| {
            Error::IoError(format!("Failed to move archive into {}: {}", dest.display(), e))
        })?;
        Ok(())
    }
}
