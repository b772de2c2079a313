// src/mirrors.rs

//! Mirror source resolution
//!
//! Mirrors are listed one per line in a plain text file. The first file that
//! exists in the precedence list wins; the order of lines inside it is the
//! fallback order used by the fetcher.

use crate::error::{Error, Result};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Project-level mirror list, relative to the working directory
pub const PROJECT_MIRRORS_FILE: &str = "mirrors/config.txt";

/// A single place archives can be fetched from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mirror {
    /// Directory on the local filesystem
    Local(PathBuf),
    /// HTTP(S) base URL, without trailing slash
    Remote(String),
}

impl Mirror {
    /// Parse one configuration entry
    ///
    /// Accepts `file://` URLs, bare absolute paths, and `http(s)://` URLs.
    /// Returns `None` for anything else.
    pub fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim();

        if let Some(rest) = entry.strip_prefix("file://") {
            return Some(Mirror::Local(file_url_path(rest)));
        }

        if entry.starts_with("http://") || entry.starts_with("https://") {
            let base = entry.trim_end_matches('/');
            return Some(Mirror::Remote(base.to_string()));
        }

        let path = Path::new(entry);
        if path.is_absolute() {
            return Some(Mirror::Local(path.to_path_buf()));
        }

        None
    }
}

impl fmt::Display for Mirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mirror::Local(path) => write!(f, "file://{}", path.display()),
            Mirror::Remote(url) => f.write_str(url),
        }
    }
}

/// Mirrors resolved from configuration, in priority order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorList {
    /// File the list was read from, if any existed
    pub source: Option<PathBuf>,
    pub mirrors: Vec<Mirror>,
}

/// Default precedence: project-level file, then the user-level file
pub fn default_config_candidates(project_dir: &Path) -> Vec<PathBuf> {
    let mut candidates = vec![project_dir.join(PROJECT_MIRRORS_FILE)];

    let config_home = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME")
                .filter(|v| !v.is_empty())
                .map(|home| PathBuf::from(home).join(".config"))
        });
    if let Some(config_home) = config_home {
        candidates.push(config_home.join("parcel").join("mirrors.txt"));
    }

    candidates
}

/// Read the first existing configuration file among `candidates`
///
/// A missing file is skipped; an empty list is returned when none exist.
pub fn resolve_mirrors(candidates: &[PathBuf]) -> Result<MirrorList> {
    for candidate in candidates {
        let content = match fs::read_to_string(candidate) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(Error::IoError(format!(
                    "Failed to read mirror configuration {}: {}",
                    candidate.display(),
                    e
                )));
            }
        };

        let mirrors = parse_mirror_config(&content);
        debug!(
            "Loaded {} mirror(s) from {}",
            mirrors.len(),
            candidate.display()
        );
        return Ok(MirrorList {
            source: Some(candidate.clone()),
            mirrors,
        });
    }

    debug!("No mirror configuration found");
    Ok(MirrorList::default())
}

/// Parse configuration text, skipping blank lines and `#` comments
pub fn parse_mirror_config(content: &str) -> Vec<Mirror> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mirror = Mirror::parse(line);
            if mirror.is_none() {
                warn!("Ignoring unrecognised mirror entry: {}", line);
            }
            mirror
        })
        .collect()
}

/// Path component of a `file://` URL (host part, if any, is dropped)
fn file_url_path(rest: &str) -> PathBuf {
    if rest.starts_with('/') {
        return PathBuf::from(rest);
    }

    match rest.find('/') {
        Some(pos) => PathBuf::from(&rest[pos..]),
        None => PathBuf::from("/"),
    }
}
