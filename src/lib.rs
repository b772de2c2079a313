// src/lib.rs

//! Parcel Package Installer
//!
//! Minimal local package installer: fetches `name-version.tar.gz` archives
//! from an ordered mirror list, validates their manifests and applies them
//! to an installation root with all-or-nothing semantics.
//!
//! # Architecture
//!
//! - Mirrors: ordered fallback list of local directories and HTTP base URLs
//! - Store: local archive cache, written atomically
//! - Transactions: pre-existing files are backed up and restored on failure
//! - Registry: JSON file mapping package name to its installed files
//!
//! Parcel takes no locks. Running two instances against the same home or
//! installation root at once is unsupported (single-process use only).

pub mod archive;
pub mod checksum;
mod error;
pub mod fetch;
pub mod fs_utils;
pub mod install;
pub mod layout;
pub mod mirrors;
pub mod registry;
pub mod remove;
pub mod verify;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
