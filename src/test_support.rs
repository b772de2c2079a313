// src/test_support.rs

//! Fixtures shared by unit tests

use crate::error::{Error, Result};
use crate::fetch::archive_file_name;
use crate::registry::{InstallRecord, MemoryRegistry, Registry};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Write `<dir>/<id>.tar.gz` with a `<id>/` package root holding the manifest and files
pub fn write_package(
    dir: &Path,
    package_id: &str,
    manifest_json: &str,
    files: &[(&str, &[u8])],
) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(archive_file_name(package_id));
    let file = File::create(&path).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    let mut append = |name: String, data: &[u8]| {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, data).unwrap();
    };

    append(
        format!("{}/manifest.json", package_id),
        manifest_json.as_bytes(),
    );
    for (name, data) in files {
        append(format!("{}/{}", package_id, name), *data);
    }

    builder.into_inner().unwrap().finish().unwrap();
    path
}

/// Registry whose writes always fail
pub struct FailingRegistry {
    inner: MemoryRegistry,
}

pub fn failing_registry() -> FailingRegistry {
    FailingRegistry {
        inner: MemoryRegistry::new(),
    }
}

impl Registry for FailingRegistry {
    fn get(&self, name: &str) -> Result<Option<InstallRecord>> {
        self.inner.get(name)
    }

    fn set(&mut self, _name: &str, _record: InstallRecord) -> Result<()> {
        Err(Error::Registry("registry is read-only".to_string()))
    }

    fn delete(&mut self, _name: &str) -> Result<Option<InstallRecord>> {
        Err(Error::Registry("registry is read-only".to_string()))
    }

    fn list(&self) -> Result<Vec<(String, InstallRecord)>> {
        self.inner.list()
    }
}
