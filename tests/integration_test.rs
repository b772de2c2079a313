// tests/integration_test.rs

//! Integration tests for Parcel
//!
//! These tests drive whole operations (install, remove, verify) against a
//! real home layout, a JSON registry on disk and local or HTTP mirrors.

use flate2::Compression;
use flate2::write::GzEncoder;
use parcel::Error;
use parcel::checksum::payload_digest;
use parcel::fetch::{Fetcher, HttpClient, HttpConfig};
use parcel::install::install_package;
use parcel::layout::Layout;
use parcel::mirrors::{Mirror, default_config_candidates, resolve_mirrors};
use parcel::registry::{JsonRegistry, Registry};
use parcel::remove::{RemoveStatus, remove_package};
use parcel::verify::{ChecksumVerdict, verify_package};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Build a package archive in memory
fn package_bytes(package_id: &str, manifest_json: &str, files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    let mut append = |name: String, data: &[u8]| {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, data).unwrap();
    };

    append(format!("{}/manifest.json", package_id), manifest_json.as_bytes());
    for (name, data) in files {
        append(format!("{}/{}", package_id, name), *data);
    }

    builder.into_inner().unwrap().finish().unwrap()
}

fn write_package(dir: &Path, package_id: &str, manifest_json: &str, files: &[(&str, &[u8])]) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join(format!("{}.tar.gz", package_id)),
        package_bytes(package_id, manifest_json, files),
    )
    .unwrap();
}

/// Digest an author would declare for package `name`/`version` shipping `files`
fn declared_digest(name: &str, version: &str, files: &[(&str, &[u8])]) -> String {
    let dir = TempDir::new().unwrap();
    let mut names = Vec::new();
    for (name, data) in files {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
        names.push(name.to_string());
    }
    payload_digest(dir.path(), name, version, &names).unwrap()
}

/// Every file and directory under `root`, relative to it
fn tree(root: &Path) -> BTreeSet<PathBuf> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeSet<PathBuf>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            out.insert(path.strip_prefix(root).unwrap().to_path_buf());
            if path.is_dir() {
                walk(root, &path, out);
            }
        }
    }
    let mut out = BTreeSet::new();
    walk(root, root, &mut out);
    out
}

struct Sandbox {
    temp: TempDir,
    layout: Layout,
}

impl Sandbox {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path().join("home"));
        layout.ensure_dirs().unwrap();
        Self { temp, layout }
    }

    fn mirror_dir(&self, name: &str) -> PathBuf {
        let dir = self.temp.path().join(name);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn fetcher(&self, mirrors: Vec<Mirror>, client: Option<HttpClient>) -> Fetcher {
        Fetcher::new(self.layout.store_dir(), mirrors, client)
    }

    fn registry(&self) -> JsonRegistry {
        JsonRegistry::open(self.layout.registry_path()).unwrap()
    }

    fn root(&self) -> &Path {
        self.layout.install_root()
    }
}

fn http_client() -> HttpClient {
    HttpClient::new(HttpConfig {
        timeout: Duration::from_secs(5),
        no_proxy: true,
    })
    .unwrap()
}

#[test]
fn test_cached_archive_short_circuits_mirrors() {
    let sandbox = Sandbox::new();
    write_package(
        &sandbox.layout.store_dir(),
        "foo-1.0",
        r#"{"name": "foo", "version": "1.0", "files": []}"#,
        &[],
    );
    let fetcher = sandbox.fetcher(
        vec![Mirror::Local(sandbox.temp.path().join("does-not-exist"))],
        None,
    );

    let path = fetcher.fetch("foo-1.0").unwrap();
    assert_eq!(path, sandbox.layout.store_dir().join("foo-1.0.tar.gz"));
}

#[test]
fn test_second_mirror_serves_then_cache_is_used() {
    let sandbox = Sandbox::new();
    let empty = sandbox.mirror_dir("mirror-empty");
    let full = sandbox.mirror_dir("mirror-full");
    write_package(
        &full,
        "foo-1.0",
        r#"{"name": "foo", "version": "1.0", "files": []}"#,
        &[],
    );
    let fetcher = sandbox.fetcher(vec![Mirror::Local(empty), Mirror::Local(full.clone())], None);

    let first = fetcher.fetch("foo-1.0").unwrap();
    fs::remove_file(full.join("foo-1.0.tar.gz")).unwrap();
    let second = fetcher.fetch("foo-1.0").unwrap();

    assert_eq!(first, second);
    assert!(second.is_file());
}

#[test]
fn test_http_mirror_falls_back_after_error() {
    let sandbox = Sandbox::new();
    let body = package_bytes(
        "foo-1.0",
        r#"{"name": "foo", "version": "1.0", "files": ["files/bin/foo"]}"#,
        &[("files/bin/foo", b"tool")],
    );

    let mut broken = mockito::Server::new();
    let broken_mock = broken
        .mock("GET", "/foo-1.0.tar.gz")
        .with_status(500)
        .expect(1)
        .create();

    let mut healthy = mockito::Server::new();
    let healthy_mock = healthy
        .mock("GET", "/pkgs/foo-1.0.tar.gz")
        .with_status(200)
        .with_body(body)
        .expect(1)
        .create();

    let fetcher = sandbox.fetcher(
        vec![
            Mirror::Remote(broken.url()),
            Mirror::Remote(format!("{}/pkgs", healthy.url())),
        ],
        Some(http_client()),
    );
    let mut registry = sandbox.registry();

    let report = install_package(&fetcher, &mut registry, &sandbox.layout, "foo-1.0").unwrap();
    assert_eq!(report.version, "1.0");
    assert_eq!(fs::read(sandbox.root().join("bin/foo")).unwrap(), b"tool");

    // cached now: no further requests
    fetcher.fetch("foo-1.0").unwrap();

    broken_mock.assert();
    healthy_mock.assert();
}

#[test]
fn test_offline_http_mirror_is_unsupported() {
    let sandbox = Sandbox::new();
    let fetcher = sandbox.fetcher(
        vec![Mirror::Remote("http://mirror.invalid".to_string())],
        None,
    );
    let mut registry = sandbox.registry();

    let err = install_package(&fetcher, &mut registry, &sandbox.layout, "foo-1.0").unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)));
    assert_eq!(err.exit_code(), 6);
}

#[test]
fn test_no_mirrors_is_unavailable() {
    let sandbox = Sandbox::new();
    let fetcher = sandbox.fetcher(Vec::new(), None);
    let mut registry = sandbox.registry();

    let err = install_package(&fetcher, &mut registry, &sandbox.layout, "foo-1.0").unwrap_err();
    assert!(matches!(err, Error::Unavailable(_)));
}

#[test]
fn test_failed_install_restores_existing_file() {
    let sandbox = Sandbox::new();
    let mirror = sandbox.mirror_dir("mirror");
    write_package(
        &mirror,
        "foo-1.0",
        r#"{"name": "foo", "version": "1.0", "files": ["files/A", "files/B"]}"#,
        &[("files/A", b"new A")],
    );
    fs::write(sandbox.root().join("A"), b"old A").unwrap();
    let before = tree(sandbox.root());

    let fetcher = sandbox.fetcher(vec![Mirror::Local(mirror)], None);
    let mut registry = sandbox.registry();
    let err = install_package(&fetcher, &mut registry, &sandbox.layout, "foo-1.0").unwrap_err();

    assert!(matches!(err, Error::MissingFile(_)));
    assert_eq!(fs::read(sandbox.root().join("A")).unwrap(), b"old A");
    assert_eq!(tree(sandbox.root()), before);
    assert!(sandbox.registry().get("foo").unwrap().is_none());
    assert_eq!(fs::read_dir(sandbox.layout.staging_dir()).unwrap().count(), 0);
}

#[test]
fn test_install_remove_round_trip() {
    let sandbox = Sandbox::new();
    let mirror = sandbox.mirror_dir("mirror");
    write_package(
        &mirror,
        "foo-1.0",
        r#"{"name": "foo", "version": "1.0", "files": ["files/bin/foo", "files/share/foo/data/x"]}"#,
        &[("files/bin/foo", b"tool"), ("files/share/foo/data/x", b"data")],
    );
    fs::create_dir_all(sandbox.root().join("bin")).unwrap();
    fs::write(sandbox.root().join("bin/other"), b"unrelated").unwrap();
    let before = tree(sandbox.root());

    let fetcher = sandbox.fetcher(vec![Mirror::Local(mirror)], None);
    let mut registry = sandbox.registry();
    let report = install_package(&fetcher, &mut registry, &sandbox.layout, "foo-1.0").unwrap();

    let reopened = sandbox.registry();
    let record = reopened.get("foo").unwrap().unwrap();
    assert_eq!(record.version, "1.0");
    assert_eq!(record.files.len(), 2);
    for file in &report.files {
        assert!(file.is_file());
    }

    let mut registry = sandbox.registry();
    let removal = remove_package(&mut registry, sandbox.root(), "foo").unwrap();
    assert_eq!(removal.status, RemoveStatus::Removed);
    for file in &report.files {
        assert!(!file.exists());
    }

    assert_eq!(tree(sandbox.root()), before);
    assert!(sandbox.registry().list().unwrap().is_empty());
}

#[test]
fn test_remove_unknown_package_changes_nothing() {
    let sandbox = Sandbox::new();
    fs::write(sandbox.root().join("keep"), b"x").unwrap();
    let registry_before = fs::read(sandbox.layout.registry_path()).ok();

    let mut registry = sandbox.registry();
    let report = remove_package(&mut registry, sandbox.root(), "ghost").unwrap();

    assert_eq!(report.status, RemoveStatus::NotInstalled);
    assert!(sandbox.root().join("keep").exists());
    assert_eq!(fs::read(sandbox.layout.registry_path()).ok(), registry_before);
}

#[test]
fn test_reinstall_keeps_single_entry_with_new_files() {
    let sandbox = Sandbox::new();
    let mirror = sandbox.mirror_dir("mirror");
    write_package(
        &mirror,
        "foo-1.0",
        r#"{"name": "foo", "version": "1.0", "files": ["files/bin/foo", "files/bin/foo-old"]}"#,
        &[("files/bin/foo", b"v1"), ("files/bin/foo-old", b"v1")],
    );
    write_package(
        &mirror,
        "foo-1.1",
        r#"{"name": "foo", "version": "1.1", "files": ["files/bin/foo", "files/bin/foo-new"]}"#,
        &[("files/bin/foo", b"v1.1"), ("files/bin/foo-new", b"v1.1")],
    );
    let fetcher = sandbox.fetcher(vec![Mirror::Local(mirror)], None);
    let mut registry = sandbox.registry();

    install_package(&fetcher, &mut registry, &sandbox.layout, "foo-1.0").unwrap();
    install_package(&fetcher, &mut registry, &sandbox.layout, "foo-1.0").unwrap();
    install_package(&fetcher, &mut registry, &sandbox.layout, "foo-1.1").unwrap();

    let entries = sandbox.registry().list().unwrap();
    assert_eq!(entries.len(), 1);
    let (name, record) = &entries[0];
    assert_eq!(name, "foo");
    assert_eq!(record.version, "1.1");
    assert_eq!(
        record.files,
        vec![
            sandbox.root().join("bin/foo").display().to_string(),
            sandbox.root().join("bin/foo-new").display().to_string(),
        ]
    );
    assert!(!sandbox.root().join("bin/foo-old").exists());
    assert_eq!(fs::read(sandbox.root().join("bin/foo")).unwrap(), b"v1.1");

    let leftovers: Vec<_> = tree(sandbox.root())
        .into_iter()
        .filter(|p| p.to_string_lossy().contains(".parcel.bak"))
        .collect();
    assert!(leftovers.is_empty(), "backups left behind: {:?}", leftovers);
}

#[test]
fn test_verify_detects_tampering() {
    let sandbox = Sandbox::new();
    let files: &[(&str, &[u8])] = &[("files/bin/foo", b"tool")];
    let manifest = format!(
        r#"{{"name": "foo", "version": "1.0", "files": ["files/bin/foo"], "sha256": "{}"}}"#,
        declared_digest("foo", "1.0", files)
    );

    write_package(&sandbox.layout.store_dir(), "foo-1.0", &manifest, files);
    let report = verify_package(&sandbox.layout, "foo-1.0").unwrap();
    assert!(matches!(report.verdict, ChecksumVerdict::Match { .. }));

    write_package(
        &sandbox.layout.store_dir(),
        "foo-1.0",
        &manifest,
        &[("files/bin/foo", b"evil")],
    );
    let report = verify_package(&sandbox.layout, "foo-1.0").unwrap();
    assert!(matches!(report.verdict, ChecksumVerdict::Mismatch { .. }));
    assert!(!report.verdict.passed());
}

#[test]
fn test_tampered_archive_is_not_installed() {
    let sandbox = Sandbox::new();
    let mirror = sandbox.mirror_dir("mirror");
    let manifest = format!(
        r#"{{"name": "foo", "version": "1.0", "files": ["files/bin/foo"], "sha256": "{}"}}"#,
        declared_digest("foo", "1.0", &[("files/bin/foo", b"tool")])
    );
    write_package(&mirror, "foo-1.0", &manifest, &[("files/bin/foo", b"evil")]);

    let fetcher = sandbox.fetcher(vec![Mirror::Local(mirror)], None);
    let mut registry = sandbox.registry();
    let err = install_package(&fetcher, &mut registry, &sandbox.layout, "foo-1.0").unwrap_err();

    assert!(matches!(err, Error::ChecksumMismatch { .. }));
    assert!(tree(sandbox.root()).is_empty());
}

#[test]
fn test_wrong_typed_manifest_field() {
    let sandbox = Sandbox::new();
    let mirror = sandbox.mirror_dir("mirror");
    let manifest = format!(
        r#"{{"name": "foo", "version": 1, "files": ["files/bin/foo"], "sha256": "{}"}}"#,
        declared_digest("foo", "1.0", &[("files/bin/foo", b"tool")])
    );
    write_package(&mirror, "foo-1.0", &manifest, &[("files/bin/foo", b"tool")]);

    let fetcher = sandbox.fetcher(vec![Mirror::Local(mirror)], None);
    let mut registry = sandbox.registry();
    let err = install_package(&fetcher, &mut registry, &sandbox.layout, "foo-1.0").unwrap_err();
    assert!(matches!(err, Error::InvalidManifest(_)));
    assert_eq!(err.exit_code(), 5);
    assert!(tree(sandbox.root()).is_empty());

    // the archive is cached; verify still compares the declared digest
    let report = verify_package(&sandbox.layout, "foo-1.0").unwrap();
    assert_eq!(report.version, None);
    assert!(matches!(report.verdict, ChecksumVerdict::Mismatch { .. }));
}

#[test]
fn test_verify_requires_cached_archive() {
    let sandbox = Sandbox::new();
    let err = verify_package(&sandbox.layout, "foo-1.0").unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn test_empty_archive_is_malformed() {
    let sandbox = Sandbox::new();
    let mirror = sandbox.mirror_dir("mirror");
    let file = File::create(mirror.join("foo-1.0.tar.gz")).unwrap();
    let builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.into_inner().unwrap().finish().unwrap();

    let fetcher = sandbox.fetcher(vec![Mirror::Local(mirror)], None);
    let mut registry = sandbox.registry();
    let err = install_package(&fetcher, &mut registry, &sandbox.layout, "foo-1.0").unwrap_err();

    match err {
        Error::Malformed(msg) => assert!(msg.contains("empty package")),
        other => panic!("expected Malformed, got {:?}", other),
    }
}

#[test]
fn test_project_mirror_config_is_resolved() {
    let sandbox = Sandbox::new();
    let project = sandbox.temp.path().join("project");
    let mirror = sandbox.mirror_dir("mirror");
    fs::create_dir_all(project.join("mirrors")).unwrap();
    fs::write(
        project.join("mirrors/config.txt"),
        format!(
            "# primary\n\nfile://{}\nhttps://mirror.example.org/pkgs/\n",
            mirror.display()
        ),
    )
    .unwrap();

    let list = resolve_mirrors(&default_config_candidates(&project)).unwrap();

    assert_eq!(list.source, Some(project.join("mirrors/config.txt")));
    assert_eq!(
        list.mirrors,
        vec![
            Mirror::Local(mirror),
            Mirror::Remote("https://mirror.example.org/pkgs".to_string()),
        ]
    );
}
