//! Bundle install/enable/disable/uninstall against the real filesystem.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use node_agent::application::services::bundle::{Bundle, BundleCollection, FileBundleCollection};
use node_agent::domain::{Package, PackageSource};
use node_agent::infra::fs::OsFileSystem;
use tempfile::TempDir;

fn package(version: &str) -> Package {
    Package {
        name: "ruby".to_string(),
        version: version.to_string(),
        source: PackageSource {
            blobstore_id: "blob".to_string(),
            sha1: "abc".to_string(),
        },
    }
}

#[test]
fn install_enable_disable_uninstall() {
    let dir = TempDir::new().unwrap();
    let fs = OsFileSystem::new(dir.path().join("tmp"));
    let packages = FileBundleCollection::new(dir.path(), dir.path(), "packages", &fs);
    let bundle = packages.get(&package("1")).unwrap();

    let installed = bundle.install().unwrap();
    assert_eq!(installed, dir.path().join("data/packages/ruby/1-abc"));
    assert!(installed.is_dir());

    let enabled = bundle.enable().unwrap();
    assert_eq!(enabled, dir.path().join("packages/ruby"));
    assert_eq!(std::fs::read_link(&enabled).unwrap(), installed);

    bundle.disable().unwrap();
    assert!(enabled.symlink_metadata().is_err());

    bundle.uninstall().unwrap();
    bundle.uninstall().unwrap();
    assert!(!installed.exists());
}

#[test]
fn disable_of_superseded_version_keeps_newer_link() {
    let dir = TempDir::new().unwrap();
    let fs = OsFileSystem::new(dir.path().join("tmp"));
    let packages = FileBundleCollection::new(dir.path(), dir.path(), "packages", &fs);
    let old = packages.get(&package("1")).unwrap();
    let new = packages.get(&package("2")).unwrap();
    old.install().unwrap();
    old.enable().unwrap();
    let new_path = new.install().unwrap();
    new.enable().unwrap();

    old.disable().unwrap();

    let link = dir.path().join("packages/ruby");
    assert_eq!(std::fs::read_link(link).unwrap(), new_path);
}

#[test]
fn list_finds_every_installed_version() {
    let dir = TempDir::new().unwrap();
    let fs = OsFileSystem::new(dir.path().join("tmp"));
    let packages = FileBundleCollection::new(dir.path(), dir.path(), "packages", &fs);
    for version in ["1", "2"] {
        packages.get(&package(version)).unwrap().install().unwrap();
    }

    let mut listed = packages.list().unwrap();
    listed.sort_by(|a, b| a.install_path().unwrap().cmp(&b.install_path().unwrap()));

    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0], packages.get(&package("1")).unwrap());
    assert_eq!(listed[1], packages.get(&package("2")).unwrap());
}
