//! End-to-end tests for the `node-agent` binary.
//!
//! Every test points `NODE_AGENT_CONFIG` at a config inside a temp dir, so
//! nothing under `/var/vcap` is touched.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use crate::support::{mode, script, store_blob, tarball};

fn agent() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("node-agent"))
}

/// A node rooted in a temp dir, with a config file and a fake monit.
struct Node {
    dir: TempDir,
}

impl Node {
    fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let base = dir.path().join("vcap");
        std::fs::create_dir_all(base.join("data/tmp")).unwrap();
        let monit = dir.path().join("bin/monit");
        script(
            &monit,
            &format!("echo \"$@\" >> {}", dir.path().join("monit.log").display()),
        );
        let config = format!(
            "base_dir: {}\nlogrotate_dir: {}\nmonit_bin: {}\nlog_level: warn\n",
            base.display(),
            dir.path().join("logrotate.d").display(),
            monit.display()
        );
        std::fs::write(dir.path().join("agent.yml"), config).unwrap();
        Self { dir }
    }

    fn base(&self) -> PathBuf {
        self.dir.path().join("vcap")
    }

    fn config(&self) -> PathBuf {
        self.dir.path().join("agent.yml")
    }

    fn agent(&self) -> Command {
        let mut cmd = agent();
        cmd.env("NODE_AGENT_CONFIG", self.config()).env_remove("RUST_LOG");
        cmd
    }

    fn add_blob(&self, blob_id: &str, files: &[(&str, &[u8], u32)]) -> String {
        let tgz = tarball(&self.base().join("data/tmp"), files);
        store_blob(&self.base().join("data/blobs"), blob_id, &tgz)
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }
}

fn link(path: &Path) -> PathBuf {
    std::fs::read_link(path).unwrap()
}

// --- Help and version ---

#[test]
fn no_args_shows_help() {
    agent()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn help_lists_subcommands() {
    agent()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("compile"))
        .stdout(predicate::str::contains("drain"));
}

#[test]
fn version_flag_shows_version() {
    agent()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("node-agent"));
}

// --- apply ---

#[test]
fn apply_converges_node() {
    let node = Node::new();
    let sha1 = node.add_blob(
        "web-blob",
        &[
            ("bin/ctl", b"#!/bin/sh\n", 0o644),
            ("monit", b"check process web", 0o644),
        ],
    );
    let spec = node.write(
        "spec.json",
        &format!(
            r#"{{"job":{{"name":"web","templates":[{{"name":"web","version":"7","sha1":"{sha1}","blobstore_id":"web-blob"}}]}},
                "properties":{{"logging":{{"max_log_file_size":"10M"}}}}}}"#
        ),
    );

    node.agent()
        .args(["apply", "--spec"])
        .arg(&spec)
        .assert()
        .success()
        .stdout(predicate::str::contains("applied 1 job(s) and 0 package(s)"));

    let install = node.base().join(format!("data/jobs/web/7-{sha1}"));
    assert_eq!(link(&node.base().join("jobs/web")), install);
    assert_eq!(mode(&install.join("bin/ctl")), 0o755);
    assert!(node.base().join("monit/job/0000_web.monitrc").exists());
    let monit_log = std::fs::read_to_string(node.dir.path().join("monit.log")).unwrap();
    assert_eq!(monit_log, "reload\n");
    let logrotate = std::fs::read_to_string(node.dir.path().join("logrotate.d/vcap")).unwrap();
    assert!(logrotate.contains("size=10M"));
}

#[test]
fn apply_rejects_incomplete_spec() {
    let node = Node::new();
    let spec = node.write(
        "spec.json",
        r#"{"job":{"templates":[{"name":"web","version":"7"}]}}"#,
    );

    node.agent()
        .args(["apply", "--spec"])
        .arg(&spec)
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "Invalid job template spec, sha1 is missing",
        ));
    assert!(!node.dir.path().join("monit.log").exists());
}

#[test]
fn apply_reports_missing_blob() {
    let node = Node::new();
    let spec = node.write(
        "spec.json",
        r#"{"job":{"templates":[{"name":"web","version":"7","sha1":"abc","blobstore_id":"nope"}]}}"#,
    );

    node.agent()
        .args(["apply", "--spec"])
        .arg(&spec)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
    assert!(!node.base().join("jobs/web").exists());
}

// --- compile ---

#[test]
fn compile_builds_and_uploads_package() {
    let node = Node::new();
    let dep_sha1 = node.add_blob("libyaml-blob", &[("lib/libyaml.so", b"yaml", 0o644)]);
    let sha1 = node.add_blob(
        "ruby-src",
        &[
            (
                "packaging",
                b"set -e\ncp $BOSH_COMPILE_TARGET/src.txt $BOSH_INSTALL_TARGET/built.txt\n\
                  echo $BOSH_PACKAGE_NAME-$BOSH_PACKAGE_VERSION > $BOSH_INSTALL_TARGET/id\n",
                0o644,
            ),
            ("src.txt", b"source", 0o644),
        ],
    );
    let package = node.write(
        "package.json",
        &format!(r#"{{"name":"ruby","version":"3","sha1":"{sha1}","blobstore_id":"ruby-src"}}"#),
    );
    let deps = node.write(
        "deps.json",
        &format!(
            r#"{{"libyaml":{{"name":"libyaml","version":"1","sha1":"{dep_sha1}","blobstore_id":"libyaml-blob"}}}}"#
        ),
    );

    let output = node
        .agent()
        .args(["compile", "--package"])
        .arg(&package)
        .arg("--deps")
        .arg(&deps)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let blob: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let blob_id = blob["blob_id"].as_str().unwrap();
    assert_eq!(blob["sha1"].as_str().unwrap().len(), 40);
    assert!(node.base().join("data/blobs").join(blob_id).exists());

    let installed = node.base().join(format!("data/packages/ruby/3-{sha1}"));
    assert_eq!(std::fs::read(installed.join("built.txt")).unwrap(), b"source");
    assert_eq!(std::fs::read(installed.join("id")).unwrap(), b"ruby-3\n");
    let dep = node.base().join(format!("data/packages/libyaml/1-{dep_sha1}"));
    assert_eq!(link(&node.base().join("packages/libyaml")), dep);
}

#[test]
fn compile_surfaces_packaging_failure() {
    let node = Node::new();
    let sha1 = node.add_blob("bad-src", &[("packaging", b"echo broken >&2\nexit 4\n", 0o644)]);
    let package = node.write(
        "package.json",
        &format!(r#"{{"name":"bad","version":"1","sha1":"{sha1}","blobstore_id":"bad-src"}}"#),
    );

    node.agent()
        .args(["compile", "--package"])
        .arg(&package)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

// --- drain ---

#[test]
fn drain_prints_script_answer() {
    let node = Node::new();
    script(&node.base().join("jobs/web/bin/drain"), "echo 12");

    node.agent()
        .args(["drain", "--job", "web", "--mode", "shutdown"])
        .assert()
        .success()
        .stdout("12\n");
}

#[test]
fn drain_without_script_is_skipped() {
    let node = Node::new();

    node.agent()
        .args(["drain", "--job", "web", "--mode", "status", "--wait"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no drain script for web"));
}

#[test]
fn drain_update_requires_both_specs() {
    let node = Node::new();

    node.agent()
        .args(["drain", "--job", "web", "--mode", "update"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--old and --new are required"));
}

#[test]
fn drain_rejects_non_integer_answer() {
    let node = Node::new();
    script(&node.base().join("jobs/web/bin/drain"), "echo soon");

    node.agent()
        .args(["drain", "--job", "web", "--mode", "shutdown"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "Error: Script did not return a signed integer",
        ));
}
