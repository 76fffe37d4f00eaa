//! Applying jobs and whole apply specs with real archives, a directory
//! blobstore and a scripted stand-in for monit.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::path::Path;

use node_agent::application::services::applier::Applier;
use node_agent::application::services::bundle::FileBundleCollection;
use node_agent::application::services::job_applier::{JobApplier, RenderedJobApplier};
use node_agent::application::services::package_applier::CompiledPackageApplier;
use node_agent::domain::spec::{JobSpec, JobTemplateSpec, PackageSpec, RenderedTemplatesArchiveSpec};
use node_agent::domain::{ApplySpec, DirectoriesProvider, Job, JobSource};
use node_agent::infra::blobstore::LocalBlobstore;
use node_agent::infra::command_runner::TokioCommandRunner;
use node_agent::infra::compressor::TarGzCompressor;
use node_agent::infra::fs::OsFileSystem;
use node_agent::infra::logrotate::LogrotateFile;
use node_agent::infra::monit::MonitJobSupervisor;
use tempfile::TempDir;

use crate::support::{mode, script, store_blob, tarball};

struct Node {
    dir: TempDir,
    fs: OsFileSystem,
    compressor: TarGzCompressor,
    blobstore: LocalBlobstore,
    runner: TokioCommandRunner,
    logrotate: LogrotateFile,
}

impl Node {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let tmp = dir.path().join("data/tmp");
        std::fs::create_dir_all(&tmp).unwrap();
        Self {
            fs: OsFileSystem::new(&tmp),
            compressor: TarGzCompressor::new(&tmp),
            blobstore: LocalBlobstore::new(dir.path().join("data/blobs"), &tmp),
            runner: TokioCommandRunner::new(None),
            logrotate: LogrotateFile::new(dir.path().join("logrotate.d")),
            dir,
        }
    }

    fn base(&self) -> &Path {
        self.dir.path()
    }

    fn dirs(&self) -> DirectoriesProvider {
        DirectoriesProvider::new(self.base())
    }

    fn add_blob(&self, blob_id: &str, files: &[(&str, &[u8], u32)]) -> String {
        let scratch = self.base().join("data/tmp");
        let tgz = tarball(&scratch, files);
        store_blob(&self.base().join("data/blobs"), blob_id, &tgz)
    }

    /// Monit stand-in that appends its arguments to `monit.log`.
    fn fake_monit(&self) -> std::path::PathBuf {
        let path = self.base().join("bin/monit");
        let log = self.base().join("monit.log");
        script(&path, &format!("echo \"$@\" >> {}", log.display()));
        path
    }

    fn supervisor(&self) -> MonitJobSupervisor<'_, TokioCommandRunner> {
        MonitJobSupervisor::new(self.dirs().monit_jobs_dir(), &self.runner)
            .with_binary(self.fake_monit())
    }
}

#[tokio::test]
async fn apply_installs_archive_subdir_with_executable_bin() {
    let node = Node::new();
    let sha1 = node.add_blob(
        "rendered",
        &[
            ("web/bin/run", b"#!/bin/sh\n", 0o644),
            ("web/config/app.conf", b"port=80", 0o644),
            ("web/monit", b"check process web", 0o644),
            ("worker/bin/run", b"#!/bin/sh\n", 0o644),
        ],
    );
    let job = Job {
        name: "web".to_string(),
        version: "1".to_string(),
        source: JobSource {
            blobstore_id: "rendered".to_string(),
            sha1: sha1.clone(),
            path_in_archive: "web".to_string(),
        },
    };
    let supervisor = node.supervisor();
    let jobs = FileBundleCollection::new(node.base(), node.base(), "jobs", &node.fs);
    let applier = RenderedJobApplier::new(
        jobs,
        &node.blobstore,
        &node.compressor,
        &node.fs,
        &supervisor,
    );

    applier.apply(&job).await.unwrap();

    let install = node.base().join(format!("data/jobs/web/1-{sha1}"));
    assert_eq!(std::fs::read_link(node.base().join("jobs/web")).unwrap(), install);
    assert_eq!(mode(&install.join("bin/run")), 0o755);
    assert_eq!(mode(&install.join("config/app.conf")), 0o644);
    assert!(!install.join("worker").exists());
    let leftovers = std::fs::read_dir(node.base().join("data/tmp"))
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            name.starts_with("bosh-agent-applier-job") || name.starts_with("node-agent-blob-")
        })
        .count();
    assert_eq!(leftovers, 0);

    applier.configure(&job, 0).unwrap();
    let staged = node.dirs().monit_jobs_dir().join("0000_web.monitrc");
    assert_eq!(std::fs::read(staged).unwrap(), b"check process web");
}

#[tokio::test]
async fn applier_converges_jobs_packages_and_supervisor() {
    let node = Node::new();
    let rendered_sha1 = node.add_blob(
        "rendered",
        &[
            ("web/bin/ctl", b"#!/bin/sh\n", 0o644),
            ("web/monit", b"check process web", 0o644),
            ("web/worker.monit", b"check process worker", 0o644),
        ],
    );
    let ruby_sha1 = node.add_blob("ruby-blob", &[("bin/ruby", b"ruby", 0o755)]);

    // A leftover version from an earlier deploy.
    let stale = node.base().join("data/packages/ruby/0-old");
    std::fs::create_dir_all(&stale).unwrap();

    let spec = ApplySpec {
        job: JobSpec {
            name: Some("web".to_string()),
            sha1: None,
            templates: vec![JobTemplateSpec {
                name: "web".to_string(),
                version: "1".to_string(),
                sha1: String::new(),
                blobstore_id: String::new(),
            }],
        },
        packages: BTreeMap::from([(
            "ruby".to_string(),
            PackageSpec {
                name: "ruby".to_string(),
                version: "3".to_string(),
                sha1: ruby_sha1.clone(),
                blobstore_id: "ruby-blob".to_string(),
            },
        )]),
        rendered_templates_archive: Some(RenderedTemplatesArchiveSpec {
            blobstore_id: "rendered".to_string(),
            sha1: rendered_sha1.clone(),
        }),
        ..ApplySpec::default()
    };

    let supervisor = node.supervisor();
    let jobs = RenderedJobApplier::new(
        FileBundleCollection::new(node.base(), node.base(), "jobs", &node.fs),
        &node.blobstore,
        &node.compressor,
        &node.fs,
        &supervisor,
    );
    let packages = CompiledPackageApplier::new(
        FileBundleCollection::new(node.base(), node.base(), "packages", &node.fs),
        &node.blobstore,
        &node.compressor,
    );

    Applier::new(&jobs, &packages, &supervisor, &node.logrotate, "vcap", node.base())
        .apply(&spec)
        .await
        .unwrap();

    let ruby = node.base().join(format!("data/packages/ruby/3-{ruby_sha1}"));
    assert_eq!(std::fs::read_link(node.base().join("packages/ruby")).unwrap(), ruby);
    assert_eq!(std::fs::read(ruby.join("bin/ruby")).unwrap(), b"ruby");
    assert!(!stale.exists());

    let monit_dir = node.dirs().monit_jobs_dir();
    let mut staged: Vec<String> = std::fs::read_dir(&monit_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    staged.sort();
    assert_eq!(staged, ["0000_web.monitrc", "0000_web_worker.monitrc"]);

    let monit_log = std::fs::read_to_string(node.base().join("monit.log")).unwrap();
    assert_eq!(monit_log, "reload\n");

    let logrotate = std::fs::read_to_string(node.base().join("logrotate.d/vcap")).unwrap();
    assert!(logrotate.contains("size=50M"));
}
