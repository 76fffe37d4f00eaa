//! Application context: the production adapters, wired once from the agent
//! configuration and borrowed by every command handler.

use std::time::Duration;

use crate::application::services::bundle::FileBundleCollection;
use crate::domain::config::{JOBS_COLLECTION, PACKAGES_COLLECTION};
use crate::domain::{AgentConfig, DirectoriesProvider};
use crate::infra::blobstore::LocalBlobstore;
use crate::infra::clock::TokioSleeper;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::compressor::TarGzCompressor;
use crate::infra::fs::OsFileSystem;
use crate::infra::logrotate::LogrotateFile;
use crate::infra::monit::MonitJobSupervisor;

pub struct AppContext {
    pub config: AgentConfig,
    pub dirs: DirectoriesProvider,
    pub fs: OsFileSystem,
    pub runner: TokioCommandRunner,
    pub compressor: TarGzCompressor,
    pub blobstore: LocalBlobstore,
    pub logrotate: LogrotateFile,
    pub sleeper: TokioSleeper,
}

impl AppContext {
    #[must_use]
    pub fn new(config: AgentConfig) -> Self {
        let dirs = config.dirs();
        let tmp = dirs.tmp_dir();
        Self {
            fs: OsFileSystem::new(&tmp),
            runner: TokioCommandRunner::new(config.command_timeout_secs.map(Duration::from_secs)),
            compressor: TarGzCompressor::new(&tmp),
            blobstore: LocalBlobstore::new(config.blobstore_dir(), &tmp),
            logrotate: LogrotateFile::new(&config.logrotate_dir),
            sleeper: TokioSleeper,
            dirs,
            config,
        }
    }

    /// Job bundles: `<base>/data/jobs/<name>/<version>`, enabled at `<base>/jobs/<name>`.
    #[must_use]
    pub fn job_bundles(&self) -> FileBundleCollection<'_, OsFileSystem> {
        FileBundleCollection::new(
            self.dirs.base_dir(),
            self.dirs.base_dir(),
            JOBS_COLLECTION,
            &self.fs,
        )
    }

    /// Package bundles: `<base>/data/packages/<name>/<version>`, enabled at
    /// `<base>/packages/<name>`.
    #[must_use]
    pub fn package_bundles(&self) -> FileBundleCollection<'_, OsFileSystem> {
        FileBundleCollection::new(
            self.dirs.base_dir(),
            self.dirs.base_dir(),
            PACKAGES_COLLECTION,
            &self.fs,
        )
    }

    #[must_use]
    pub fn supervisor(&self) -> MonitJobSupervisor<'_, TokioCommandRunner> {
        MonitJobSupervisor::new(self.dirs.monit_jobs_dir(), &self.runner)
            .with_binary(&self.config.monit_bin)
    }
}
