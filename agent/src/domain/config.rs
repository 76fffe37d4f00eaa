//! Agent configuration schema and the well-known directory layout.
//!
//! Pure functions only. Nothing here touches the filesystem or awaits.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ── Constants ────────────────────────────────────────────────────────────────

/// `PATH` handed to packaging and drain scripts. Nothing else from the
/// agent's own environment leaks into them.
pub const SYSTEM_PATH: &str = "/usr/sbin:/usr/bin:/sbin:/bin";

/// Collection name for job bundles.
pub const JOBS_COLLECTION: &str = "jobs";

/// Collection name for package bundles.
pub const PACKAGES_COLLECTION: &str = "packages";

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level agent configuration, loaded from YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Root of every managed directory, e.g. `/var/vcap`.
    pub base_dir: PathBuf,
    /// Local blobstore directory. Defaults to `<base_dir>/data/blobs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blobstore_dir: Option<PathBuf>,
    /// Directory receiving the generated logrotate stanza.
    pub logrotate_dir: PathBuf,
    /// System user (and group) owning job logs.
    pub system_user: String,
    /// Optional kill-after timeout for external commands. Unset means wait
    /// for as long as the command runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_timeout_secs: Option<u64>,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Supervisor binary; a bare name is looked up on the system `PATH`.
    pub monit_bin: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("/var/vcap"),
            blobstore_dir: None,
            logrotate_dir: PathBuf::from("/etc/logrotate.d"),
            system_user: "vcap".to_string(),
            command_timeout_secs: None,
            log_level: "info".to_string(),
            monit_bin: PathBuf::from("monit"),
        }
    }
}

impl AgentConfig {
    #[must_use]
    pub fn dirs(&self) -> DirectoriesProvider {
        DirectoriesProvider::new(&self.base_dir)
    }

    #[must_use]
    pub fn blobstore_dir(&self) -> PathBuf {
        self.blobstore_dir
            .clone()
            .unwrap_or_else(|| self.dirs().blobs_dir())
    }
}

// ── Directory layout ─────────────────────────────────────────────────────────

/// Derives every managed path from the base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoriesProvider {
    base_dir: PathBuf,
}

impl DirectoriesProvider {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Scratch space where package sources are unpacked and built.
    #[must_use]
    pub fn compile_dir(&self) -> PathBuf {
        self.data_dir().join("compile")
    }

    /// Scratch space for temp dirs, fetched blobs and tarballs.
    #[must_use]
    pub fn tmp_dir(&self) -> PathBuf {
        self.data_dir().join("tmp")
    }

    #[must_use]
    pub fn blobs_dir(&self) -> PathBuf {
        self.data_dir().join("blobs")
    }

    /// Where enabled jobs are linked, `<base>/jobs`.
    #[must_use]
    pub fn jobs_dir(&self) -> PathBuf {
        self.base_dir.join(JOBS_COLLECTION)
    }

    /// Staged supervisor configuration, one file per job.
    #[must_use]
    pub fn monit_jobs_dir(&self) -> PathBuf {
        self.base_dir.join("monit").join("job")
    }

    #[must_use]
    pub fn sys_log_dir(&self) -> PathBuf {
        self.data_dir().join("sys").join("log")
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
