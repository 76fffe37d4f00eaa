//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::cli`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use anyhow::Result;

use crate::domain::AgentConfig;

// ── Value Types ───────────────────────────────────────────────────────────────

/// An external program invocation with a fully explicit environment.
///
/// Runners must not inherit the parent environment: `env` is everything the
/// child sees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplexCommand {
    /// Program name or path.
    pub name: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// Working directory; `None` keeps the runner's current directory.
    pub working_dir: Option<PathBuf>,
}

impl ComplexCommand {
    /// Human-readable rendering for logs and error messages.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.name.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ── Artifact Store Port ───────────────────────────────────────────────────────

/// Content-addressed blob storage.
#[allow(async_fn_in_trait)]
pub trait Blobstore {
    /// Fetch a blob to a local file, verifying its fingerprint.
    async fn get(&self, blob_id: &str, fingerprint: &str) -> Result<PathBuf>;
    /// Remove a file previously returned by `get`.
    fn clean_up(&self, path: &Path) -> Result<()>;
    /// Upload a local file, returning `(blob_id, fingerprint)`.
    async fn create(&self, path: &Path) -> Result<(String, String)>;
}

// ── Filesystem Port ───────────────────────────────────────────────────────────

/// Raw filesystem operations used by bundles, appliers and the compiler.
pub trait FileSystem {
    /// Create `path` and any missing parents with `mode`.
    fn mkdir_all(&self, path: &Path, mode: u32) -> Result<()>;
    /// `true` if anything (including a dangling symlink) exists at `path`.
    fn file_exists(&self, path: &Path) -> bool;
    /// Point `link` at `target`, atomically replacing whatever `link` was.
    fn symlink(&self, target: &Path, link: &Path) -> Result<()>;
    /// Target of the symlink at `path`.
    fn read_link(&self, path: &Path) -> Result<PathBuf>;
    /// Remove a file, symlink or directory tree. Missing paths are fine.
    fn remove_all(&self, path: &Path) -> Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    /// Create a fresh, uniquely named temporary directory.
    fn temp_dir(&self, prefix: &str) -> Result<PathBuf>;
    /// Sorted paths matching `pattern`; wildcards are only honoured in the
    /// final component. A leading `.` is matched by `*` and `?` like any
    /// other character.
    fn glob(&self, pattern: &Path) -> Result<Vec<PathBuf>>;
    fn chmod(&self, path: &Path, mode: u32) -> Result<()>;
    /// Recursively merge the contents of `src` into `dst`, overwriting files
    /// that already exist there.
    fn copy_dir_entries(&self, src: &Path, dst: &Path) -> Result<()>;
    fn write_to_file(&self, path: &Path, content: &[u8]) -> Result<()>;
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run `command` to completion and capture its output.
    ///
    /// A non-zero exit is reported through `Output::status`, not as `Err`;
    /// `Err` means the process could not be run at all.
    async fn run_complex_command(&self, command: &ComplexCommand) -> Result<Output>;
}

// ── Compression Port ──────────────────────────────────────────────────────────

/// Archive extraction and creation.
pub trait Compressor {
    /// Extract `tarball` into the existing directory `dir`.
    fn decompress_file_to_dir(&self, tarball: &Path, dir: &Path) -> Result<()>;
    /// Archive the contents of `dir` (not `dir` itself) into a new tarball.
    fn compress_files_in_dir(&self, dir: &Path) -> Result<PathBuf>;
    /// Remove a tarball produced by `compress_files_in_dir`.
    fn clean_up(&self, tarball: &Path) -> Result<()>;
}

// ── Process Supervisor Port ───────────────────────────────────────────────────

/// Stages service definitions for the process supervisor.
#[allow(async_fn_in_trait)]
pub trait JobSupervisor {
    /// Stage `config_path` as service `name` at `index`. Does not reload.
    fn add_job(&self, name: &str, index: usize, config_path: &Path) -> Result<()>;
    /// Drop every staged service definition. Does not reload.
    fn remove_all_jobs(&self) -> Result<()>;
    /// Make the staged definitions active.
    async fn reload(&self) -> Result<()>;
}

// ── Log Rotation Port ─────────────────────────────────────────────────────────

pub trait LogrotateSetup {
    /// Rotate job logs under `base_path` for `user` once they reach `max_size`.
    fn setup_logrotate(&self, user: &str, base_path: &Path, max_size: &str) -> Result<()>;
}

// ── Clock Port ────────────────────────────────────────────────────────────────

/// Waits between drain script polls.
#[allow(async_fn_in_trait)]
pub trait Sleeper {
    async fn sleep(&self, duration: Duration);
}

// ── Configuration Port ────────────────────────────────────────────────────────

/// Abstracts where agent configuration is read from.
pub trait ConfigStore {
    /// Load the configuration, falling back to defaults when none exists.
    fn load(&self) -> Result<AgentConfig>;
    /// The file the configuration is read from.
    fn path(&self) -> &Path;
}
