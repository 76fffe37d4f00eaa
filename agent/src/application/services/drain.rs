//! Drain scripts: ask a job to quiesce before it is replaced or stopped.
//!
//! A drain script is invoked as `<script> <job_change> <hash_change>
//! [updated_package...]` and prints a signed integer. `DrainScript::run`
//! returns that integer as-is; `drain_job` applies the usual reading of it:
//! `n >= 0` waits `n` seconds and finishes, `n < 0` waits `|n|` seconds and
//! polls again with status-check parameters.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, ComplexCommand, FileSystem, Sleeper};
use crate::application::services::ensure_success;
use crate::domain::config::SYSTEM_PATH;
use crate::domain::{DrainError, DrainParams};

#[allow(async_fn_in_trait)]
pub trait DrainScript {
    /// `false` means the job has no drain behavior and should not be drained.
    fn exists(&self) -> bool;
    fn path(&self) -> &Path;
    /// Run the script once and return its numeric answer, uninterpreted.
    async fn run(&self, params: &DrainParams) -> Result<i64>;
}

/// Parse a drain script's stdout as a base-10 signed integer.
///
/// # Errors
///
/// Returns [`DrainError::NotSignedInteger`] for anything else.
pub fn parse_drain_output(stdout: &str) -> Result<i64, DrainError> {
    stdout
        .trim()
        .parse::<i64>()
        .map_err(|_| DrainError::NotSignedInteger)
}

// ── Script backed by a file on disk ──────────────────────────────────────────

pub struct FileDrainScript<'a, F, R> {
    path: PathBuf,
    fs: &'a F,
    runner: &'a R,
}

impl<'a, F: FileSystem, R: CommandRunner> FileDrainScript<'a, F, R> {
    pub fn new(path: impl Into<PathBuf>, fs: &'a F, runner: &'a R) -> Self {
        Self {
            path: path.into(),
            fs,
            runner,
        }
    }

    fn command(&self, params: &DrainParams) -> Result<ComplexCommand> {
        let mut args = vec![
            params.job_change().to_string(),
            params.hash_change().to_string(),
        ];
        args.extend(params.updated_packages());

        let env = BTreeMap::from([
            ("PATH".to_string(), SYSTEM_PATH.to_string()),
            (
                "BOSH_JOB_STATE".to_string(),
                params.job_state().context("Getting job state")?,
            ),
            (
                "BOSH_JOB_NEXT_STATE".to_string(),
                params.job_next_state().context("Getting job next state")?,
            ),
        ]);

        Ok(ComplexCommand {
            name: self.path.display().to_string(),
            args,
            env,
            working_dir: None,
        })
    }
}

impl<F: FileSystem, R: CommandRunner> DrainScript for FileDrainScript<'_, F, R> {
    fn exists(&self) -> bool {
        self.fs.file_exists(&self.path)
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn run(&self, params: &DrainParams) -> Result<i64> {
        let command = self.command(params)?;
        tracing::info!(script = %command.display(), "running drain script");

        let output = self
            .runner
            .run_complex_command(&command)
            .await
            .context("Running drain script")?;
        ensure_success(&output, "drain script").context("Running drain script")?;

        let value = parse_drain_output(&String::from_utf8_lossy(&output.stdout))?;
        tracing::debug!(value, "drain script answered");
        Ok(value)
    }
}

/// Locates each job's drain script at `<jobs_dir>/<job>/bin/drain`.
pub struct DrainScriptProvider<'a, F, R> {
    jobs_dir: PathBuf,
    fs: &'a F,
    runner: &'a R,
}

impl<'a, F: FileSystem, R: CommandRunner> DrainScriptProvider<'a, F, R> {
    pub fn new(jobs_dir: impl Into<PathBuf>, fs: &'a F, runner: &'a R) -> Self {
        Self {
            jobs_dir: jobs_dir.into(),
            fs,
            runner,
        }
    }

    #[must_use]
    pub fn new_drain_script(&self, job_name: &str) -> FileDrainScript<'a, F, R> {
        FileDrainScript::new(
            self.jobs_dir.join(job_name).join("bin").join("drain"),
            self.fs,
            self.runner,
        )
    }
}

// ── Drain loop ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The job has no drain script.
    Skipped,
    /// The script settled after this much total waiting.
    Drained { waited: Duration },
}

/// Run `script` until it reports a non-negative wait, sleeping as told.
///
/// # Errors
///
/// Returns the first script failure.
pub async fn drain_job(
    script: &impl DrainScript,
    params: &DrainParams,
    sleeper: &impl Sleeper,
) -> Result<DrainOutcome> {
    if !script.exists() {
        tracing::info!(script = %script.path().display(), "no drain script, skipping");
        return Ok(DrainOutcome::Skipped);
    }

    let mut params = params.clone();
    let mut waited = Duration::ZERO;
    loop {
        let value = script.run(&params).await?;
        let wait = Duration::from_secs(value.unsigned_abs());
        if !wait.is_zero() {
            tracing::info!(seconds = wait.as_secs(), "waiting for drain");
            sleeper.sleep(wait).await;
            waited = waited.saturating_add(wait);
        }
        if value >= 0 {
            return Ok(DrainOutcome::Drained { waited });
        }
        params = params.to_status();
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
