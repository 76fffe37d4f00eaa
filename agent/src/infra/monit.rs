//! Monit-backed implementation of the `JobSupervisor` port.
//!
//! Each staged job is a copy of its monit file at
//! `<monit_jobs_dir>/<index:04>_<name>.monitrc`, so monit loads jobs in spec
//! order. Nothing takes effect until `reload`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, ComplexCommand, JobSupervisor};
use crate::domain::config::SYSTEM_PATH;

pub struct MonitJobSupervisor<'a, R> {
    jobs_dir: PathBuf,
    binary: PathBuf,
    runner: &'a R,
}

impl<'a, R: CommandRunner> MonitJobSupervisor<'a, R> {
    pub fn new(jobs_dir: impl Into<PathBuf>, runner: &'a R) -> Self {
        Self {
            jobs_dir: jobs_dir.into(),
            binary: PathBuf::from("monit"),
            runner,
        }
    }

    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    fn staged_path(&self, name: &str, index: usize) -> PathBuf {
        self.jobs_dir.join(format!("{index:04}_{name}.monitrc"))
    }
}

impl<R: CommandRunner> JobSupervisor for MonitJobSupervisor<'_, R> {
    fn add_job(&self, name: &str, index: usize, config_path: &Path) -> Result<()> {
        std::fs::create_dir_all(&self.jobs_dir)
            .with_context(|| format!("creating {}", self.jobs_dir.display()))?;
        let staged = self.staged_path(name, index);
        std::fs::copy(config_path, &staged).with_context(|| {
            format!("copying {} to {}", config_path.display(), staged.display())
        })?;
        tracing::debug!(job = name, index, path = %staged.display(), "staged monit job");
        Ok(())
    }

    fn remove_all_jobs(&self) -> Result<()> {
        if self.jobs_dir.exists() {
            std::fs::remove_dir_all(&self.jobs_dir)
                .with_context(|| format!("removing {}", self.jobs_dir.display()))?;
        }
        std::fs::create_dir_all(&self.jobs_dir)
            .with_context(|| format!("creating {}", self.jobs_dir.display()))
    }

    async fn reload(&self) -> Result<()> {
        let command = ComplexCommand {
            name: self.binary.to_string_lossy().into_owned(),
            args: vec!["reload".to_string()],
            env: BTreeMap::from([("PATH".to_string(), SYSTEM_PATH.to_string())]),
            working_dir: None,
        };
        let output = self.runner.run_complex_command(&command).await?;
        if !output.status.success() {
            anyhow::bail!(
                "monit reload failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        tracing::info!("monit reloaded");
        Ok(())
    }
}
