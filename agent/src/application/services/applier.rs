//! Applier: converge this node to an apply spec.
//!
//! Order: apply jobs, apply packages, drop stale versions, restage supervisor
//! config with stable job indices, reload the supervisor once, then set up
//! log rotation. The first failure aborts; re-running is safe.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::{JobSupervisor, LogrotateSetup};
use crate::application::services::job_applier::JobApplier;
use crate::application::services::package_applier::PackageApplier;
use crate::domain::ApplySpec;

pub struct Applier<'a, J, P, S, L> {
    job_applier: &'a J,
    package_applier: &'a P,
    supervisor: &'a S,
    logrotate: &'a L,
    system_user: String,
    base_path: PathBuf,
}

impl<'a, J, P, S, L> Applier<'a, J, P, S, L>
where
    J: JobApplier,
    P: PackageApplier,
    S: JobSupervisor,
    L: LogrotateSetup,
{
    pub fn new(
        job_applier: &'a J,
        package_applier: &'a P,
        supervisor: &'a S,
        logrotate: &'a L,
        system_user: impl Into<String>,
        base_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            job_applier,
            package_applier,
            supervisor,
            logrotate,
            system_user: system_user.into(),
            base_path: base_path.into(),
        }
    }

    /// Drive the node to `spec`.
    ///
    /// # Errors
    ///
    /// Returns the first step failure, wrapped with the job or package name
    /// where one applies. Later steps are not attempted.
    pub async fn apply(&self, spec: &ApplySpec) -> Result<()> {
        let jobs = spec.jobs();
        let packages = spec.packages();

        for job in &jobs {
            self.job_applier
                .apply(job)
                .await
                .with_context(|| format!("Applying job {}", job.name))?;
        }

        for package in &packages {
            self.package_applier
                .apply(package)
                .await
                .with_context(|| format!("Applying package {}", package.name))?;
        }

        self.job_applier
            .keep_only(&jobs)
            .context("Keeping only needed jobs")?;
        self.package_applier
            .keep_only(&packages)
            .context("Keeping only needed packages")?;

        self.supervisor
            .remove_all_jobs()
            .context("Removing all jobs from supervisor")?;
        for (index, job) in jobs.iter().enumerate() {
            self.job_applier
                .configure(job, index)
                .with_context(|| format!("Configuring job {}", job.name))?;
        }

        self.supervisor
            .reload()
            .await
            .context("Reloading job supervisor")?;

        self.logrotate
            .setup_logrotate(&self.system_user, &self.base_path, spec.max_log_file_size())
            .context("Logrotate setup failed")?;

        tracing::info!(
            jobs = jobs.len(),
            packages = packages.len(),
            "apply spec converged"
        );
        Ok(())
    }
}
