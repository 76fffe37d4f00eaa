//! Job applier: install one job from its rendered archive and stage its
//! supervisor configuration.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::{Blobstore, Compressor, FileSystem, JobSupervisor};
use crate::application::services::bundle::{self, Bundle, BundleCollection};
use crate::domain::Job;

const TEMP_DIR_PREFIX: &str = "bosh-agent-applier-job";
const EXECUTABLE_MODE: u32 = 0o755;

/// Applies and configures single jobs.
#[allow(async_fn_in_trait)]
pub trait JobApplier {
    /// Fetch, extract and enable `job`.
    async fn apply(&self, job: &Job) -> Result<()>;
    /// Stage the job's supervisor config at `index`. Does not reload.
    fn configure(&self, job: &Job, index: usize) -> Result<()>;
    /// Remove every installed job version not in `jobs`.
    fn keep_only(&self, jobs: &[Job]) -> Result<()>;
}

/// Installs jobs into a bundle collection from blobstore archives.
pub struct RenderedJobApplier<'a, BC, B, C, F, S> {
    jobs: BC,
    blobstore: &'a B,
    compressor: &'a C,
    fs: &'a F,
    supervisor: &'a S,
}

impl<'a, BC, B, C, F, S> RenderedJobApplier<'a, BC, B, C, F, S>
where
    BC: BundleCollection,
    B: Blobstore,
    C: Compressor,
    F: FileSystem,
    S: JobSupervisor,
{
    pub fn new(
        jobs: BC,
        blobstore: &'a B,
        compressor: &'a C,
        fs: &'a F,
        supervisor: &'a S,
    ) -> Self {
        Self {
            jobs,
            blobstore,
            compressor,
            fs,
            supervisor,
        }
    }

    async fn download_and_extract(&self, job: &Job, install_path: &Path) -> Result<()> {
        let blob = self
            .blobstore
            .get(&job.source.blobstore_id, &job.source.sha1)
            .await
            .context("Getting job source from blobstore")?;

        let result = self.extract_into(&blob, job, install_path);

        if let Err(e) = self.blobstore.clean_up(&blob) {
            tracing::warn!(blob = %blob.display(), error = %e, "failed to clean up job blob");
        }
        result
    }

    fn extract_into(&self, blob: &Path, job: &Job, install_path: &Path) -> Result<()> {
        let tmp = self
            .fs
            .temp_dir(TEMP_DIR_PREFIX)
            .context("Getting temp dir")?;

        let result = self.copy_from_archive(blob, &tmp, job, install_path);

        if let Err(e) = self.fs.remove_all(&tmp) {
            tracing::warn!(dir = %tmp.display(), error = %e, "failed to remove temp dir");
        }
        result
    }

    fn copy_from_archive(
        &self,
        blob: &Path,
        tmp: &Path,
        job: &Job,
        install_path: &Path,
    ) -> Result<()> {
        self.compressor
            .decompress_file_to_dir(blob, tmp)
            .context("Decompressing files into temp dir")?;
        let source = archive_subdir(tmp, &job.source.path_in_archive)?;
        self.fs
            .copy_dir_entries(&source, install_path)
            .context("Copying job files to install dir")
    }

    fn make_executable(&self, install_path: &Path) -> Result<()> {
        let files = self
            .fs
            .glob(&install_path.join("bin").join("*"))
            .context("Finding job binaries")?;
        for file in files {
            self.fs
                .chmod(&file, EXECUTABLE_MODE)
                .with_context(|| format!("Making {} executable", file.display()))?;
        }
        Ok(())
    }
}

/// Resolve `path_in_archive` under `root`, refusing anything that escapes it.
fn archive_subdir(root: &Path, path_in_archive: &str) -> Result<PathBuf> {
    let rel = Path::new(path_in_archive);
    anyhow::ensure!(
        rel.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir)),
        "Invalid path in archive: {path_in_archive}"
    );
    Ok(root.join(rel))
}

impl<BC, B, C, F, S> JobApplier for RenderedJobApplier<'_, BC, B, C, F, S>
where
    BC: BundleCollection,
    B: Blobstore,
    C: Compressor,
    F: FileSystem,
    S: JobSupervisor,
{
    async fn apply(&self, job: &Job) -> Result<()> {
        tracing::info!(job = %job.name, version = %job.version, "applying job");

        let bundle = self.jobs.get(job).context("Getting job bundle")?;
        let install_path = bundle.install().context("Installing job bundle")?;

        self.download_and_extract(job, &install_path).await?;
        self.make_executable(&install_path)?;

        bundle.enable().context("Enabling job bundle")?;
        Ok(())
    }

    fn configure(&self, job: &Job, index: usize) -> Result<()> {
        let bundle = self.jobs.get(job).context("Getting job bundle")?;
        let install_path = bundle
            .install_path()
            .context("Getting job install path")?;

        let monit = install_path.join("monit");
        if self.fs.file_exists(&monit) {
            tracing::debug!(job = %job.name, index, "staging monit file");
            self.supervisor
                .add_job(&job.name, index, &monit)
                .context("Adding monit configuration")?;
        }

        let extra = self
            .fs
            .glob(&install_path.join("*.monit"))
            .context("Looking for additional monit files")?;
        for path in extra {
            let label = path
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_default();
            let label = label.strip_suffix(".monit").unwrap_or(&label);
            let name = format!("{}_{label}", job.name);
            tracing::debug!(job = %job.name, service = %name, index, "staging monit file");
            self.supervisor
                .add_job(&name, index, &path)
                .with_context(|| format!("Adding additional monit configuration {name}"))?;
        }
        Ok(())
    }

    fn keep_only(&self, jobs: &[Job]) -> Result<()> {
        bundle::keep_only(&self.jobs, jobs, "job")
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
