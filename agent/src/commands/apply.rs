//! `node-agent apply`: converge this node to an apply spec.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::application::services::applier::Applier;
use crate::application::services::job_applier::RenderedJobApplier;
use crate::application::services::package_applier::CompiledPackageApplier;
use crate::domain::ApplySpec;

#[derive(Args)]
pub struct ApplyArgs {
    /// Apply spec (JSON)
    #[arg(long, value_name = "FILE")]
    pub spec: PathBuf,
}

/// Run the apply command.
///
/// # Errors
///
/// Returns an error if the spec is invalid or any apply step fails.
pub async fn run(app: &AppContext, args: &ApplyArgs) -> Result<()> {
    let bytes = std::fs::read(&args.spec)
        .with_context(|| format!("cannot read {}", args.spec.display()))?;
    let spec = ApplySpec::from_json(&bytes)
        .with_context(|| format!("cannot load apply spec {}", args.spec.display()))?;

    let supervisor = app.supervisor();
    let jobs = RenderedJobApplier::new(
        app.job_bundles(),
        &app.blobstore,
        &app.compressor,
        &app.fs,
        &supervisor,
    );
    let packages = CompiledPackageApplier::new(app.package_bundles(), &app.blobstore, &app.compressor);

    Applier::new(
        &jobs,
        &packages,
        &supervisor,
        &app.logrotate,
        &app.config.system_user,
        app.dirs.base_dir(),
    )
    .apply(&spec)
    .await?;

    println!(
        "applied {} job(s) and {} package(s)",
        spec.job.templates.len(),
        spec.packages.len()
    );
    Ok(())
}
