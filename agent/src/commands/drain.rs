//! `node-agent drain`: run a job's drain script.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use crate::app::AppContext;
use crate::application::services::drain::{
    DrainOutcome, DrainScript, DrainScriptProvider, drain_job,
};
use crate::domain::{ApplySpec, DrainParams};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DrainMode {
    Update,
    Shutdown,
    Status,
}

#[derive(Args)]
pub struct DrainArgs {
    /// Job whose drain script to run
    #[arg(long)]
    pub job: String,

    #[arg(long, value_enum)]
    pub mode: DrainMode,

    /// Currently applied spec (JSON)
    #[arg(long, value_name = "FILE")]
    pub old: Option<PathBuf>,

    /// Spec about to be applied (JSON)
    #[arg(long, value_name = "FILE")]
    pub new: Option<PathBuf>,

    /// Sleep as the script asks and keep polling until it settles
    #[arg(long)]
    pub wait: bool,
}

fn load_spec(path: &Path) -> Result<ApplySpec> {
    let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    ApplySpec::from_json(&bytes).with_context(|| format!("cannot load apply spec {}", path.display()))
}

fn params(args: &DrainArgs) -> Result<DrainParams> {
    let old = args.old.as_deref().map(load_spec).transpose()?;
    let new = args.new.as_deref().map(load_spec).transpose()?;
    Ok(match args.mode {
        DrainMode::Shutdown => DrainParams::shutdown(old, new),
        DrainMode::Status => DrainParams::status(old, new),
        DrainMode::Update => {
            let (Some(old), Some(new)) = (old, new) else {
                anyhow::bail!("--old and --new are required for update drains");
            };
            DrainParams::update(old, new)
        }
    })
}

/// Run the drain command.
///
/// Without `--wait` prints the script's raw answer; with it, prints the total
/// time waited.
///
/// # Errors
///
/// Returns an error if the specs cannot be loaded or the script fails.
pub async fn run(app: &AppContext, args: &DrainArgs) -> Result<()> {
    let params = params(args)?;
    let provider = DrainScriptProvider::new(app.dirs.jobs_dir(), &app.fs, &app.runner);
    let script = provider.new_drain_script(&args.job);

    if args.wait {
        match drain_job(&script, &params, &app.sleeper).await? {
            DrainOutcome::Skipped => println!("no drain script for {}", args.job),
            DrainOutcome::Drained { waited } => {
                println!("drained {} after {}s", args.job, waited.as_secs());
            }
        }
        return Ok(());
    }

    if !script.exists() {
        println!("no drain script for {}", args.job);
        return Ok(());
    }
    let value = script.run(&params).await?;
    println!("{value}");
    Ok(())
}
