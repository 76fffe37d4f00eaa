//! `node-agent compile`: build one package and upload the result.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::application::services::compiler::{Compiler, PackageCompiler};
use crate::commands::read_json;
use crate::domain::Package;
use crate::domain::spec::{PackageSpec, validate_package};

#[derive(Args)]
pub struct CompileArgs {
    /// Package to compile (JSON object with name, version, sha1, blobstore_id)
    #[arg(long, value_name = "FILE")]
    pub package: PathBuf,

    /// Compiled dependencies (JSON object keyed by package name)
    #[arg(long, value_name = "FILE")]
    pub deps: Option<PathBuf>,
}

/// Run the compile command. Prints the uploaded blob as JSON.
///
/// # Errors
///
/// Returns an error if the inputs are invalid or compilation fails.
pub async fn run(app: &AppContext, args: &CompileArgs) -> Result<()> {
    let package: PackageSpec = read_json(&args.package)?;
    validate_package(&package)?;

    let deps: BTreeMap<String, PackageSpec> = match &args.deps {
        Some(path) => read_json(path)?,
        None => BTreeMap::new(),
    };
    for dep in deps.values() {
        validate_package(dep).with_context(|| format!("dependency {}", dep.name))?;
    }
    let deps: Vec<Package> = deps.values().map(Package::from).collect();

    let compiler = PackageCompiler::new(
        app.package_bundles(),
        app.dirs.compile_dir(),
        &app.blobstore,
        &app.compressor,
        &app.fs,
        &app.runner,
    );
    let blob = compiler
        .compile(&Package::from(&package), &deps)
        .await
        .with_context(|| format!("Compiling package {}", package.name))?;

    println!(
        "{}",
        serde_json::json!({ "blob_id": blob.blob_id, "sha1": blob.sha1 })
    );
    Ok(())
}
