//! Package compiler: build a package from source against its installed
//! dependencies and upload the result as a new blob.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::{Blobstore, CommandRunner, ComplexCommand, Compressor, FileSystem};
use crate::application::services::bundle::{Bundle, BundleCollection};
use crate::application::services::ensure_success;
use crate::domain::config::SYSTEM_PATH;
use crate::domain::Package;

const PACKAGING_SCRIPT: &str = "packaging";
const DIR_MODE: u32 = 0o755;

/// Identity of an uploaded compiled package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledBlob {
    pub blob_id: String,
    pub sha1: String,
}

#[allow(async_fn_in_trait)]
pub trait Compiler {
    /// Compile `package` with `deps` installed, returning the uploaded blob.
    async fn compile(&self, package: &Package, deps: &[Package]) -> Result<CompiledBlob>;
}

pub struct PackageCompiler<'a, BC, B, C, F, R> {
    packages: BC,
    compile_dir: PathBuf,
    blobstore: &'a B,
    compressor: &'a C,
    fs: &'a F,
    runner: &'a R,
}

impl<'a, BC, B, C, F, R> PackageCompiler<'a, BC, B, C, F, R>
where
    BC: BundleCollection,
    B: Blobstore,
    C: Compressor,
    F: FileSystem,
    R: CommandRunner,
{
    pub fn new(
        packages: BC,
        compile_dir: impl Into<PathBuf>,
        blobstore: &'a B,
        compressor: &'a C,
        fs: &'a F,
        runner: &'a R,
    ) -> Self {
        Self {
            packages,
            compile_dir: compile_dir.into(),
            blobstore,
            compressor,
            fs,
            runner,
        }
    }

    /// Fetch `package`'s blob, run `extract` on it, and always clean the blob up.
    async fn with_blob(
        &self,
        package: &Package,
        extract: impl FnOnce(&Path) -> Result<()>,
    ) -> Result<()> {
        let blob = self
            .blobstore
            .get(&package.source.blobstore_id, &package.source.sha1)
            .await
            .with_context(|| format!("Fetching package {}", package.name))?;

        let result = extract(&blob);

        if let Err(e) = self.blobstore.clean_up(&blob) {
            tracing::warn!(blob = %blob.display(), error = %e, "failed to clean up package blob");
        }
        result
    }

    async fn install_dependency(&self, dep: &Package) -> Result<()> {
        tracing::debug!(package = %dep.name, version = %dep.version, "installing dependency");
        let bundle = self.packages.get(dep)?;

        self.with_blob(dep, |blob| {
            bundle.uninstall()?;
            let install_path = bundle.install()?;
            self.compressor
                .decompress_file_to_dir(blob, &install_path)
                .with_context(|| format!("Decompressing package {}", dep.name))
        })
        .await?;

        bundle.enable()?;
        Ok(())
    }

    /// Unpack the source into a sibling directory, then swap it into place so
    /// a half-extracted tree is never visible at `compile_path`.
    async fn fetch_source(&self, package: &Package, compile_path: &Path) -> Result<()> {
        let unpack = self.compile_dir.join(format!(
            "{}-unpack-{}",
            package.name,
            uuid::Uuid::new_v4().simple()
        ));

        self.with_blob(package, |blob| {
            self.fs
                .mkdir_all(&unpack, DIR_MODE)
                .context("Creating unpack directory")?;
            let extracted = self
                .compressor
                .decompress_file_to_dir(blob, &unpack)
                .context("Decompressing package source");
            if extracted.is_err()
                && let Err(e) = self.fs.remove_all(&unpack)
            {
                tracing::warn!(dir = %unpack.display(), error = %e, "failed to remove unpack dir");
            }
            extracted?;
            self.fs
                .remove_all(compile_path)
                .context("Removing previous compile directory")?;
            self.fs
                .rename(&unpack, compile_path)
                .context("Moving source into compile directory")
        })
        .await
    }

    async fn run_packaging(
        &self,
        package: &Package,
        compile_path: &Path,
        install_target: &Path,
    ) -> Result<()> {
        let script = compile_path.join(PACKAGING_SCRIPT);
        if !self.fs.file_exists(&script) {
            tracing::debug!(package = %package.name, "no packaging script");
            return Ok(());
        }

        let command = ComplexCommand {
            name: "bash".to_string(),
            args: vec!["-x".to_string(), PACKAGING_SCRIPT.to_string()],
            env: BTreeMap::from([
                ("PATH".to_string(), SYSTEM_PATH.to_string()),
                (
                    "BOSH_COMPILE_TARGET".to_string(),
                    compile_path.display().to_string(),
                ),
                (
                    "BOSH_INSTALL_TARGET".to_string(),
                    install_target.display().to_string(),
                ),
                ("BOSH_PACKAGE_NAME".to_string(), package.name.clone()),
                ("BOSH_PACKAGE_VERSION".to_string(), package.version.clone()),
            ]),
            working_dir: Some(compile_path.to_path_buf()),
        };

        tracing::info!(package = %package.name, "running packaging script");
        let output = self
            .runner
            .run_complex_command(&command)
            .await
            .context("Running packaging script")?;
        ensure_success(&output, "packaging script").context("Running packaging script")
    }
}

impl<BC, B, C, F, R> Compiler for PackageCompiler<'_, BC, B, C, F, R>
where
    BC: BundleCollection,
    B: Blobstore,
    C: Compressor,
    F: FileSystem,
    R: CommandRunner,
{
    async fn compile(&self, package: &Package, deps: &[Package]) -> Result<CompiledBlob> {
        tracing::info!(
            package = %package.name,
            version = %package.version,
            deps = deps.len(),
            "compiling package"
        );

        for dep in deps {
            self.install_dependency(dep)
                .await
                .with_context(|| format!("Installing dependent package {}", dep.name))?;
        }

        let compile_path = self.compile_dir.join(&package.name);
        self.fetch_source(package, &compile_path)
            .await
            .context("Fetching package source")?;

        let bundle = self.packages.get(package).context("Getting package bundle")?;
        bundle.uninstall().context("Clearing install target")?;
        let install_path = bundle.install().context("Creating install target")?;
        let install_target = bundle.enable().context("Enabling install target")?;

        self.run_packaging(package, &compile_path, &install_target)
            .await?;

        let tarball = self
            .compressor
            .compress_files_in_dir(&install_path)
            .context("Compressing compiled package")?;

        let uploaded = self
            .blobstore
            .create(&tarball)
            .await
            .context("Uploading compiled package");

        if let Err(e) = self.compressor.clean_up(&tarball) {
            tracing::warn!(tarball = %tarball.display(), error = %e, "failed to clean up tarball");
        }
        let (blob_id, sha1) = uploaded?;

        tracing::info!(package = %package.name, blob_id = %blob_id, "compiled package uploaded");
        Ok(CompiledBlob { blob_id, sha1 })
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
