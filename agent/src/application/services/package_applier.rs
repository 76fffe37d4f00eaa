//! Package applier: install one compiled package straight into its bundle.

use anyhow::{Context, Result};

use crate::application::ports::{Blobstore, Compressor};
use crate::application::services::bundle::{self, Bundle, BundleCollection};
use crate::domain::Package;

#[allow(async_fn_in_trait)]
pub trait PackageApplier {
    /// Fetch, extract and enable `package`.
    async fn apply(&self, package: &Package) -> Result<()>;
    /// Remove every installed package version not in `packages`.
    fn keep_only(&self, packages: &[Package]) -> Result<()>;
}

pub struct CompiledPackageApplier<'a, BC, B, C> {
    packages: BC,
    blobstore: &'a B,
    compressor: &'a C,
}

impl<'a, BC, B, C> CompiledPackageApplier<'a, BC, B, C>
where
    BC: BundleCollection,
    B: Blobstore,
    C: Compressor,
{
    pub fn new(packages: BC, blobstore: &'a B, compressor: &'a C) -> Self {
        Self {
            packages,
            blobstore,
            compressor,
        }
    }
}

impl<BC, B, C> PackageApplier for CompiledPackageApplier<'_, BC, B, C>
where
    BC: BundleCollection,
    B: Blobstore,
    C: Compressor,
{
    async fn apply(&self, package: &Package) -> Result<()> {
        tracing::info!(package = %package.name, version = %package.version, "applying package");

        let bundle = self.packages.get(package).context("Getting package bundle")?;
        let install_path = bundle.install().context("Installing package bundle")?;

        let blob = self
            .blobstore
            .get(&package.source.blobstore_id, &package.source.sha1)
            .await
            .context("Fetching package blob")?;

        let result = self
            .compressor
            .decompress_file_to_dir(&blob, &install_path)
            .context("Decompressing package files");

        if let Err(e) = self.blobstore.clean_up(&blob) {
            tracing::warn!(blob = %blob.display(), error = %e, "failed to clean up package blob");
        }
        result?;

        bundle.enable().context("Enabling package")?;
        Ok(())
    }

    fn keep_only(&self, packages: &[Package]) -> Result<()> {
        bundle::keep_only(&self.packages, packages, "package")
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
