//! Versioned bundles: install a version side by side with others, then
//! activate exactly one of them through a symlink.
//!
//! Layout for collection `jobs`, bundle `nginx`, version `3-abc`:
//!
//! ```text
//! <base>/data/jobs/nginx/3-abc   install path (one per version)
//! <enable_root>/jobs/nginx       enable path (symlink to the active version)
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::FileSystem;
use crate::domain::{BundleDefinition, BundleError};

const INSTALL_DIR_MODE: u32 = 0o755;

/// The install/enable lifecycle of one bundle version.
pub trait Bundle {
    /// Create the install directory if absent. Idempotent.
    fn install(&self) -> Result<PathBuf>;
    /// The install directory, which must already exist.
    fn install_path(&self) -> Result<PathBuf>;
    /// Point the enable path at this version.
    fn enable(&self) -> Result<PathBuf>;
    /// Remove the enable path, but only if it still points at this version.
    fn disable(&self) -> Result<()>;
    /// Recursively delete the install directory. Idempotent.
    fn uninstall(&self) -> Result<()>;
}

/// A named group of bundles sharing install and enable roots.
pub trait BundleCollection {
    type Bundle: Bundle + PartialEq;

    /// Handle for `definition`. Nothing is touched on disk.
    fn get(&self, definition: &impl BundleDefinition) -> Result<Self::Bundle>;

    /// Every installed version of every bundle in the collection.
    fn list(&self) -> Result<Vec<Self::Bundle>>;
}

// ── Filesystem-backed collection ─────────────────────────────────────────────

pub struct FileBundleCollection<'a, F: FileSystem> {
    name: String,
    install_root: PathBuf,
    enable_root: PathBuf,
    fs: &'a F,
}

impl<'a, F: FileSystem> FileBundleCollection<'a, F> {
    /// Bundles install under `<base_path>/data/<name>` and are enabled under
    /// `<enable_root>/<name>`.
    pub fn new(base_path: &Path, enable_root: &Path, name: &str, fs: &'a F) -> Self {
        Self {
            name: name.to_string(),
            install_root: base_path.join("data").join(name),
            enable_root: enable_root.join(name),
            fs,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn bundle(&self, name: &str, version: &str) -> FileBundle<'a, F> {
        FileBundle {
            install_path: self.install_root.join(name).join(version),
            enable_path: self.enable_root.join(name),
            fs: self.fs,
        }
    }
}

impl<'a, F: FileSystem> BundleCollection for FileBundleCollection<'a, F> {
    type Bundle = FileBundle<'a, F>;

    fn get(&self, definition: &impl BundleDefinition) -> Result<Self::Bundle> {
        let name = definition.bundle_name();
        if name.is_empty() {
            return Err(BundleError::MissingName.into());
        }
        if definition.declared_version().is_empty() || definition.fingerprint().is_empty() {
            return Err(BundleError::MissingVersion.into());
        }
        Ok(self.bundle(name, &definition.bundle_version()))
    }

    fn list(&self) -> Result<Vec<Self::Bundle>> {
        let names = self
            .fs
            .glob(&self.install_root.join("*"))
            .with_context(|| format!("Listing {} bundles", self.name))?;

        let mut bundles = Vec::new();
        for name_dir in names {
            let versions = self
                .fs
                .glob(&name_dir.join("*"))
                .with_context(|| format!("Listing versions in {}", name_dir.display()))?;
            for version_dir in versions {
                bundles.push(FileBundle {
                    enable_path: self.enable_root.join(file_name(&name_dir)),
                    install_path: version_dir,
                    fs: self.fs,
                });
            }
        }
        Ok(bundles)
    }
}

fn file_name(path: &Path) -> &std::ffi::OsStr {
    path.file_name().unwrap_or(path.as_os_str())
}

/// Disable and uninstall every bundle in `collection` that is not one of
/// `wanted`. Disabling is guarded, so a link owned by a wanted version stays.
///
/// # Errors
///
/// Returns an error if listing fails or a stale bundle cannot be removed.
pub fn keep_only<C: BundleCollection>(
    collection: &C,
    wanted: &[impl BundleDefinition],
    kind: &str,
) -> Result<()> {
    let installed = collection
        .list()
        .with_context(|| format!("Retrieving installed {kind}s"))?;
    let wanted = wanted
        .iter()
        .map(|definition| collection.get(definition))
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("Getting {kind} bundle"))?;

    for bundle in installed.into_iter().filter(|b| !wanted.contains(b)) {
        bundle
            .disable()
            .with_context(|| format!("Disabling {kind} bundle"))?;
        bundle
            .uninstall()
            .with_context(|| format!("Uninstalling {kind} bundle"))?;
    }
    Ok(())
}

// ── Filesystem-backed bundle ─────────────────────────────────────────────────

pub struct FileBundle<'a, F: FileSystem> {
    install_path: PathBuf,
    enable_path: PathBuf,
    fs: &'a F,
}

impl<F: FileSystem> FileBundle<'_, F> {
    #[must_use]
    pub fn enable_path(&self) -> &Path {
        &self.enable_path
    }
}

impl<F: FileSystem> PartialEq for FileBundle<'_, F> {
    fn eq(&self, other: &Self) -> bool {
        self.install_path == other.install_path && self.enable_path == other.enable_path
    }
}

impl<F: FileSystem> std::fmt::Debug for FileBundle<'_, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBundle")
            .field("install_path", &self.install_path)
            .field("enable_path", &self.enable_path)
            .finish_non_exhaustive()
    }
}

impl<F: FileSystem> Bundle for FileBundle<'_, F> {
    fn install(&self) -> Result<PathBuf> {
        tracing::debug!(path = %self.install_path.display(), "installing bundle");
        self.fs
            .mkdir_all(&self.install_path, INSTALL_DIR_MODE)
            .context("Creating installation directory")?;
        Ok(self.install_path.clone())
    }

    fn install_path(&self) -> Result<PathBuf> {
        if !self.fs.file_exists(&self.install_path) {
            return Err(BundleError::NotInstalled.into());
        }
        Ok(self.install_path.clone())
    }

    fn enable(&self) -> Result<PathBuf> {
        if !self.fs.file_exists(&self.install_path) {
            return Err(BundleError::MustBeInstalled.into());
        }
        tracing::debug!(
            target_path = %self.install_path.display(),
            link = %self.enable_path.display(),
            "enabling bundle"
        );
        if let Some(parent) = self.enable_path.parent() {
            self.fs
                .mkdir_all(parent, INSTALL_DIR_MODE)
                .context("Creating enable parent directory")?;
        }
        self.fs
            .symlink(&self.install_path, &self.enable_path)
            .context("Enabling bundle")?;
        Ok(self.enable_path.clone())
    }

    fn disable(&self) -> Result<()> {
        if !self.fs.file_exists(&self.enable_path) {
            return Ok(());
        }
        let target = self
            .fs
            .read_link(&self.enable_path)
            .context("Reading symlink")?;
        if target != self.install_path {
            tracing::debug!(
                link = %self.enable_path.display(),
                current = %target.display(),
                "enable path points at another version, leaving it"
            );
            return Ok(());
        }
        self.fs
            .remove_all(&self.enable_path)
            .context("Deleting symlink")
    }

    fn uninstall(&self) -> Result<()> {
        tracing::debug!(path = %self.install_path.display(), "uninstalling bundle");
        self.fs
            .remove_all(&self.install_path)
            .context("Removing installation directory")
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
