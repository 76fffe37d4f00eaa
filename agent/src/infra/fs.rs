//! Filesystem infrastructure: implements the `FileSystem` port on `std::fs`.

use std::io::ErrorKind;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::application::ports::FileSystem;

/// Dotfiles are ordinary matches: `bin/*` must include `bin/.helper`.
const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Production `FileSystem`. Temporary directories are created under
/// `temp_root`.
pub struct OsFileSystem {
    temp_root: PathBuf,
}

impl OsFileSystem {
    #[must_use]
    pub fn new(temp_root: impl Into<PathBuf>) -> Self {
        Self {
            temp_root: temp_root.into(),
        }
    }
}

impl Default for OsFileSystem {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl FileSystem for OsFileSystem {
    fn mkdir_all(&self, path: &Path, mode: u32) -> Result<()> {
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(mode)
            .create(path)
            .with_context(|| format!("creating directory {}", path.display()))
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.symlink_metadata().is_ok()
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        let name = link
            .file_name()
            .with_context(|| format!("invalid link path {}", link.display()))?;
        let staged = link.with_file_name(format!(
            ".{}.{}.tmp",
            name.to_string_lossy(),
            uuid::Uuid::new_v4().simple()
        ));

        std::os::unix::fs::symlink(target, &staged)
            .with_context(|| format!("creating symlink {}", staged.display()))?;
        if let Err(e) = std::fs::rename(&staged, link) {
            let _ = std::fs::remove_file(&staged);
            return Err(e).with_context(|| format!("replacing symlink {}", link.display()));
        }
        Ok(())
    }

    fn read_link(&self, path: &Path) -> Result<PathBuf> {
        std::fs::read_link(path).with_context(|| format!("reading symlink {}", path.display()))
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        let meta = match path.symlink_metadata() {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(e).with_context(|| format!("inspecting {}", path.display()));
            }
        };
        if meta.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        }
        .with_context(|| format!("removing {}", path.display()))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        std::fs::rename(from, to)
            .with_context(|| format!("renaming {} to {}", from.display(), to.display()))
    }

    fn temp_dir(&self, prefix: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.temp_root)
            .with_context(|| format!("creating {}", self.temp_root.display()))?;
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(&self.temp_root)
            .with_context(|| format!("creating temp dir in {}", self.temp_root.display()))?;
        Ok(dir.keep())
    }

    fn glob(&self, pattern: &Path) -> Result<Vec<PathBuf>> {
        let dir = pattern.parent().unwrap_or(Path::new(""));
        let dir = dir
            .to_str()
            .with_context(|| format!("non-UTF-8 glob directory {}", dir.display()))?;
        let name = pattern
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("invalid glob pattern {}", pattern.display()))?;
        let full = Path::new(&Pattern::escape(dir)).join(name);
        let full = full.to_string_lossy();

        let paths = glob::glob_with(&full, GLOB_OPTIONS)
            .with_context(|| format!("invalid glob pattern {}", pattern.display()))?;
        let mut matches = Vec::new();
        for path in paths {
            matches.push(path.with_context(|| format!("listing {dir}"))?);
        }
        matches.sort();
        Ok(matches)
    }

    fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .with_context(|| format!("setting permissions on {}", path.display()))
    }

    fn copy_dir_entries(&self, src: &Path, dst: &Path) -> Result<()> {
        std::fs::create_dir_all(dst).with_context(|| format!("creating {}", dst.display()))?;

        for entry in WalkDir::new(src).min_depth(1) {
            let entry = entry.with_context(|| format!("walking {}", src.display()))?;
            let rel = entry.path().strip_prefix(src)?;
            let target = dst.join(rel);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                std::fs::create_dir_all(&target)
                    .with_context(|| format!("creating {}", target.display()))?;
                let mode = entry.metadata()?.permissions().mode();
                self.chmod(&target, mode)?;
            } else if file_type.is_symlink() {
                let link = std::fs::read_link(entry.path())?;
                self.remove_all(&target)?;
                std::os::unix::fs::symlink(&link, &target)
                    .with_context(|| format!("copying symlink {}", target.display()))?;
            } else {
                std::fs::copy(entry.path(), &target).with_context(|| {
                    format!("copying {} to {}", entry.path().display(), target.display())
                })?;
            }
        }
        Ok(())
    }

    fn write_to_file(&self, path: &Path, content: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))
    }
}
