//! Infrastructure implementation of the `Compressor` port: gzip-compressed
//! tarballs via `tar` + `flate2`.

use std::fs::File;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::application::ports::Compressor;

const TARBALL_PREFIX: &str = "node-agent-tarball-";

pub struct TarGzCompressor {
    temp_root: PathBuf,
}

impl TarGzCompressor {
    /// Tarballs produced by `compress_files_in_dir` are written to `temp_root`.
    #[must_use]
    pub fn new(temp_root: impl Into<PathBuf>) -> Self {
        Self {
            temp_root: temp_root.into(),
        }
    }
}

fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

impl Compressor for TarGzCompressor {
    fn decompress_file_to_dir(&self, tarball: &Path, dir: &Path) -> Result<()> {
        let file =
            File::open(tarball).with_context(|| format!("opening {}", tarball.display()))?;
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        archive.set_preserve_permissions(true);
        archive.set_overwrite(true);

        for entry in archive
            .entries()
            .with_context(|| format!("reading {}", tarball.display()))?
        {
            let mut entry = entry.with_context(|| format!("reading {}", tarball.display()))?;
            let path = entry.path()?.into_owned();
            anyhow::ensure!(
                is_contained(&path),
                "archive entry {} escapes the target directory",
                path.display()
            );
            let unpacked = entry
                .unpack_in(dir)
                .with_context(|| format!("extracting {}", path.display()))?;
            anyhow::ensure!(unpacked, "archive entry {} was not extracted", path.display());
        }
        Ok(())
    }

    fn compress_files_in_dir(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.temp_root)
            .with_context(|| format!("creating {}", self.temp_root.display()))?;
        let (file, tarball) = tempfile::Builder::new()
            .prefix(TARBALL_PREFIX)
            .suffix(".tgz")
            .tempfile_in(&self.temp_root)
            .context("creating tarball file")?
            .keep()
            .context("keeping tarball file")?;

        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        builder.follow_symlinks(false);

        for entry in walkdir::WalkDir::new(dir).min_depth(1).sort_by_file_name() {
            let entry = entry.with_context(|| format!("walking {}", dir.display()))?;
            let rel = entry.path().strip_prefix(dir)?;
            builder
                .append_path_with_name(entry.path(), rel)
                .with_context(|| format!("archiving {}", entry.path().display()))?;
        }

        builder
            .into_inner()
            .and_then(GzEncoder::finish)
            .with_context(|| format!("finishing {}", tarball.display()))?;
        Ok(tarball)
    }

    fn clean_up(&self, tarball: &Path) -> Result<()> {
        std::fs::remove_file(tarball).with_context(|| format!("removing {}", tarball.display()))
    }
}
