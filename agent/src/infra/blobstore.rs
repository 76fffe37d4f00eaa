//! Directory-backed implementation of the `Blobstore` port.
//!
//! Blobs live at `<dir>/<blob_id>`. `get` hands out a private copy so that
//! callers may delete it with `clean_up` without touching the store.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha1::{Digest, Sha1};

use crate::application::ports::Blobstore;

const BLOB_COPY_PREFIX: &str = "node-agent-blob-";

pub struct LocalBlobstore {
    dir: PathBuf,
    temp_root: PathBuf,
}

impl LocalBlobstore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, temp_root: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            temp_root: temp_root.into(),
        }
    }

    fn blob_path(&self, blob_id: &str) -> Result<PathBuf> {
        anyhow::ensure!(
            !blob_id.is_empty()
                && !blob_id.contains('/')
                && blob_id != "."
                && blob_id != "..",
            "invalid blob id {blob_id:?}"
        );
        Ok(self.dir.join(blob_id))
    }

    fn get_sync(
        src: &Path,
        temp_root: &Path,
        blob_id: &str,
        fingerprint: &str,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(temp_root)
            .with_context(|| format!("creating {}", temp_root.display()))?;
        let (_, copy) = tempfile::Builder::new()
            .prefix(BLOB_COPY_PREFIX)
            .tempfile_in(temp_root)
            .context("creating blob copy")?
            .keep()
            .context("keeping blob copy")?;

        let verified = std::fs::copy(src, &copy)
            .with_context(|| format!("copying blob {blob_id}"))
            .and_then(|_| verify_sha1(&copy, blob_id, fingerprint));
        if let Err(e) = verified {
            let _ = std::fs::remove_file(&copy);
            return Err(e);
        }
        Ok(copy)
    }

    fn create_sync(src: &Path, dir: &Path) -> Result<(String, String)> {
        let sha1 = sha1_file(src)?;
        let blob_id = uuid::Uuid::new_v4().to_string();
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        std::fs::copy(src, dir.join(&blob_id))
            .with_context(|| format!("storing blob {blob_id}"))?;
        Ok((blob_id, sha1))
    }
}

fn verify_sha1(path: &Path, blob_id: &str, expected: &str) -> Result<()> {
    if expected.is_empty() {
        return Ok(());
    }
    let actual = sha1_file(path)?;
    anyhow::ensure!(
        actual.eq_ignore_ascii_case(expected),
        "SHA1 mismatch for blob {blob_id}: expected {expected}, got {actual}"
    );
    Ok(())
}

/// Compute the SHA1 hex digest of a file, reading it in 64 KB chunks.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn sha1_file(path: &Path) -> Result<String> {
    let mut file =
        std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; 65536];
    loop {
        let n = file.read(&mut buf).context("reading file")?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

impl Blobstore for LocalBlobstore {
    async fn get(&self, blob_id: &str, fingerprint: &str) -> Result<PathBuf> {
        let src = self.blob_path(blob_id)?;
        let temp_root = self.temp_root.clone();
        let blob_id = blob_id.to_string();
        let fingerprint = fingerprint.to_string();
        tokio::task::spawn_blocking(move || {
            Self::get_sync(&src, &temp_root, &blob_id, &fingerprint)
        })
        .await
        .context("blob fetch task panicked")?
    }

    fn clean_up(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).with_context(|| format!("removing {}", path.display()))
    }

    async fn create(&self, path: &Path) -> Result<(String, String)> {
        let src = path.to_path_buf();
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || Self::create_sync(&src, &dir))
            .await
            .context("blob create task panicked")?
    }
}
