//! Writes the logrotate stanza for job logs (`LogrotateSetup` port).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::LogrotateSetup;
use crate::domain::DirectoriesProvider;

pub struct LogrotateFile {
    dir: PathBuf,
}

impl LogrotateFile {
    /// Stanzas are written to `<dir>/<user>`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

/// Rotation policy for everything under `<base>/data/sys/log`, two levels deep.
#[must_use]
pub fn render(base_path: &Path, max_size: &str) -> String {
    let log_dir = DirectoriesProvider::new(base_path).sys_log_dir();
    let log_dir = log_dir.display();
    format!(
        "# Generated by node-agent

{log_dir}/*.log {log_dir}/*/*.log {log_dir}/*/*/*.log {{
  missingok
  rotate 7
  compress
  delaycompress
  copytruncate
  size={max_size}
}}
"
    )
}

impl LogrotateSetup for LogrotateFile {
    fn setup_logrotate(&self, user: &str, base_path: &Path, max_size: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.dir.join(user);

        // Atomic write via temp file then rename
        let temp_path = self.dir.join(format!(".{user}.tmp"));
        std::fs::write(&temp_path, render(base_path, max_size))
            .with_context(|| format!("writing temp file {}", temp_path.display()))?;
        std::fs::rename(&temp_path, &path)
            .with_context(|| format!("finalizing {}", path.display()))?;

        tracing::debug!(path = %path.display(), max_size, "logrotate configured");
        Ok(())
    }
}
