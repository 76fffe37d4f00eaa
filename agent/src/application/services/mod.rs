//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports`, never from `crate::infra`, `crate::commands`,
//! or `crate::cli`.

pub mod applier;
pub mod bundle;
pub mod compiler;
pub mod drain;
pub mod job_applier;
pub mod package_applier;


use std::process::Output;

use anyhow::Result;

/// Turn a non-zero exit into an error carrying the command's stderr.
///
/// # Errors
///
/// Returns an error if `output` reports a failed exit status.
pub(crate) fn ensure_success(output: &Output, what: &str) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let code = output
        .status
        .code()
        .map_or_else(|| "signal".to_string(), |c| c.to_string());
    anyhow::bail!("{what} exited with {code}: {}", stderr.trim());
}
