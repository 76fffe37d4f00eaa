//! Drain parameters: how a job changed between two apply specs, in the
//! vocabulary drain scripts understand.
//!
//! Pure functions only. Nothing here touches the filesystem or awaits.

use std::fmt;

use serde::Serialize;

use crate::domain::spec::ApplySpec;

/// First drain script argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobChange {
    Shutdown,
    CheckStatus,
    New,
    Unchanged,
    Changed,
}

impl JobChange {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shutdown => "job_shutdown",
            Self::CheckStatus => "job_check_status",
            Self::New => "job_new",
            Self::Unchanged => "job_unchanged",
            Self::Changed => "job_changed",
        }
    }
}

impl fmt::Display for JobChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Second drain script argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashChange {
    New,
    Unchanged,
    Changed,
}

impl HashChange {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "hash_new",
            Self::Unchanged => "hash_unchanged",
            Self::Changed => "hash_changed",
        }
    }
}

impl fmt::Display for HashChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The only part of a spec a drain script is allowed to see.
#[derive(Serialize)]
struct ExposedJobState {
    persistent_disk: u64,
}

/// Parameters for one drain script invocation.
///
/// `Shutdown` and `Status` carry optional spec snapshots only so that
/// `job_state` / `job_next_state` can be reported; their change
/// classification is fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainParams {
    Shutdown {
        old: Option<ApplySpec>,
        new: Option<ApplySpec>,
    },
    Status {
        old: Option<ApplySpec>,
        new: Option<ApplySpec>,
    },
    Update {
        old: ApplySpec,
        new: ApplySpec,
    },
}

impl DrainParams {
    #[must_use]
    pub fn shutdown(old: Option<ApplySpec>, new: Option<ApplySpec>) -> Self {
        Self::Shutdown { old, new }
    }

    #[must_use]
    pub fn status(old: Option<ApplySpec>, new: Option<ApplySpec>) -> Self {
        Self::Status { old, new }
    }

    #[must_use]
    pub fn update(old: ApplySpec, new: ApplySpec) -> Self {
        Self::Update { old, new }
    }

    /// Status-check parameters over the same snapshots, used when a drain
    /// script asks to be polled again.
    #[must_use]
    pub fn to_status(&self) -> Self {
        let (old, new) = self.snapshots();
        Self::Status {
            old: old.cloned(),
            new: new.cloned(),
        }
    }

    #[must_use]
    pub fn job_change(&self) -> JobChange {
        match self {
            Self::Shutdown { .. } => JobChange::Shutdown,
            Self::Status { .. } => JobChange::CheckStatus,
            Self::Update { old, new } => {
                if old.jobs().is_empty() {
                    JobChange::New
                } else if old.job.sha1 == new.job.sha1 {
                    JobChange::Unchanged
                } else {
                    JobChange::Changed
                }
            }
        }
    }

    #[must_use]
    pub fn hash_change(&self) -> HashChange {
        match self {
            Self::Shutdown { .. } | Self::Status { .. } => HashChange::Unchanged,
            Self::Update { old, new } => match old.configuration_hash() {
                None => HashChange::New,
                Some(hash) if Some(hash) == new.configuration_hash() => HashChange::Unchanged,
                Some(_) => HashChange::Changed,
            },
        }
    }

    /// Names of packages that are new or whose content changed, sorted.
    /// Packages are matched on their declared name, not their spec key.
    #[must_use]
    pub fn updated_packages(&self) -> Vec<String> {
        match self {
            Self::Shutdown { .. } | Self::Status { .. } => Vec::new(),
            Self::Update { old, new } => {
                let mut names: Vec<String> = new
                    .packages
                    .values()
                    .filter(|pkg| {
                        old.packages
                            .values()
                            .find(|previous| previous.name == pkg.name)
                            .is_none_or(|previous| previous.sha1 != pkg.sha1)
                    })
                    .map(|pkg| pkg.name.clone())
                    .collect();
                names.sort();
                names.dedup();
                names
            }
        }
    }

    /// Compact JSON describing the current (old) state; empty when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn job_state(&self) -> serde_json::Result<String> {
        exposed_state(self.snapshots().0)
    }

    /// Compact JSON describing the next (new) state; empty when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn job_next_state(&self) -> serde_json::Result<String> {
        exposed_state(self.snapshots().1)
    }

    fn snapshots(&self) -> (Option<&ApplySpec>, Option<&ApplySpec>) {
        match self {
            Self::Shutdown { old, new } | Self::Status { old, new } => {
                (old.as_ref(), new.as_ref())
            }
            Self::Update { old, new } => (Some(old), Some(new)),
        }
    }
}

fn exposed_state(spec: Option<&ApplySpec>) -> serde_json::Result<String> {
    match spec {
        None => Ok(String::new()),
        Some(spec) => serde_json::to_string(&ExposedJobState {
            persistent_disk: spec.persistent_disk,
        }),
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
