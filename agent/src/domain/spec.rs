//! Desired-state types: the apply spec pushed by the director, and the
//! `Job` / `Package` value objects derived from it.
//!
//! Pure data only. Nothing here touches the filesystem or awaits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::error::SpecError;

/// Log file size used when the spec does not set `properties.logging.max_log_file_size`.
pub const DEFAULT_MAX_LOG_FILE_SIZE: &str = "50M";

// ── Bundle definitions ───────────────────────────────────────────────────────

/// Anything that can be installed as a versioned bundle.
///
/// The version MUST carry a content fingerprint so that two uploads sharing a
/// declared version but differing in content land at different paths.
pub trait BundleDefinition {
    /// Bundle name within its collection, e.g. `"nginx"`.
    fn bundle_name(&self) -> &str;
    /// Version as declared by the release, e.g. `"3"`.
    fn declared_version(&self) -> &str;
    /// SHA1 of the bundle's source blob.
    fn fingerprint(&self) -> &str;

    /// Fingerprinted bundle version, e.g. `"3-<sha1>"`.
    fn bundle_version(&self) -> String {
        format!("{}-{}", self.declared_version(), self.fingerprint())
    }
}

/// Where a job's content lives in the blobstore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSource {
    pub blobstore_id: String,
    pub sha1: String,
    /// Subdirectory of the extracted archive holding this job. Empty means the
    /// archive root.
    pub path_in_archive: String,
}

/// A job template to install and supervise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub version: String,
    pub source: JobSource,
}

impl BundleDefinition for Job {
    fn bundle_name(&self) -> &str {
        &self.name
    }

    fn declared_version(&self) -> &str {
        &self.version
    }

    fn fingerprint(&self) -> &str {
        &self.source.sha1
    }
}

/// Where a package's content lives in the blobstore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSource {
    pub blobstore_id: String,
    pub sha1: String,
}

/// A package to install (deploy time) or compile (build time).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    pub source: PackageSource,
}

impl BundleDefinition for Package {
    fn bundle_name(&self) -> &str {
        &self.name
    }

    fn declared_version(&self) -> &str {
        &self.version
    }

    fn fingerprint(&self) -> &str {
        &self.source.sha1
    }
}

// ── Apply spec (wire shape) ──────────────────────────────────────────────────

/// The desired state for this node, as sent by the director.
///
/// Owned by the caller; nothing in the engine mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySpec {
    #[serde(default)]
    pub job: JobSpec,

    /// Keyed by package name; the sorted map gives a deterministic iteration
    /// order for drain-script arguments.
    #[serde(default)]
    pub packages: BTreeMap<String, PackageSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered_templates_archive: Option<RenderedTemplatesArchiveSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_hash: Option<String>,

    #[serde(default)]
    pub persistent_disk: u64,

    #[serde(default)]
    pub properties: PropertiesSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default)]
    pub templates: Vec<JobTemplateSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTemplateSpec {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub sha1: String,
    #[serde(default)]
    pub blobstore_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    pub version: String,
    pub sha1: String,
    pub blobstore_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedTemplatesArchiveSpec {
    pub blobstore_id: String,
    pub sha1: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertiesSpec {
    #[serde(default)]
    pub logging: LoggingSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSpec {
    #[serde(default = "default_max_log_file_size")]
    pub max_log_file_size: String,
}

impl Default for LoggingSpec {
    fn default() -> Self {
        Self {
            max_log_file_size: default_max_log_file_size(),
        }
    }
}

fn default_max_log_file_size() -> String {
    DEFAULT_MAX_LOG_FILE_SIZE.to_string()
}

impl From<&PackageSpec> for Package {
    fn from(spec: &PackageSpec) -> Self {
        Self {
            name: spec.name.clone(),
            version: spec.version.clone(),
            source: PackageSource {
                blobstore_id: spec.blobstore_id.clone(),
                sha1: spec.sha1.clone(),
            },
        }
    }
}

impl ApplySpec {
    /// Jobs in spec order.
    ///
    /// When a rendered templates archive is present every job is sourced
    /// from it, at the subdirectory named after the template. Otherwise each
    /// template's own blob is used from its root.
    #[must_use]
    pub fn jobs(&self) -> Vec<Job> {
        self.job
            .templates
            .iter()
            .map(|template| {
                let source = match &self.rendered_templates_archive {
                    Some(archive) => JobSource {
                        blobstore_id: archive.blobstore_id.clone(),
                        sha1: archive.sha1.clone(),
                        path_in_archive: template.name.clone(),
                    },
                    None => JobSource {
                        blobstore_id: template.blobstore_id.clone(),
                        sha1: template.sha1.clone(),
                        path_in_archive: String::new(),
                    },
                };
                Job {
                    name: template.name.clone(),
                    version: template.version.clone(),
                    source,
                }
            })
            .collect()
    }

    /// Packages sorted by name.
    #[must_use]
    pub fn packages(&self) -> Vec<Package> {
        self.packages.values().map(Package::from).collect()
    }

    #[must_use]
    pub fn max_log_file_size(&self) -> &str {
        &self.properties.logging.max_log_file_size
    }

    /// The configuration hash, treating an empty string as absent.
    #[must_use]
    pub fn configuration_hash(&self) -> Option<&str> {
        self.configuration_hash.as_deref().filter(|h| !h.is_empty())
    }

    /// Parse and validate a JSON apply spec.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a required field is empty.
    pub fn from_json(bytes: &[u8]) -> anyhow::Result<Self> {
        let spec: Self = serde_json::from_slice(bytes)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Check that every template and package carries the fields needed to
    /// fetch and fingerprint it.
    ///
    /// # Errors
    ///
    /// Returns the first missing field found.
    pub fn validate(&self) -> Result<(), SpecError> {
        for template in &self.job.templates {
            require("job template", "name", &template.name)?;
            require("job template", "version", &template.version)?;
            if self.rendered_templates_archive.is_none() {
                require("job template", "sha1", &template.sha1)?;
                require("job template", "blobstore_id", &template.blobstore_id)?;
            }
        }
        if let Some(archive) = &self.rendered_templates_archive {
            require("rendered templates archive", "sha1", &archive.sha1)?;
            require("rendered templates archive", "blobstore_id", &archive.blobstore_id)?;
        }
        for package in self.packages.values() {
            validate_package(package)?;
        }
        Ok(())
    }
}

/// Check that a package spec carries every field.
///
/// # Errors
///
/// Returns the first missing field found.
pub fn validate_package(package: &PackageSpec) -> Result<(), SpecError> {
    require("package", "name", &package.name)?;
    require("package", "version", &package.version)?;
    require("package", "sha1", &package.sha1)?;
    require("package", "blobstore_id", &package.blobstore_id)
}

fn require(kind: &'static str, field: &'static str, value: &str) -> Result<(), SpecError> {
    if value.is_empty() {
        return Err(SpecError::MissingField { kind, field });
    }
    Ok(())
}

// ── Unit tests ───────────────────────────────────────────────────────────────
