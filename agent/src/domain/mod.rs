//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod drain;
pub mod error;
pub mod spec;

pub use config::{AgentConfig, DirectoriesProvider};
pub use drain::{DrainParams, HashChange, JobChange};
pub use error::{BundleError, DrainError, SpecError, short_message};
pub use spec::{ApplySpec, BundleDefinition, Job, JobSource, Package, PackageSource};
