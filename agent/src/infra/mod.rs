//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, filesystem
//! access, archives, the local blobstore, monit staging and logrotate.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::cli` are forbidden.

pub mod blobstore;
pub mod clock;
pub mod command_runner;
pub mod compressor;
pub mod config;
pub mod fs;
pub mod logrotate;
pub mod monit;
