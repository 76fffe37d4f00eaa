//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator. Messages are literal so callers can match on text.

use thiserror::Error;

// ── Bundle errors ─────────────────────────────────────────────────────────────

/// Precondition violations on versioned bundles.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BundleError {
    #[error("missing bundle name")]
    MissingName,

    #[error("missing bundle version")]
    MissingVersion,

    #[error("install dir does not exist")]
    NotInstalled,

    #[error("bundle must be installed")]
    MustBeInstalled,
}

// ── Drain errors ──────────────────────────────────────────────────────────────

/// Errors interpreting a drain script's result.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DrainError {
    #[error("Script did not return a signed integer")]
    NotSignedInteger,
}

// ── Spec errors ───────────────────────────────────────────────────────────────

/// Malformed desired-state input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    #[error("Invalid {kind} spec, {field} is missing")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
}

// ── Reporting ─────────────────────────────────────────────────────────────────

/// Compact rendering of an error chain: the outermost message and the root
/// cause, with every intermediate frame dropped.
///
/// `format!("{err:#}")` still gives the full `"<outer>: <inner>: ..."` chain.
#[must_use]
pub fn short_message(err: &anyhow::Error) -> String {
    let outer = err.to_string();
    let root = err.root_cause().to_string();
    if outer == root {
        outer
    } else {
        format!("{outer}: {root}")
    }
}
