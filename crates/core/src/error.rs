//! Error taxonomy for the versioning engine.
//!
//! Interval and validation problems are surfaced before any write executes
//! where that is feasible, and re-checked against authoritative state inside
//! the write transaction. Store-level failures propagate unchanged.

use crate::row::LogicalId;
use crate::time::Instant;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single failed validation, attached to the columns it concerns.
///
/// Uniqueness conflicts are reported this way so the optimistic save path
/// can hand the caller an error list instead of aborting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// Payload columns the failure applies to.
    pub columns: Vec<String>,
    /// Human-readable description.
    pub message: String,
}

impl ValidationFailure {
    /// Create a failure for a set of columns.
    pub fn new(columns: impl IntoIterator<Item = impl Into<String>>, message: impl Into<String>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}): {}", self.columns.join(", "), self.message)
    }
}

/// All engine errors.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Resolving a logical id yielded no currently-valid (or as-of-valid) row.
    #[error("not found: {0}")]
    NotFound(String),

    /// Interval invariant violation, missing bounds, duplicate logical id.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Update targeted the record's own `valid_from`, which would produce an
    /// empty "before" interval.
    #[error(
        "valid datetime range error: logical id {logical_id}: update at {at} \
         coincides with the record's own valid_from {valid_from}"
    )]
    ValidDatetimeRange {
        /// The entity whose history would be corrupted.
        logical_id: LogicalId,
        /// The as-of instant the update targeted.
        at: Instant,
        /// The record's own lower valid bound.
        valid_from: Instant,
    },

    /// Overlapping-interval uniqueness violation.
    #[error("uniqueness conflict: {}", format_failures(.0))]
    Uniqueness(Vec<ValidationFailure>),

    /// A persistence failure during the multi-row write sequence. The
    /// surrounding transaction has been rolled back; no partial rows remain.
    #[error("transaction failed: {0}")]
    Transaction(String),

    /// Lower-level store error, propagated unmasked.
    #[error("store error: {0}")]
    Store(String),
}

fn format_failures(failures: &[ValidationFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Whether this is a validation-class error (including range and
    /// uniqueness problems).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::ValidDatetimeRange { .. } | Error::Uniqueness(_)
        )
    }

    /// Whether this is an overlapping-interval uniqueness conflict.
    pub fn is_uniqueness_conflict(&self) -> bool {
        matches!(self, Error::Uniqueness(_))
    }
}
