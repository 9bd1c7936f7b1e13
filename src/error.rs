//! Unified error type for the public surface.
//!
//! Wraps the engine-internal taxonomy behind a stable interface with
//! predicate helpers, so callers can branch on error class without matching
//! internal types.

use bitempo_core::ValidationFailure;
use thiserror::Error;

/// All public errors.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// No currently-valid (or as-of-valid) row for a logical id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Interval invariant violation, missing bounds, duplicate logical id.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Update targeted the record's own `valid_from`.
    #[error("{0}")]
    ValidDatetimeRange(String),

    /// Overlapping-interval uniqueness violation, per attribute set.
    #[error("uniqueness conflict on {0:?}")]
    Uniqueness(Vec<ValidationFailure>),

    /// The multi-row write sequence failed and was rolled back.
    #[error("transaction failed: {0}")]
    Transaction(String),

    /// Lower-level store error, passed through unmasked.
    #[error("store error: {0}")]
    Store(String),
}

/// Result type for public operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Whether this is a validation-class error.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::ValidDatetimeRange(_) | Error::Uniqueness(_)
        )
    }

    /// Whether this is an overlapping-interval uniqueness conflict.
    pub fn is_uniqueness_conflict(&self) -> bool {
        matches!(self, Error::Uniqueness(_))
    }

    /// The per-attribute failures of a uniqueness conflict.
    pub fn uniqueness_failures(&self) -> Option<&[ValidationFailure]> {
        match self {
            Error::Uniqueness(failures) => Some(failures),
            _ => None,
        }
    }
}

impl From<bitempo_core::Error> for Error {
    fn from(e: bitempo_core::Error) -> Self {
        use bitempo_core::Error as CoreError;
        match e {
            CoreError::NotFound(msg) => Error::NotFound(msg),
            CoreError::Validation(msg) => Error::Validation(msg),
            err @ CoreError::ValidDatetimeRange { .. } => {
                Error::ValidDatetimeRange(err.to_string())
            }
            CoreError::Uniqueness(failures) => Error::Uniqueness(failures),
            CoreError::Transaction(msg) => Error::Transaction(msg),
            CoreError::Store(msg) => Error::Store(msg),
        }
    }
}
