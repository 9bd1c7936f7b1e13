//! The physical row model.
//!
//! One [`VersionedRow`] is one `(valid-time, transaction-time)` slice of an
//! entity's state. An entity's stable identity is its [`LogicalId`], shared
//! by every version; each stored version additionally has its own
//! [`PhysicalId`], assigned by the store on insert and never reused.

use crate::error::{Error, Result};
use crate::interval::Interval;
use crate::time::{Instant, END_OF_TIME};
use crate::value::Payload;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned identity of one physical row. Immutable once assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PhysicalId(u64);

impl PhysicalId {
    /// Wrap a raw store id.
    pub fn new(id: u64) -> Self {
        PhysicalId(id)
    }

    /// Raw id value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PhysicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identity shared by all versions of one entity.
///
/// Equals the physical id of the row created when the entity was first
/// persisted, and is never reassigned afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogicalId(u64);

impl LogicalId {
    /// Wrap a raw id.
    pub fn new(id: u64) -> Self {
        LogicalId(id)
    }

    /// Raw id value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<PhysicalId> for LogicalId {
    /// First-version rule: a fresh entity's logical id is the physical id of
    /// its first row.
    fn from(id: PhysicalId) -> Self {
        LogicalId(id.0)
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One stored `(valid, transaction)` slice of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedRow {
    /// Store-assigned row identity.
    pub physical_id: PhysicalId,
    /// Entity identity shared across versions.
    pub logical_id: LogicalId,
    /// Real-world applicability `[valid_from, valid_to)`.
    pub valid: Interval,
    /// Database-belief applicability `[transaction_from, transaction_to)`.
    pub transaction: Interval,
    /// Audit marker: this row was written by a force update.
    pub force_updated: bool,
    /// Entity-specific columns.
    pub payload: Payload,
}

impl VersionedRow {
    /// Whether the row's transaction-time is still open (not superseded).
    pub fn is_transaction_open(&self) -> bool {
        self.transaction.is_open_ended()
    }

    /// Legacy soft-delete view of transaction-time: the close instant, if
    /// the row has been superseded or deleted.
    pub fn deleted_at(&self) -> Option<Instant> {
        (!self.is_transaction_open()).then(|| self.transaction.to())
    }

    /// Whether the row represents the entity's state at valid instant `t`
    /// (regardless of transaction-time).
    pub fn valid_at(&self, t: Instant) -> bool {
        self.valid.contains(t)
    }

    /// Whether the row is both valid at `t` and believed at `t`.
    pub fn bitemporal_at(&self, valid: Instant, transaction: Instant) -> bool {
        self.valid.contains(valid) && self.transaction.contains(transaction)
    }
}

/// A row about to be inserted. The store assigns the physical id; a missing
/// logical id defaults to that fresh physical id (first-version rule).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRow {
    /// Entity identity, or `None` for a first version.
    pub logical_id: Option<LogicalId>,
    /// Valid-time interval.
    pub valid: Interval,
    /// Transaction-time interval.
    pub transaction: Interval,
    /// Audit marker for force-written rows.
    pub force_updated: bool,
    /// Entity-specific columns.
    pub payload: Payload,
}

impl NewRow {
    /// A first-version row: open transaction-time starting at `recorded_at`.
    pub fn first_version(valid: Interval, recorded_at: Instant, payload: Payload) -> Result<Self> {
        Ok(NewRow {
            logical_id: None,
            valid,
            transaction: Interval::new(recorded_at, *END_OF_TIME)?,
            force_updated: false,
            payload,
        })
    }

    /// A continuation row for an existing entity.
    pub fn continuation(
        logical_id: LogicalId,
        valid: Interval,
        recorded_at: Instant,
        payload: Payload,
    ) -> Result<Self> {
        Ok(NewRow {
            logical_id: Some(logical_id),
            valid,
            transaction: Interval::new(recorded_at, *END_OF_TIME)?,
            force_updated: false,
            payload,
        })
    }
}

/// Targeted column updates applied through `execute_update_columns`.
///
/// This path bypasses the versioning layer on purpose: it is how the writer
/// closes transaction-time on superseded rows without spawning new history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnPatch {
    /// New logical id (used when resolving a first version's identity).
    pub logical_id: Option<LogicalId>,
    /// New valid-time lower bound.
    pub valid_from: Option<Instant>,
    /// New valid-time upper bound.
    pub valid_to: Option<Instant>,
    /// New transaction-time upper bound (closing the row).
    pub transaction_to: Option<Instant>,
}

impl ColumnPatch {
    /// A patch closing the row's transaction-time at `at`.
    pub fn close_transaction(at: Instant) -> Self {
        ColumnPatch {
            transaction_to: Some(at),
            ..ColumnPatch::default()
        }
    }

    /// Apply the patch to a row, re-validating interval invariants.
    pub fn apply(&self, row: &mut VersionedRow) -> Result<()> {
        if let Some(id) = self.logical_id {
            row.logical_id = id;
        }
        let valid_from = self.valid_from.unwrap_or_else(|| row.valid.from());
        let valid_to = self.valid_to.unwrap_or_else(|| row.valid.to());
        row.valid = Interval::new(valid_from, valid_to)?;
        if let Some(to) = self.transaction_to {
            row.transaction = row.transaction.with_to(to).map_err(|_| {
                Error::Validation(format!(
                    "cannot close transaction-time of row {} at {}: row opened at {}",
                    row.physical_id,
                    to,
                    row.transaction.from()
                ))
            })?;
        }
        Ok(())
    }
}
