//! Per-table configuration for versioned entities.

use serde::{Deserialize, Serialize};

/// Default name of the column carrying the stable entity id.
pub const DEFAULT_LOGICAL_ID_COLUMN: &str = "bitemporal_id";

/// How a table represents transaction-time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionTimeMode {
    /// Two-sided `[transaction_from, transaction_to)` interval. The primary
    /// model.
    Interval,
    /// Legacy soft-delete marker: only the close instant is meaningful,
    /// surfaced as `deleted_at`. Compatibility shim.
    DeletedAt,
}

/// A uniqueness constraint over payload columns, enforced only among rows
/// whose valid-time overlaps and whose transaction-time is still open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniquenessConstraint {
    /// The payload columns that together must be unique.
    pub columns: Vec<String>,
}

impl UniquenessConstraint {
    /// Constraint over one or more payload columns.
    pub fn on(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

/// Configuration of one versioned table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    name: String,
    logical_id_column: String,
    transaction_time_mode: TransactionTimeMode,
    uniqueness: Vec<UniquenessConstraint>,
}

impl TableSchema {
    /// A schema with the default logical-id column and interval
    /// transaction-time.
    pub fn new(name: impl Into<String>) -> Self {
        TableSchema {
            name: name.into(),
            logical_id_column: DEFAULT_LOGICAL_ID_COLUMN.to_string(),
            transaction_time_mode: TransactionTimeMode::Interval,
            uniqueness: Vec::new(),
        }
    }

    /// Rename the logical-id column.
    pub fn logical_id_column(mut self, column: impl Into<String>) -> Self {
        self.logical_id_column = column.into();
        self
    }

    /// Switch to the legacy soft-delete representation.
    pub fn legacy_deleted_at(mut self) -> Self {
        self.transaction_time_mode = TransactionTimeMode::DeletedAt;
        self
    }

    /// Add a uniqueness constraint over payload columns.
    pub fn unique(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.uniqueness.push(UniquenessConstraint::on(columns));
        self
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the logical-id column.
    pub fn logical_id_column_name(&self) -> &str {
        &self.logical_id_column
    }

    /// Transaction-time representation.
    pub fn transaction_time_mode(&self) -> TransactionTimeMode {
        self.transaction_time_mode
    }

    /// Declared uniqueness constraints.
    pub fn uniqueness_constraints(&self) -> &[UniquenessConstraint] {
        &self.uniqueness
    }
}
