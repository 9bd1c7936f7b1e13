//! The relational-store collaborator contract.
//!
//! The versioning engine does not know how rows are persisted; it only
//! requires this minimal surface: predicate-filtered queries, inserts that
//! assign physical ids, targeted column updates (used for closing
//! transaction-time, bypassing versioning), an atomic unit of work, and an
//! optional caller-invoked row lock.
//!
//! Transactions commit on `Ok` and roll back on `Err`; a rolled-back
//! transaction must leave no partially-applied rows visible to anyone.

use bitempo_core::predicate::Predicate;
use bitempo_core::row::{ColumnPatch, NewRow, PhysicalId, VersionedRow};
use bitempo_core::{Column, Result};

/// One ordering key for a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowOrdering {
    /// Column to order by.
    pub column: Column,
    /// Descending instead of ascending.
    pub descending: bool,
}

impl RowOrdering {
    /// Ascending on `column`.
    pub fn asc(column: Column) -> Self {
        RowOrdering { column, descending: false }
    }

    /// Descending on `column`.
    pub fn desc(column: Column) -> Self {
        RowOrdering { column, descending: true }
    }
}

/// Anything rows can be read from: a store (auto-committed reads) or a live
/// transaction session.
pub trait RowSource {
    /// Rows of `table` matching `predicate`, ordered by `order` keys (ties
    /// broken by physical id), truncated to `limit`.
    fn execute_query(
        &self,
        table: &str,
        predicate: &Predicate,
        order: &[RowOrdering],
        limit: Option<usize>,
    ) -> Result<Vec<VersionedRow>>;
}

/// A live transaction session: reads observe the transaction's own writes.
pub trait StoreSession: RowSource {
    /// Insert a row; the store assigns and returns the physical id. A
    /// missing logical id defaults to that fresh physical id (first-version
    /// rule).
    fn execute_insert(&mut self, table: &str, row: NewRow) -> Result<PhysicalId>;

    /// Apply targeted column updates to one row, bypassing versioning.
    /// Interval invariants are still enforced.
    fn execute_update_columns(
        &mut self,
        table: &str,
        id: PhysicalId,
        patch: ColumnPatch,
    ) -> Result<()>;

    /// Take (or verify) a row lock over the rows matching `predicate`,
    /// returning how many rows are covered. Callers needing external
    /// concurrency control invoke this before updating; the engine itself
    /// never does.
    fn lock_rows(&mut self, table: &str, predicate: &Predicate) -> Result<usize>;
}

/// A relational store: auto-committed reads plus atomic units of work.
pub trait RelationalStore: RowSource + Send + Sync {
    /// The session type handed to transaction bodies.
    type Txn<'a>: StoreSession
    where
        Self: 'a;

    /// Run `f` inside one atomic transaction. Commits when `f` returns
    /// `Ok`, rolls back when it returns `Err` (the error is passed
    /// through). A rollback leaves no trace of the transaction's writes.
    fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self::Txn<'_>) -> Result<T>;
}
