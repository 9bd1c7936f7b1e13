//! In-memory reference implementation of the store contract.
//!
//! Tables live behind one `parking_lot::RwLock`. A transaction clones the
//! table map, runs against the working copy while holding the write lock,
//! and swaps it in on commit; a rollback (error return or panic) drops the
//! copy, so readers can never observe a partially-applied transaction.
//! Holding the write lock for the whole transaction serializes writers,
//! which is the isolation the engine's in-transaction re-validation relies
//! on. Physical ids come from a monotonic sequence; ids consumed by a
//! rolled-back transaction stay consumed, as with a store-native sequence.

use crate::traits::{RelationalStore, RowOrdering, RowSource, StoreSession};
use bitempo_core::predicate::{compare, row_scalar, Predicate};
use bitempo_core::row::{ColumnPatch, LogicalId, NewRow, PhysicalId, VersionedRow};
use bitempo_core::{Error, Result};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct TableData {
    rows: BTreeMap<u64, VersionedRow>,
}

type Tables = BTreeMap<String, TableData>;

/// In-memory relational store.
///
/// Tables are created implicitly on first insert; querying an absent table
/// yields no rows, matching a freshly-migrated empty table.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    next_physical_id: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Total number of rows across all tables.
    pub fn row_count(&self) -> usize {
        self.tables.read().values().map(|t| t.rows.len()).sum()
    }
}

fn query_tables(
    tables: &Tables,
    table: &str,
    predicate: &Predicate,
    order: &[RowOrdering],
    limit: Option<usize>,
) -> Result<Vec<VersionedRow>> {
    let mut rows: Vec<VersionedRow> = match tables.get(table) {
        Some(data) => data
            .rows
            .values()
            .filter(|row| predicate.matches(row))
            .cloned()
            .collect(),
        None => Vec::new(),
    };
    if !order.is_empty() {
        rows.sort_by(|a, b| {
            for key in order {
                let lhs = row_scalar(a, &key.column);
                let rhs = row_scalar(b, &key.column);
                let ord = compare(&lhs, &rhs).unwrap_or(Ordering::Equal);
                let ord = if key.descending { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            a.physical_id.cmp(&b.physical_id)
        });
    }
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    Ok(rows)
}

fn insert_row(
    tables: &mut Tables,
    next_physical_id: &AtomicU64,
    table: &str,
    row: NewRow,
) -> Result<PhysicalId> {
    let physical_id = PhysicalId::new(next_physical_id.fetch_add(1, AtomicOrdering::SeqCst) + 1);
    let logical_id = row.logical_id.unwrap_or_else(|| LogicalId::from(physical_id));
    let stored = VersionedRow {
        physical_id,
        logical_id,
        valid: row.valid,
        transaction: row.transaction,
        force_updated: row.force_updated,
        payload: row.payload,
    };
    tables
        .entry(table.to_string())
        .or_default()
        .rows
        .insert(physical_id.as_u64(), stored);
    Ok(physical_id)
}

fn update_columns(
    tables: &mut Tables,
    table: &str,
    id: PhysicalId,
    patch: ColumnPatch,
) -> Result<()> {
    let row = tables
        .get_mut(table)
        .and_then(|data| data.rows.get_mut(&id.as_u64()))
        .ok_or_else(|| Error::NotFound(format!("row {} in table {}", id, table)))?;
    patch.apply(row)
}

impl RowSource for MemoryStore {
    fn execute_query(
        &self,
        table: &str,
        predicate: &Predicate,
        order: &[RowOrdering],
        limit: Option<usize>,
    ) -> Result<Vec<VersionedRow>> {
        query_tables(&self.tables.read(), table, predicate, order, limit)
    }
}

impl RelationalStore for MemoryStore {
    type Txn<'a> = MemoryTxn<'a>;

    fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self::Txn<'_>) -> Result<T>,
    {
        let txn_id = Uuid::new_v4();
        let mut guard = self.tables.write();
        let mut txn = MemoryTxn {
            next_physical_id: &self.next_physical_id,
            tables: guard.clone(),
        };
        debug!(txn = %txn_id, "transaction begin");
        match f(&mut txn) {
            Ok(value) => {
                *guard = txn.tables;
                debug!(txn = %txn_id, "transaction committed");
                Ok(value)
            }
            Err(err) => {
                debug!(txn = %txn_id, error = %err, "transaction rolled back");
                Err(err)
            }
        }
    }
}

/// A live transaction over [`MemoryStore`].
///
/// Works on a private copy of the table map; its reads observe its own
/// writes, and nothing becomes visible to others before commit.
#[derive(Debug)]
pub struct MemoryTxn<'a> {
    next_physical_id: &'a AtomicU64,
    tables: Tables,
}

impl RowSource for MemoryTxn<'_> {
    fn execute_query(
        &self,
        table: &str,
        predicate: &Predicate,
        order: &[RowOrdering],
        limit: Option<usize>,
    ) -> Result<Vec<VersionedRow>> {
        query_tables(&self.tables, table, predicate, order, limit)
    }
}

impl StoreSession for MemoryTxn<'_> {
    fn execute_insert(&mut self, table: &str, row: NewRow) -> Result<PhysicalId> {
        insert_row(&mut self.tables, self.next_physical_id, table, row)
    }

    fn execute_update_columns(
        &mut self,
        table: &str,
        id: PhysicalId,
        patch: ColumnPatch,
    ) -> Result<()> {
        update_columns(&mut self.tables, table, id, patch)
    }

    fn lock_rows(&mut self, table: &str, predicate: &Predicate) -> Result<usize> {
        // Transactions are serialized behind the store's write lock, so a
        // row lock degenerates to a validating read.
        Ok(self.execute_query(table, predicate, &[], None)?.len())
    }
}
