//! The write-time layer: history maintenance on create, update and destroy.
//!
//! One logical entity transitions `non-existent -> current -> (updated ->
//! current)* -> destroyed`; every transition is one store transaction.
//! A normal update at instant `t` closes the current row's transaction-time,
//! inserts a "before" copy covering `[valid_from, t)` and an "after" row
//! covering `[t, valid_to)` with the new payload. A normal destroy inserts a
//! trimmed history copy first, then runs the destroy-hook boundary, then
//! closes the row — so hooks always observe the about-to-be-deleted state
//! already recorded in history. Force variants rewrite in place and do not
//! preserve the trimmed-away history.
//!
//! Cheap interval checks run before the transaction opens; everything is
//! re-derived and re-validated inside the transaction, which is the
//! authoritative pass under concurrency.

use crate::identity::Record;
use crate::options;
use crate::uniqueness::{self, Candidate};
use bitempo_core::interval::Interval;
use bitempo_core::predicate::{transaction_open, Column, Predicate};
use bitempo_core::row::{ColumnPatch, LogicalId, NewRow, PhysicalId, VersionedRow};
use bitempo_core::schema::TableSchema;
use bitempo_core::time::{now, Instant, END_OF_TIME, UNSET_VALID_FROM};
use bitempo_core::value::{merge_payload, Payload};
use bitempo_core::{Error, Result, ValidationFailure};
use bitempo_store::{RelationalStore, RowOrdering, RowSource, StoreSession};
use tracing::debug;

/// A callback run inside the destroy transaction, after the history copy is
/// inserted and before the current row is closed. An error aborts and rolls
/// back the whole destroy.
pub type DestroyHook = std::sync::Arc<dyn Fn(&VersionedRow) -> Result<()> + Send + Sync>;

/// Outcome of an optimistic save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The write committed.
    Saved,
    /// Validation rejected the write; the transaction was rolled back.
    Rejected(Vec<ValidationFailure>),
}

impl SaveOutcome {
    /// Whether the write committed.
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved)
    }
}

/// The versioning state machine for one table.
#[derive(Debug, Clone, Copy)]
pub struct VersionWriter<'a> {
    schema: &'a TableSchema,
}

impl<'a> VersionWriter<'a> {
    /// A writer for `schema`'s table.
    pub fn new(schema: &'a TableSchema) -> Self {
        VersionWriter { schema }
    }

    fn table(&self) -> &str {
        self.schema.name()
    }

    /// Create a new entity. `valid_from` defaults to the ambient as-of
    /// instant (else now), `valid_to` to end-of-time. The entity's logical
    /// id becomes the physical id of this first row.
    pub fn create<S: RelationalStore>(&self, store: &S, payload: Payload) -> Result<Record> {
        self.create_at(store, payload, None, None)
    }

    /// Create with explicit valid bounds.
    pub fn create_at<S: RelationalStore>(
        &self,
        store: &S,
        payload: Payload,
        valid_from: Option<Instant>,
        valid_to: Option<Instant>,
    ) -> Result<Record> {
        self.create_inner(store, None, payload, valid_from, valid_to)
    }

    /// Create carrying a caller-chosen logical id (imports, degraded
    /// deployments). Rejects ids that already have live rows.
    pub fn create_with_logical_id<S: RelationalStore>(
        &self,
        store: &S,
        logical_id: LogicalId,
        payload: Payload,
        valid_from: Option<Instant>,
        valid_to: Option<Instant>,
    ) -> Result<Record> {
        self.create_inner(store, Some(logical_id), payload, valid_from, valid_to)
    }

    fn create_inner<S: RelationalStore>(
        &self,
        store: &S,
        logical_id: Option<LogicalId>,
        payload: Payload,
        valid_from: Option<Instant>,
        valid_to: Option<Instant>,
    ) -> Result<Record> {
        let as_of = options::current().valid_at.unwrap_or_else(now);
        let to = valid_to.unwrap_or(*END_OF_TIME);
        // A record never persisted carries the unset sentinel; the guard's
        // effective-interval rule resolves it to the as-of instant. This is
        // also the cheap pre-transaction bounds check.
        let valid = match valid_from {
            Some(from) => Interval::new(from, to)?,
            None => uniqueness::effective_interval(*UNSET_VALID_FROM, to, as_of, None)?,
        };

        store.with_transaction(|txn| {
            if let Some(id) = logical_id {
                let live = live_rows(txn, self.table(), id)?;
                if !live.is_empty() {
                    return Err(Error::Validation(format!(
                        "duplicate logical id {} on create: {} live row(s) exist",
                        id,
                        live.len()
                    )));
                }
            }
            let failures = uniqueness::check(
                txn,
                self.schema,
                &Candidate {
                    exclude_physical: None,
                    effective: valid,
                    payload: &payload,
                },
            )?;
            if !failures.is_empty() {
                return Err(Error::Uniqueness(failures));
            }

            let recorded_at = now();
            let mut row = NewRow::first_version(valid, recorded_at, payload.clone())?;
            row.logical_id = logical_id;
            let physical_id = txn.execute_insert(self.table(), row)?;
            let stored = fetch_row(txn, self.table(), physical_id)?;
            debug!(
                table = self.table(),
                logical_id = %stored.logical_id,
                physical_id = %physical_id,
                valid = %stored.valid,
                "created entity"
            );
            Ok(Record::from_row(stored))
        })
    }

    /// Update the entity the record fronts. Normal mode appends history;
    /// with the ambient force-update flag set, rewrites the record's own
    /// valid slice in place instead.
    pub fn update<S: RelationalStore>(
        &self,
        store: &S,
        record: &mut Record,
        changes: Payload,
    ) -> Result<()> {
        let opts = options::current();
        if opts.force_update == Some(true) {
            let bounds = record.valid();
            let payload = merge_payload(record.payload(), &changes);
            return self.force_update(store, record, bounds, payload);
        }

        let t = opts.valid_at.unwrap_or_else(now);
        // Cheap pre-check against the record's own state; the loaded
        // current row is re-checked inside the transaction.
        if record.valid().from() == t {
            return Err(Error::ValidDatetimeRange {
                logical_id: record.id(),
                at: t,
                valid_from: record.valid().from(),
            });
        }

        let new_row = store.with_transaction(|txn| {
            self.apply_update(txn, record.id(), record.swapped_id(), record.payload(), &changes, t)
        })?;
        debug!(
            table = self.table(),
            logical_id = %record.id(),
            at = %t,
            new_physical_id = %new_row.physical_id,
            "updated entity"
        );
        record.apply_write(new_row);
        Ok(())
    }

    /// Optimistic update: uniqueness conflicts come back as a rejection
    /// value (transaction rolled back) instead of an error.
    pub fn try_update<S: RelationalStore>(
        &self,
        store: &S,
        record: &mut Record,
        changes: Payload,
    ) -> Result<SaveOutcome> {
        match self.update(store, record, changes) {
            Ok(()) => Ok(SaveOutcome::Saved),
            Err(Error::Uniqueness(failures)) => Ok(SaveOutcome::Rejected(failures)),
            Err(err) => Err(err),
        }
    }

    fn apply_update<Sess: StoreSession>(
        &self,
        txn: &mut Sess,
        id: LogicalId,
        fronted_physical: PhysicalId,
        fronted_payload: &Payload,
        changes: &Payload,
        t: Instant,
    ) -> Result<VersionedRow> {
        let live = live_rows(txn, self.table(), id)?;
        if live.is_empty() {
            return Err(Error::NotFound(format!(
                "logical id {} has no live rows to update at {}",
                id, t
            )));
        }

        let recorded_at = now();
        if let Some(current) = live.iter().find(|row| row.valid.contains(t)) {
            if current.valid.from() == t {
                return Err(Error::ValidDatetimeRange {
                    logical_id: id,
                    at: t,
                    valid_from: current.valid.from(),
                });
            }
            let merged = merge_payload(&current.payload, changes);
            let after_interval = current.valid.since(t).ok_or_else(|| {
                Error::Validation(format!(
                    "update instant {} lies outside the current row's interval {}",
                    t, current.valid
                ))
            })?;
            self.guard(txn, Some(current.physical_id), after_interval, &merged)?;

            // Close the superseded row, then write both halves of the split.
            txn.execute_update_columns(
                self.table(),
                current.physical_id,
                ColumnPatch::close_transaction(recorded_at),
            )?;
            let before_interval = current.valid.before(t).ok_or_else(|| {
                Error::Validation(format!(
                    "update instant {} leaves an empty before-interval of {}",
                    t, current.valid
                ))
            })?;
            let mut before = NewRow::continuation(
                id,
                before_interval,
                recorded_at,
                current.payload.clone(),
            )?;
            before.force_updated = current.force_updated;
            txn.execute_insert(self.table(), before)?;

            let after = NewRow::continuation(id, after_interval, recorded_at, merged)?;
            let after_id = txn.execute_insert(self.table(), after)?;
            fetch_row(txn, self.table(), after_id)
        } else {
            // `t` falls in a gap or before the entity's window: fill up to
            // the nearest future row, or open-ended when none exists.
            let upper = live
                .iter()
                .filter(|row| row.valid.from() > t)
                .map(|row| row.valid.from())
                .min()
                .unwrap_or(*END_OF_TIME);
            let interval = Interval::new(t, upper)?;
            let merged = merge_payload(fronted_payload, changes);
            self.guard(txn, Some(fronted_physical), interval, &merged)?;
            let row = NewRow::continuation(id, interval, recorded_at, merged)?;
            let physical_id = txn.execute_insert(self.table(), row)?;
            fetch_row(txn, self.table(), physical_id)
        }
    }

    /// Rewrite history so that exactly `bounds` carries `payload`.
    ///
    /// Rows partially overlapping the bounds are trimmed, rows fully inside
    /// are absorbed, rows touching at a single boundary are untouched. The
    /// trimmed-away history is intentionally not preserved — this is a
    /// correction, not a versioning operation — and the written row carries
    /// the force-updated audit marker.
    pub fn force_update<S: RelationalStore>(
        &self,
        store: &S,
        record: &mut Record,
        bounds: Interval,
        payload: Payload,
    ) -> Result<()> {
        let id = record.id();
        let new_row = store.with_transaction(|txn| {
            let live = live_rows(txn, self.table(), id)?;
            if live.is_empty() {
                return Err(Error::NotFound(format!(
                    "logical id {} has no live rows to force-update",
                    id
                )));
            }
            let recorded_at = now();
            for row in live.iter().filter(|row| row.valid.overlaps(&bounds)) {
                txn.execute_update_columns(
                    self.table(),
                    row.physical_id,
                    ColumnPatch::close_transaction(recorded_at),
                )?;
                if let Some(head) = row.valid.before(bounds.from()) {
                    let mut remnant =
                        NewRow::continuation(id, head, recorded_at, row.payload.clone())?;
                    remnant.force_updated = row.force_updated;
                    txn.execute_insert(self.table(), remnant)?;
                }
                if let Some(tail) = row.valid.since(bounds.to()) {
                    let mut remnant =
                        NewRow::continuation(id, tail, recorded_at, row.payload.clone())?;
                    remnant.force_updated = row.force_updated;
                    txn.execute_insert(self.table(), remnant)?;
                }
            }

            // Guard after absorption: rows this rewrite supersedes must not
            // count as conflicts.
            self.guard(txn, None, bounds, &payload)?;

            let mut row = NewRow::continuation(id, bounds, recorded_at, payload.clone())?;
            row.force_updated = true;
            let physical_id = txn.execute_insert(self.table(), row)?;
            fetch_row(txn, self.table(), physical_id)
        })?;
        debug!(
            table = self.table(),
            logical_id = %id,
            bounds = %bounds,
            "force-updated entity"
        );
        record.apply_write(new_row);
        Ok(())
    }

    /// Destroy the entity at the ambient as-of instant (else now).
    ///
    /// Inserts the trimmed history copy, runs the hooks, then closes the
    /// current row — all in one transaction. Any error rolls everything
    /// back, including the pre-inserted history row.
    pub fn destroy<S: RelationalStore>(
        &self,
        store: &S,
        record: &Record,
        hooks: &[DestroyHook],
    ) -> Result<()> {
        let t = options::current().valid_at.unwrap_or_else(now);
        let id = record.id();
        store.with_transaction(|txn| {
            let live = live_rows(txn, self.table(), id)?;
            let current = live
                .iter()
                .find(|row| row.valid.contains(t))
                .ok_or_else(|| {
                    Error::NotFound(format!(
                        "logical id {} has no currently valid row to destroy at {}",
                        id, t
                    ))
                })?;

            let recorded_at = now();
            let history_interval = current.valid.before(t).ok_or_else(|| {
                Error::ValidDatetimeRange {
                    logical_id: id,
                    at: t,
                    valid_from: current.valid.from(),
                }
            })?;
            let mut history = NewRow::continuation(
                id,
                history_interval,
                recorded_at,
                current.payload.clone(),
            )?;
            history.force_updated = current.force_updated;
            txn.execute_insert(self.table(), history)?;

            // Hook boundary: history is already recorded when these run.
            for hook in hooks {
                (hook.as_ref())(current)?;
            }

            txn.execute_update_columns(
                self.table(),
                current.physical_id,
                ColumnPatch::close_transaction(recorded_at),
            )?;
            debug!(
                table = self.table(),
                logical_id = %id,
                at = %t,
                "destroyed entity"
            );
            Ok(())
        })
    }

    /// Optimistic destroy: `Ok(false)` when there is nothing to destroy.
    pub fn try_destroy<S: RelationalStore>(
        &self,
        store: &S,
        record: &Record,
        hooks: &[DestroyHook],
    ) -> Result<bool> {
        match self.destroy(store, record, hooks) {
            Ok(()) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Force destroy: close the fronted row's transaction-time without
    /// recording a trimmed history entry.
    pub fn destroy_force<S: RelationalStore>(&self, store: &S, record: &Record) -> Result<()> {
        let physical_id = record.swapped_id();
        store.with_transaction(|txn| {
            let predicate = Predicate::physical_id_eq(physical_id).and(transaction_open());
            let rows = txn.execute_query(self.table(), &predicate, &[], None)?;
            if rows.is_empty() {
                return Err(Error::NotFound(format!(
                    "physical row {} is not live in {}",
                    physical_id,
                    self.table()
                )));
            }
            txn.execute_update_columns(
                self.table(),
                physical_id,
                ColumnPatch::close_transaction(now()),
            )?;
            debug!(
                table = self.table(),
                physical_id = %physical_id,
                "force-destroyed row"
            );
            Ok(())
        })
    }

    fn guard<Sess: StoreSession>(
        &self,
        txn: &Sess,
        exclude_physical: Option<PhysicalId>,
        effective: Interval,
        payload: &Payload,
    ) -> Result<()> {
        let failures = uniqueness::check(
            txn,
            self.schema,
            &Candidate {
                exclude_physical,
                effective,
                payload,
            },
        )?;
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Uniqueness(failures))
        }
    }
}

/// Transaction-open rows of one entity, valid time ignored, ordered by
/// `valid_from`.
pub fn live_rows<Src: RowSource + ?Sized>(
    src: &Src,
    table: &str,
    id: LogicalId,
) -> Result<Vec<VersionedRow>> {
    src.execute_query(
        table,
        &Predicate::logical_id_eq(id).and(transaction_open()),
        &[RowOrdering::asc(Column::ValidFrom)],
        None,
    )
}

fn fetch_row<Src: RowSource + ?Sized>(
    src: &Src,
    table: &str,
    id: PhysicalId,
) -> Result<VersionedRow> {
    let rows = src.execute_query(table, &Predicate::physical_id_eq(id), &[], None)?;
    rows.into_iter().next().ok_or_else(|| {
        Error::Store(format!("row {} vanished after insert into {}", id, table))
    })
}
