//! The per-entity surface: queries and mutations against one versioned
//! table.
//!
//! Every read goes through a [`Query`], which wraps a temporal scope and
//! injects the current-row filter unless told otherwise. Every write goes
//! through the version writer inside one store transaction. Strict variants
//! error on absence; `*_opt` / `try_*` variants return `None`, `false`, or
//! a rejection value instead.

use crate::database::TableEntry;
use crate::error::{Error, Result};
use crate::visualize;
use bitempo_core::interval::Interval;
use bitempo_core::predicate::TimeRange;
use bitempo_core::row::{LogicalId, VersionedRow};
use bitempo_core::schema::TableSchema;
use bitempo_core::time::Instant;
use bitempo_core::value::Payload;
use bitempo_engine::scope::TemporalScope;
use bitempo_engine::writer::{SaveOutcome, VersionWriter};
use bitempo_engine::Record;
use bitempo_store::RelationalStore;

/// Query and mutation surface for one versioned table.
pub struct VersionedTable<'db, S: RelationalStore> {
    store: &'db S,
    entry: &'db TableEntry,
}

impl<'db, S: RelationalStore> std::fmt::Debug for VersionedTable<'db, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedTable")
            .field("schema", &self.entry.schema)
            .finish_non_exhaustive()
    }
}

impl<'db, S: RelationalStore> VersionedTable<'db, S> {
    pub(crate) fn new(store: &'db S, entry: &'db TableEntry) -> Self {
        VersionedTable { store, entry }
    }

    /// The table's schema.
    pub fn schema(&self) -> &TableSchema {
        &self.entry.schema
    }

    fn writer(&self) -> VersionWriter<'_> {
        VersionWriter::new(&self.entry.schema)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// A query with the default current-row scope.
    pub fn query(&self) -> Query<'db, S> {
        Query {
            store: self.store,
            scope: TemporalScope::for_table(&self.entry.schema),
        }
    }

    /// Resolve a logical id to its current row. Errors when the entity has
    /// no currently-valid row (e.g. after destroy).
    pub fn find(&self, id: LogicalId) -> Result<Record> {
        self.query().find(id)
    }

    /// Non-raising [`find`](Self::find).
    pub fn find_opt(&self, id: LogicalId) -> Result<Option<Record>> {
        self.query().find_opt(id)
    }

    /// Resolve several logical ids to their current rows, in input order.
    /// Errors if any id has no currently-valid row.
    pub fn find_many(&self, ids: &[LogicalId]) -> Result<Vec<Record>> {
        self.query().find_many(ids)
    }

    /// Resolve a logical id as of valid instant `t`.
    pub fn find_at_time(&self, t: Instant, id: LogicalId) -> Result<Record> {
        self.valid_at(t).find(id)
    }

    /// Non-raising [`find_at_time`](Self::find_at_time).
    pub fn find_at_time_opt(&self, t: Instant, id: LogicalId) -> Result<Option<Record>> {
        self.valid_at(t).find_opt(id)
    }

    /// Query as of valid instant `t`.
    pub fn valid_at(&self, t: Instant) -> Query<'db, S> {
        self.query().valid_at(t)
    }

    /// Query as of transaction instant `t`.
    pub fn transaction_at(&self, t: Instant) -> Query<'db, S> {
        self.query().transaction_at(t)
    }

    /// Query across all valid time.
    pub fn ignore_valid_datetime(&self) -> Query<'db, S> {
        self.query().ignore_valid_datetime()
    }

    /// Query across all transaction time.
    pub fn ignore_transaction_datetime(&self) -> Query<'db, S> {
        self.query().ignore_transaction_datetime()
    }

    /// Include soft-deleted history.
    pub fn within_deleted(&self) -> Query<'db, S> {
        self.query().within_deleted()
    }

    /// Only rows valid right now.
    pub fn without_deleted(&self) -> Query<'db, S> {
        self.query().without_deleted()
    }

    /// Restrict to one logical entity (axes unchanged).
    pub fn bitemporal_for(&self, id: LogicalId) -> Query<'db, S> {
        self.query().bitemporal_for(id)
    }

    /// All live versions of one entity, ignoring valid time.
    pub fn histories_for(&self, id: LogicalId) -> Query<'db, S> {
        self.query().histories_for(id)
    }

    /// The entity's live history row with the greatest `valid_from`.
    pub fn most_future(&self, id: LogicalId) -> Result<Option<Record>> {
        self.query().most_future(id)
    }

    /// The entity's live history row with the smallest `valid_from`.
    pub fn most_past(&self, id: LogicalId) -> Result<Option<Record>> {
        self.query().most_past(id)
    }

    /// Rows whose valid-time intersects the window.
    pub fn valid_in(&self, range: impl Into<TimeRange>) -> Query<'db, S> {
        self.query().valid_in(range)
    }

    /// Rows whose valid-time lies entirely within the window. Rejects
    /// exclusive-end ranges.
    pub fn valid_allin(&self, range: impl Into<TimeRange>) -> Result<Query<'db, S>> {
        self.query().valid_allin(range)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Create an entity. Valid-from defaults to the ambient as-of instant
    /// (else now), valid-to to end-of-time.
    pub fn create(&self, payload: Payload) -> Result<Record> {
        self.writer().create(self.store, payload).map_err(Error::from)
    }

    /// Create with explicit valid bounds.
    pub fn create_at(
        &self,
        payload: Payload,
        valid_from: Option<Instant>,
        valid_to: Option<Instant>,
    ) -> Result<Record> {
        self.writer()
            .create_at(self.store, payload, valid_from, valid_to)
            .map_err(Error::from)
    }

    /// Update the entity the record fronts, appending history. With the
    /// ambient force-update flag set, rewrites in place instead.
    pub fn update(&self, record: &mut Record, changes: Payload) -> Result<()> {
        self.writer()
            .update(self.store, record, changes)
            .map_err(Error::from)
    }

    /// Optimistic update: uniqueness conflicts come back as a rejection
    /// value instead of an error.
    pub fn try_update(&self, record: &mut Record, changes: Payload) -> Result<SaveOutcome> {
        self.writer()
            .try_update(self.store, record, changes)
            .map_err(Error::from)
    }

    /// Rewrite history so that exactly `bounds` carries `payload`. Trimmed
    /// history is not preserved; the written row carries the force-updated
    /// audit marker.
    pub fn force_update(
        &self,
        record: &mut Record,
        bounds: Interval,
        payload: Payload,
    ) -> Result<()> {
        self.writer()
            .force_update(self.store, record, bounds, payload)
            .map_err(Error::from)
    }

    /// Destroy the entity at the ambient as-of instant (else now),
    /// recording the pre-destroy state as history first.
    pub fn destroy(&self, record: &Record) -> Result<()> {
        self.writer()
            .destroy(self.store, record, &self.entry.hooks)
            .map_err(Error::from)
    }

    /// Optimistic destroy: `Ok(false)` when there is nothing to destroy.
    pub fn try_destroy(&self, record: &Record) -> Result<bool> {
        self.writer()
            .try_destroy(self.store, record, &self.entry.hooks)
            .map_err(Error::from)
    }

    /// Close the fronted row's transaction-time without recording history.
    pub fn destroy_force(&self, record: &Record) -> Result<()> {
        self.writer()
            .destroy_force(self.store, record)
            .map_err(Error::from)
    }

    /// Re-load the record's current row, clearing previous-swap memory.
    pub fn reload(&self, record: &mut Record) -> Result<()> {
        let fresh = self.find(record.id())?;
        record.reload_from(fresh.row().clone());
        Ok(())
    }

    /// Render the entity's full bitemporal history as a text grid:
    /// transaction-time rows by valid-time columns.
    pub fn visualize(&self, id: LogicalId) -> Result<String> {
        let rows = self
            .query()
            .ignore_valid_datetime()
            .ignore_transaction_datetime()
            .bitemporal_for(id)
            .rows()?;
        Ok(visualize::render(&rows))
    }
}

/// A composable time-scoped query. Axis filters are state: setting a bound
/// twice keeps the later one, so composition never stacks conflicting
/// clauses.
#[derive(Debug)]
pub struct Query<'db, S: RelationalStore> {
    store: &'db S,
    scope: TemporalScope,
}

impl<'db, S: RelationalStore> Query<'db, S> {
    /// Pin the valid axis to an as-of instant.
    pub fn valid_at(mut self, t: Instant) -> Self {
        self.scope = self.scope.valid_at(t);
        self
    }

    /// Pin the transaction axis to an as-of instant.
    pub fn transaction_at(mut self, t: Instant) -> Self {
        self.scope = self.scope.transaction_at(t);
        self
    }

    /// Pin both axes to the same as-of instant.
    pub fn bitemporal_at(mut self, t: Instant) -> Self {
        self.scope = self.scope.bitemporal_at(t);
        self
    }

    /// Remove valid-axis filtering.
    pub fn ignore_valid_datetime(mut self) -> Self {
        self.scope = self.scope.ignore_valid_datetime();
        self
    }

    /// Remove transaction-axis filtering.
    pub fn ignore_transaction_datetime(mut self) -> Self {
        self.scope = self.scope.ignore_transaction_datetime();
        self
    }

    /// Include soft-deleted history.
    pub fn within_deleted(mut self) -> Self {
        self.scope = self.scope.within_deleted();
        self
    }

    /// Only rows valid right now.
    pub fn without_deleted(mut self) -> Self {
        self.scope = self.scope.without_deleted();
        self
    }

    /// Restrict to one logical entity.
    pub fn bitemporal_for(mut self, id: LogicalId) -> Self {
        self.scope = self.scope.bitemporal_for(id);
        self
    }

    /// All live versions of one entity, ignoring valid time.
    pub fn histories_for(mut self, id: LogicalId) -> Self {
        self.scope = self.scope.histories_for(id);
        self
    }

    /// Rows whose valid-time intersects the window.
    pub fn valid_in(mut self, range: impl Into<TimeRange>) -> Self {
        self.scope = self.scope.valid_in(range);
        self
    }

    /// Rows whose valid-time lies entirely within the window. Rejects
    /// exclusive-end ranges.
    pub fn valid_allin(mut self, range: impl Into<TimeRange>) -> Result<Self> {
        self.scope = self.scope.valid_allin(range)?;
        Ok(self)
    }

    /// Merge another query's scope into this one; the other side wins per
    /// axis where it has a bound set.
    pub fn merge(mut self, other: &Query<'db, S>) -> Self {
        self.scope = self.scope.merge(&other.scope);
        self
    }

    /// Execute, returning raw rows ordered by `valid_from`.
    pub fn rows(&self) -> Result<Vec<VersionedRow>> {
        self.scope.rows(self.store).map_err(Error::from)
    }

    /// Execute, returning hydrated records.
    pub fn records(&self) -> Result<Vec<Record>> {
        self.scope.records(self.store).map_err(Error::from)
    }

    /// First matching record by `valid_from`, if any.
    pub fn first(&self) -> Result<Option<Record>> {
        Ok(self
            .scope
            .first(self.store)
            .map_err(Error::from)?
            .map(Record::from_row))
    }

    /// Number of matching rows.
    pub fn count(&self) -> Result<usize> {
        Ok(self.rows()?.len())
    }

    /// Resolve a logical id under this query's scope.
    pub fn find(&self, id: LogicalId) -> Result<Record> {
        self.scope.find(self.store, id).map_err(Error::from)
    }

    /// Non-raising [`find`](Self::find).
    pub fn find_opt(&self, id: LogicalId) -> Result<Option<Record>> {
        self.scope.find_opt(self.store, id).map_err(Error::from)
    }

    /// Resolve several logical ids, in input order; errors if any is
    /// missing under this scope.
    pub fn find_many(&self, ids: &[LogicalId]) -> Result<Vec<Record>> {
        self.scope.find_all(self.store, ids).map_err(Error::from)
    }

    /// The entity's live history row with the greatest `valid_from`.
    pub fn most_future(&self, id: LogicalId) -> Result<Option<Record>> {
        Ok(self
            .scope
            .most_future(self.store, id)
            .map_err(Error::from)?
            .map(Record::from_row))
    }

    /// The entity's live history row with the smallest `valid_from`.
    pub fn most_past(&self, id: LogicalId) -> Result<Option<Record>> {
        Ok(self
            .scope
            .most_past(self.store, id)
            .map_err(Error::from)?
            .map(Record::from_row))
    }
}
