//! Time-scoped queries against one versioned table.
//!
//! Every query goes through a [`TemporalScope`]. Unless a filter says
//! otherwise, the scope injects the current-row predicate — valid-time AND
//! transaction-time both contain "now" — so ordinary callers only ever see
//! the single current version of each entity.
//!
//! Axis bounds are state, not accumulated clauses: setting `valid_at` twice
//! keeps only the later bound, and merging two scopes collapses per axis
//! with the later scope winning. Composing scopes can therefore never
//! produce duplicate or conflicting axis clauses.
//!
//! Resolution order per axis: an ambient frame with force precedence wins
//! over everything; otherwise an explicit bound set on the scope wins over
//! the ambient frame; otherwise the default current-row bound applies.

use crate::identity::Record;
use crate::options;
use bitempo_core::predicate::{
    axis_contains, axis_ignored, transaction_contains, Axis, Column, Predicate, TimeRange,
};
use bitempo_core::row::{LogicalId, VersionedRow};
use bitempo_core::schema::{TableSchema, TransactionTimeMode};
use bitempo_core::time::{now, Instant};
use bitempo_core::{Error, Result};
use bitempo_store::{RowOrdering, RowSource};
use tracing::trace;

/// How one time axis is bounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxisBound {
    /// Contains the reference instant (now). The default.
    Current,
    /// Contains a fixed as-of instant.
    At(Instant),
    /// Valid-time intersects a window (`valid_in`).
    Overlapping(TimeRange),
    /// Valid-time lies entirely within a window (`valid_allin`).
    Within(TimeRange),
    /// No filtering on this axis.
    Ignore,
}

/// A composable, time-scoped query over one versioned table.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalScope {
    table: String,
    mode: TransactionTimeMode,
    valid: Option<AxisBound>,
    transaction: Option<AxisBound>,
    ids: Option<Vec<LogicalId>>,
}

impl TemporalScope {
    /// An unbounded scope for `schema`'s table: both axes default to the
    /// current-row bound at query time.
    pub fn for_table(schema: &TableSchema) -> Self {
        TemporalScope {
            table: schema.name().to_string(),
            mode: schema.transaction_time_mode(),
            valid: None,
            transaction: None,
            ids: None,
        }
    }

    /// Pin the valid axis to an as-of instant.
    pub fn valid_at(mut self, t: Instant) -> Self {
        self.valid = Some(AxisBound::At(t));
        self
    }

    /// Pin the transaction axis to an as-of instant.
    pub fn transaction_at(mut self, t: Instant) -> Self {
        self.transaction = Some(AxisBound::At(t));
        self
    }

    /// Pin both axes to the same as-of instant.
    pub fn bitemporal_at(self, t: Instant) -> Self {
        self.valid_at(t).transaction_at(t)
    }

    /// Remove valid-axis filtering: all versions regardless of valid time.
    pub fn ignore_valid_datetime(mut self) -> Self {
        self.valid = Some(AxisBound::Ignore);
        self
    }

    /// Remove transaction-axis filtering: include superseded and deleted
    /// history.
    pub fn ignore_transaction_datetime(mut self) -> Self {
        self.transaction = Some(AxisBound::Ignore);
        self
    }

    /// Include soft-deleted history (synonym for ignoring the transaction
    /// axis).
    pub fn within_deleted(self) -> Self {
        self.ignore_transaction_datetime()
    }

    /// Only rows valid right now (synonym for `valid_at(now)`).
    pub fn without_deleted(self) -> Self {
        let t = now();
        self.valid_at(t)
    }

    /// Rows whose valid-time intersects the window.
    pub fn valid_in(mut self, range: impl Into<TimeRange>) -> Self {
        self.valid = Some(AxisBound::Overlapping(range.into()));
        self
    }

    /// Rows whose valid-time lies entirely within the window. Rejects
    /// exclusive-end ranges, which cannot be mapped onto half-open row
    /// intervals.
    pub fn valid_allin(mut self, range: impl Into<TimeRange>) -> Result<Self> {
        let range = range.into();
        // Surface the rejection at filter-build time, not at execution.
        range.containment_predicate()?;
        self.valid = Some(AxisBound::Within(range));
        Ok(self)
    }

    /// Restrict to one logical entity.
    pub fn bitemporal_for(mut self, id: LogicalId) -> Self {
        self.ids = Some(vec![id]);
        self
    }

    /// Restrict to a set of logical entities.
    pub fn bitemporal_for_any(mut self, ids: impl IntoIterator<Item = LogicalId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    /// All versions of one entity, ignoring valid time.
    pub fn histories_for(self, id: LogicalId) -> Self {
        self.bitemporal_for(id).ignore_valid_datetime()
    }

    /// Merge another scope into this one. Axis bounds collapse — the other
    /// scope's bound wins per axis where set — rather than conjoining.
    pub fn merge(mut self, other: &TemporalScope) -> Self {
        if let Some(valid) = &other.valid {
            self.valid = Some(valid.clone());
        }
        if let Some(transaction) = &other.transaction {
            self.transaction = Some(transaction.clone());
        }
        if let Some(ids) = &other.ids {
            self.ids = Some(ids.clone());
        }
        self
    }

    /// The as-of instant the valid axis resolves to right now, where it
    /// resolves to one (`Current` and `At` bounds).
    pub fn resolved_valid_instant(&self) -> Option<Instant> {
        match self.resolve_axis(Axis::Valid) {
            AxisBound::Current => Some(now()),
            AxisBound::At(t) => Some(t),
            _ => None,
        }
    }

    fn resolve_axis(&self, axis: Axis) -> AxisBound {
        let ambient = options::current();
        let (ambient_ignore, ambient_at, explicit) = match axis {
            Axis::Valid => (ambient.ignore_valid, ambient.valid_at, &self.valid),
            Axis::Transaction => (
                ambient.ignore_transaction,
                ambient.transaction_at,
                &self.transaction,
            ),
        };
        let ambient_bound = if ambient_ignore == Some(true) {
            Some(AxisBound::Ignore)
        } else {
            ambient_at.map(AxisBound::At)
        };
        if ambient.is_force() {
            if let Some(bound) = ambient_bound.clone() {
                return bound;
            }
        }
        if let Some(bound) = explicit {
            return bound.clone();
        }
        ambient_bound.unwrap_or(AxisBound::Current)
    }

    fn axis_predicate(&self, axis: Axis, reference: Instant) -> Result<Predicate> {
        let bound = self.resolve_axis(axis);
        Ok(match (axis, bound) {
            (_, AxisBound::Ignore) => axis_ignored(),
            (Axis::Valid, AxisBound::Current) => axis_contains(Axis::Valid, reference),
            (Axis::Valid, AxisBound::At(t)) => axis_contains(Axis::Valid, t),
            (Axis::Valid, AxisBound::Overlapping(range)) => range.overlap_predicate(),
            (Axis::Valid, AxisBound::Within(range)) => range.containment_predicate()?,
            (Axis::Transaction, AxisBound::Current) => {
                transaction_contains(reference, self.mode)
            }
            (Axis::Transaction, AxisBound::At(t)) => transaction_contains(t, self.mode),
            (Axis::Transaction, bound) => {
                return Err(Error::Validation(format!(
                    "window bounds apply to the valid axis only, got {:?}",
                    bound
                )))
            }
        })
    }

    /// The full predicate this scope denotes, resolved against the ambient
    /// context at call time.
    pub fn predicate(&self) -> Result<Predicate> {
        let reference = now();
        let mut predicate = self
            .axis_predicate(Axis::Valid, reference)?
            .and(self.axis_predicate(Axis::Transaction, reference)?);
        if let Some(ids) = &self.ids {
            predicate = predicate.and(Predicate::logical_id_in(ids.iter().copied()));
        }
        Ok(predicate)
    }

    /// Execute, returning raw rows ordered by `valid_from`.
    pub fn rows<Src: RowSource + ?Sized>(&self, src: &Src) -> Result<Vec<VersionedRow>> {
        let predicate = self.predicate()?;
        trace!(table = %self.table, ?predicate, "scope query");
        src.execute_query(
            &self.table,
            &predicate,
            &[RowOrdering::asc(Column::ValidFrom)],
            None,
        )
    }

    /// Execute, returning hydrated records (identity swap applied).
    pub fn records<Src: RowSource + ?Sized>(&self, src: &Src) -> Result<Vec<Record>> {
        Ok(self.rows(src)?.into_iter().map(Record::from_row).collect())
    }

    /// First matching row by `valid_from`, if any.
    pub fn first<Src: RowSource + ?Sized>(&self, src: &Src) -> Result<Option<VersionedRow>> {
        let predicate = self.predicate()?;
        let rows = src.execute_query(
            &self.table,
            &predicate,
            &[RowOrdering::asc(Column::ValidFrom)],
            Some(1),
        )?;
        Ok(rows.into_iter().next())
    }

    /// Resolve one logical id to its row under this scope, or `None`.
    pub fn find_opt<Src: RowSource + ?Sized>(
        &self,
        src: &Src,
        id: LogicalId,
    ) -> Result<Option<Record>> {
        let scoped = self.clone().bitemporal_for(id);
        Ok(scoped.first(src)?.map(Record::from_row))
    }

    /// Resolve one logical id to its row under this scope.
    pub fn find<Src: RowSource + ?Sized>(&self, src: &Src, id: LogicalId) -> Result<Record> {
        self.find_opt(src, id)?
            .ok_or_else(|| self.not_found_error(id))
    }

    /// Resolve several logical ids, in input order. Fails if any id has no
    /// row under this scope.
    pub fn find_all<Src: RowSource + ?Sized>(
        &self,
        src: &Src,
        ids: &[LogicalId],
    ) -> Result<Vec<Record>> {
        let scoped = self.clone().bitemporal_for_any(ids.iter().copied());
        let rows = scoped.rows(src)?;
        ids.iter()
            .map(|id| {
                rows.iter()
                    .find(|row| row.logical_id == *id)
                    .cloned()
                    .map(Record::from_row)
                    .ok_or_else(|| self.not_found_error(*id))
            })
            .collect()
    }

    /// The entity's history row with the greatest `valid_from`, among live
    /// history (valid time ignored).
    pub fn most_future<Src: RowSource + ?Sized>(
        &self,
        src: &Src,
        id: LogicalId,
    ) -> Result<Option<VersionedRow>> {
        self.history_edge(src, id, true)
    }

    /// The entity's history row with the smallest `valid_from`, among live
    /// history (valid time ignored).
    pub fn most_past<Src: RowSource + ?Sized>(
        &self,
        src: &Src,
        id: LogicalId,
    ) -> Result<Option<VersionedRow>> {
        self.history_edge(src, id, false)
    }

    fn history_edge<Src: RowSource + ?Sized>(
        &self,
        src: &Src,
        id: LogicalId,
        future: bool,
    ) -> Result<Option<VersionedRow>> {
        let scoped = self.clone().bitemporal_for(id).ignore_valid_datetime();
        let predicate = scoped.predicate()?;
        let order = if future {
            RowOrdering::desc(Column::ValidFrom)
        } else {
            RowOrdering::asc(Column::ValidFrom)
        };
        let rows = src.execute_query(&self.table, &predicate, &[order], Some(1))?;
        Ok(rows.into_iter().next())
    }

    fn not_found_error(&self, id: LogicalId) -> Error {
        match self.resolved_valid_instant() {
            Some(t) => Error::NotFound(format!(
                "no row for logical id {} in {} valid at {}",
                id, self.table, t
            )),
            None => Error::NotFound(format!(
                "no row for logical id {} in {} under the current scope",
                id, self.table
            )),
        }
    }
}
