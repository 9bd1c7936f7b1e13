//! Time-axis predicates and the boolean expression tree the store evaluates.
//!
//! Query layers never compare instants themselves; they build [`Predicate`]
//! values here and hand them to the relational store. The as-of form for an
//! axis is `axis_from <= t AND axis_to > t` (upper bound exclusive: a row is
//! NOT valid at exactly its `valid_to`), the range-overlap form is
//! `axis_from < to AND axis_to > from`, and ignoring an axis removes its
//! filtering entirely.

use crate::error::{Error, Result};
use crate::row::VersionedRow;
use crate::schema::TransactionTimeMode;
use crate::time::Instant;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The two time axes of a versioned row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Real-world applicability.
    Valid,
    /// Database-belief applicability.
    Transaction,
}

impl Axis {
    /// Column holding this axis's lower bound.
    pub fn from_column(&self) -> Column {
        match self {
            Axis::Valid => Column::ValidFrom,
            Axis::Transaction => Column::TransactionFrom,
        }
    }

    /// Column holding this axis's upper bound.
    pub fn to_column(&self) -> Column {
        match self {
            Axis::Valid => Column::ValidTo,
            Axis::Transaction => Column::TransactionTo,
        }
    }
}

/// A queryable column of a versioned row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    /// Store-assigned row id.
    PhysicalId,
    /// Entity id shared across versions.
    LogicalId,
    /// Valid-time lower bound.
    ValidFrom,
    /// Valid-time upper bound.
    ValidTo,
    /// Transaction-time lower bound.
    TransactionFrom,
    /// Transaction-time upper bound.
    TransactionTo,
    /// An entity payload column, by name.
    Payload(String),
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// A comparison operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    /// A row or entity id.
    Id(u64),
    /// A time-axis instant.
    Instant(Instant),
    /// A payload value.
    Value(Value),
}

/// Ordering between two scalars of the same kind; `None` across kinds or
/// across payload value types.
pub fn compare(a: &Scalar, b: &Scalar) -> Option<Ordering> {
    match (a, b) {
        (Scalar::Id(x), Scalar::Id(y)) => x.partial_cmp(y),
        (Scalar::Instant(x), Scalar::Instant(y)) => x.partial_cmp(y),
        (Scalar::Value(x), Scalar::Value(y)) => x.partial_cmp_same_type(y),
        _ => None,
    }
}

/// The scalar stored in `column` for `row`. Missing payload columns read as
/// `Null`, matching relational semantics.
pub fn row_scalar(row: &VersionedRow, column: &Column) -> Scalar {
    match column {
        Column::PhysicalId => Scalar::Id(row.physical_id.as_u64()),
        Column::LogicalId => Scalar::Id(row.logical_id.as_u64()),
        Column::ValidFrom => Scalar::Instant(row.valid.from()),
        Column::ValidTo => Scalar::Instant(row.valid.to()),
        Column::TransactionFrom => Scalar::Instant(row.transaction.from()),
        Column::TransactionTo => Scalar::Instant(row.transaction.to()),
        Column::Payload(name) => Scalar::Value(
            row.payload.get(name).cloned().unwrap_or(Value::Null),
        ),
    }
}

/// A boolean expression over row columns, evaluable by any store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Matches every row.
    True,
    /// A single column comparison.
    Cmp {
        /// Column under comparison.
        column: Column,
        /// Operator.
        op: CmpOp,
        /// Right-hand operand.
        value: Scalar,
    },
    /// Id-column membership (`IN` list).
    AnyId {
        /// `PhysicalId` or `LogicalId`.
        column: Column,
        /// Accepted raw ids.
        ids: Vec<u64>,
    },
    /// Conjunction.
    And(Vec<Predicate>),
    /// Disjunction.
    Or(Vec<Predicate>),
    /// Negation.
    Not(Box<Predicate>),
}

impl Predicate {
    /// Single comparison.
    pub fn cmp(column: Column, op: CmpOp, value: Scalar) -> Self {
        Predicate::Cmp { column, op, value }
    }

    /// `logical_id = id`
    pub fn logical_id_eq(id: crate::row::LogicalId) -> Self {
        Predicate::cmp(Column::LogicalId, CmpOp::Eq, Scalar::Id(id.as_u64()))
    }

    /// `logical_id IN (ids...)`
    pub fn logical_id_in(ids: impl IntoIterator<Item = crate::row::LogicalId>) -> Self {
        Predicate::AnyId {
            column: Column::LogicalId,
            ids: ids.into_iter().map(|id| id.as_u64()).collect(),
        }
    }

    /// `physical_id = id`
    pub fn physical_id_eq(id: crate::row::PhysicalId) -> Self {
        Predicate::cmp(Column::PhysicalId, CmpOp::Eq, Scalar::Id(id.as_u64()))
    }

    /// `payload[column] = value`
    pub fn payload_eq(column: impl Into<String>, value: Value) -> Self {
        Predicate::cmp(Column::Payload(column.into()), CmpOp::Eq, Scalar::Value(value))
    }

    /// Conjoin with another predicate, flattening nested `And`s and
    /// dropping `True` operands.
    pub fn and(self, other: Predicate) -> Self {
        let mut operands = Vec::new();
        for p in [self, other] {
            match p {
                Predicate::True => {}
                Predicate::And(mut inner) => operands.append(&mut inner),
                p => operands.push(p),
            }
        }
        match operands.len() {
            0 => Predicate::True,
            1 => operands.pop().expect("one operand"),
            _ => Predicate::And(operands),
        }
    }

    /// Evaluate against a row.
    pub fn matches(&self, row: &VersionedRow) -> bool {
        match self {
            Predicate::True => true,
            Predicate::Cmp { column, op, value } => {
                let lhs = row_scalar(row, column);
                match op {
                    CmpOp::Eq => lhs == *value,
                    CmpOp::Ne => lhs != *value,
                    CmpOp::Lt => compare(&lhs, value) == Some(Ordering::Less),
                    CmpOp::Le => matches!(
                        compare(&lhs, value),
                        Some(Ordering::Less) | Some(Ordering::Equal)
                    ),
                    CmpOp::Gt => compare(&lhs, value) == Some(Ordering::Greater),
                    CmpOp::Ge => matches!(
                        compare(&lhs, value),
                        Some(Ordering::Greater) | Some(Ordering::Equal)
                    ),
                }
            }
            Predicate::AnyId { column, ids } => match row_scalar(row, column) {
                Scalar::Id(id) => ids.contains(&id),
                _ => false,
            },
            Predicate::And(ps) => ps.iter().all(|p| p.matches(row)),
            Predicate::Or(ps) => ps.iter().any(|p| p.matches(row)),
            Predicate::Not(p) => !p.matches(row),
        }
    }
}

/// As-of form: `axis_from <= t AND axis_to > t`.
pub fn axis_contains(axis: Axis, t: Instant) -> Predicate {
    Predicate::cmp(axis.from_column(), CmpOp::Le, Scalar::Instant(t)).and(Predicate::cmp(
        axis.to_column(),
        CmpOp::Gt,
        Scalar::Instant(t),
    ))
}

/// Range-overlap form: `axis_from < to AND axis_to > from`. Used for
/// history queries spanning a window.
pub fn axis_overlaps(axis: Axis, from: Instant, to: Instant) -> Predicate {
    Predicate::cmp(axis.from_column(), CmpOp::Lt, Scalar::Instant(to)).and(Predicate::cmp(
        axis.to_column(),
        CmpOp::Gt,
        Scalar::Instant(from),
    ))
}

/// Ignore-axis form: no filtering on the axis at all.
pub fn axis_ignored() -> Predicate {
    Predicate::True
}

/// Live-history form: rows whose transaction-time is still open. Works for
/// both transaction-time representations, since an open row carries the
/// end-of-time sentinel either way.
pub fn transaction_open() -> Predicate {
    Predicate::cmp(
        Column::TransactionTo,
        CmpOp::Eq,
        Scalar::Instant(*crate::time::END_OF_TIME),
    )
}

/// Transaction-axis as-of form, honoring the table's representation.
///
/// In the legacy soft-delete representation only the close marker is
/// trustworthy, so the lower bound is not constrained.
pub fn transaction_contains(t: Instant, mode: TransactionTimeMode) -> Predicate {
    match mode {
        TransactionTimeMode::Interval => axis_contains(Axis::Transaction, t),
        TransactionTimeMode::DeletedAt => {
            Predicate::cmp(Column::TransactionTo, CmpOp::Gt, Scalar::Instant(t))
        }
    }
}

/// Current-row form: valid-time contains `valid_t` AND transaction-time
/// contains `transaction_t`. The implicit filter on every query against a
/// versioned entity.
pub fn bitemporal_at(valid_t: Instant, transaction_t: Instant, mode: TransactionTimeMode) -> Predicate {
    axis_contains(Axis::Valid, valid_t).and(transaction_contains(transaction_t, mode))
}

/// A caller-supplied valid-time window with its end-exclusivity preserved.
///
/// `valid_in` accepts either kind of end; the `allin` variant rejects
/// exclusive ends because they cannot be converted unambiguously to the
/// engine's half-open semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    from: Instant,
    to: Instant,
    exclusive_end: bool,
}

impl TimeRange {
    /// `[from, to)` — end excluded.
    pub fn half_open(from: Instant, to: Instant) -> Result<Self> {
        if from >= to {
            return Err(Error::Validation(format!(
                "range lower bound {} must precede upper bound {}",
                from, to
            )));
        }
        Ok(TimeRange { from, to, exclusive_end: true })
    }

    /// `[from, to]` — end included.
    pub fn inclusive(from: Instant, to: Instant) -> Result<Self> {
        if from > to {
            return Err(Error::Validation(format!(
                "range lower bound {} must not follow upper bound {}",
                from, to
            )));
        }
        Ok(TimeRange { from, to, exclusive_end: false })
    }

    /// Lower bound (always inclusive).
    pub fn from(&self) -> Instant {
        self.from
    }

    /// Upper bound.
    pub fn to(&self) -> Instant {
        self.to
    }

    /// Whether the upper bound is excluded.
    pub fn is_end_exclusive(&self) -> bool {
        self.exclusive_end
    }

    /// Overlap predicate for `valid_in`: rows whose valid-time intersects
    /// the window.
    pub fn overlap_predicate(&self) -> Predicate {
        let upper_op = if self.exclusive_end { CmpOp::Lt } else { CmpOp::Le };
        Predicate::cmp(Column::ValidFrom, upper_op, Scalar::Instant(self.to)).and(Predicate::cmp(
            Column::ValidTo,
            CmpOp::Gt,
            Scalar::Instant(self.from),
        ))
    }

    /// Containment predicate for `valid_allin`: rows whose valid-time lies
    /// entirely within the window. Rejects exclusive-end ranges.
    pub fn containment_predicate(&self) -> Result<Predicate> {
        if self.exclusive_end {
            return Err(Error::Validation(
                "valid_allin requires an inclusive-end range; an exclusive end \
                 cannot be mapped onto half-open row intervals"
                    .to_string(),
            ));
        }
        Ok(
            Predicate::cmp(Column::ValidFrom, CmpOp::Ge, Scalar::Instant(self.from)).and(
                Predicate::cmp(Column::ValidTo, CmpOp::Le, Scalar::Instant(self.to)),
            ),
        )
    }
}

impl From<std::ops::Range<Instant>> for TimeRange {
    fn from(r: std::ops::Range<Instant>) -> Self {
        TimeRange {
            from: r.start,
            to: r.end,
            exclusive_end: true,
        }
    }
}

impl From<std::ops::RangeInclusive<Instant>> for TimeRange {
    fn from(r: std::ops::RangeInclusive<Instant>) -> Self {
        TimeRange {
            from: *r.start(),
            to: *r.end(),
            exclusive_end: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;
    use crate::row::{LogicalId, PhysicalId};
    use crate::value::Payload;
    use chrono::{TimeZone, Utc};

    fn at(month: u32, day: u32) -> Instant {
        Utc.with_ymd_and_hms(2020, month, day, 0, 0, 0).unwrap()
    }

    fn row(valid_from: Instant, valid_to: Instant) -> VersionedRow {
        VersionedRow {
            physical_id: PhysicalId::new(1),
            logical_id: LogicalId::new(1),
            valid: Interval::new(valid_from, valid_to).unwrap(),
            transaction: Interval::from_instant(at(1, 1)).unwrap(),
            force_updated: false,
            payload: Payload::new(),
        }
    }

    #[test]
    fn as_of_form_excludes_the_upper_bound() {
        let r = row(at(1, 1), at(2, 1));
        assert!(axis_contains(Axis::Valid, at(1, 1)).matches(&r));
        assert!(axis_contains(Axis::Valid, at(1, 15)).matches(&r));
        assert!(!axis_contains(Axis::Valid, at(2, 1)).matches(&r), "valid_to is exclusive");
    }

    #[test]
    fn overlap_form_ignores_touching_rows() {
        let r = row(at(1, 1), at(2, 1));
        assert!(axis_overlaps(Axis::Valid, at(1, 20), at(3, 1)).matches(&r));
        assert!(!axis_overlaps(Axis::Valid, at(2, 1), at(3, 1)).matches(&r));
    }

    #[test]
    fn ignored_axis_matches_everything() {
        assert!(axis_ignored().matches(&row(at(1, 1), at(1, 2))));
    }

    #[test]
    fn deleted_at_mode_skips_the_lower_transaction_bound() {
        let mut r = row(at(1, 1), at(2, 1));
        // Probe before the row was recorded: the full interval form says no,
        // the soft-delete form only checks the close marker.
        let probe = at(1, 1) - chrono::Duration::days(30);
        r.transaction = Interval::from_instant(at(1, 1)).unwrap();
        assert!(!transaction_contains(probe, TransactionTimeMode::Interval).matches(&r));
        assert!(transaction_contains(probe, TransactionTimeMode::DeletedAt).matches(&r));
    }

    #[test]
    fn payload_comparisons_read_missing_columns_as_null() {
        let r = row(at(1, 1), at(2, 1));
        assert!(Predicate::payload_eq("name", Value::Null).matches(&r));
        assert!(!Predicate::payload_eq("name", Value::from("A")).matches(&r));
    }

    #[test]
    fn and_flattens_and_drops_true() {
        let p = Predicate::True
            .and(Predicate::physical_id_eq(PhysicalId::new(1)))
            .and(Predicate::True);
        assert!(matches!(p, Predicate::Cmp { .. }));
    }

    #[test]
    fn allin_rejects_exclusive_end_ranges() {
        let range = TimeRange::from(at(1, 1)..at(2, 1));
        assert!(range.containment_predicate().is_err());
        let range = TimeRange::from(at(1, 1)..=at(2, 1));
        assert!(range.containment_predicate().is_ok());
    }

    #[test]
    fn valid_in_honors_end_exclusivity() {
        // Row starting exactly at the window's end.
        let r = row(at(2, 1), at(3, 1));
        let exclusive = TimeRange::from(at(1, 1)..at(2, 1));
        let inclusive = TimeRange::from(at(1, 1)..=at(2, 1));
        assert!(!exclusive.overlap_predicate().matches(&r));
        assert!(inclusive.overlap_predicate().matches(&r));
    }
}
