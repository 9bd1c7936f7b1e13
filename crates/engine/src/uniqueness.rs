//! Overlap-scoped uniqueness checks.
//!
//! An attribute value is only "taken" by rows that could coexist with the
//! candidate: rows whose valid-time interval overlaps the candidate's
//! effective valid-time and whose transaction-time is still open. Fully
//! superseded history and force-rewritten-away rows never count.

use bitempo_core::interval::Interval;
use bitempo_core::predicate::{axis_overlaps, transaction_open, Axis, Predicate};
use bitempo_core::row::PhysicalId;
use bitempo_core::schema::TableSchema;
use bitempo_core::time::{is_unset, Instant, END_OF_TIME};
use bitempo_core::value::{Payload, Value};
use bitempo_core::{Result, ValidationFailure};
use bitempo_store::RowSource;

/// A row about to be written, as the guard sees it.
#[derive(Debug)]
pub struct Candidate<'a> {
    /// Physical row to exclude from the comparison set: the row the
    /// candidate itself fronts (re-validation must not collide with self).
    pub exclude_physical: Option<PhysicalId>,
    /// The valid-time window the candidate will occupy.
    pub effective: Interval,
    /// The payload the candidate will carry.
    pub payload: &'a Payload,
}

/// The valid-time window a record under validation will occupy.
///
/// A new record (unset `valid_from` sentinel) occupies from the as-of
/// instant; an update whose as-of instant falls outside the record's own
/// interval occupies the gap up to the nearest future row (end-of-time when
/// none exists), matching the writer's gap-filling rule.
pub fn effective_interval(
    valid_from: Instant,
    valid_to: Instant,
    as_of: Instant,
    nearest_future_from: Option<Instant>,
) -> Result<Interval> {
    if is_unset(valid_from) {
        return Interval::new(as_of, valid_to);
    }
    let own = Interval::new(valid_from, valid_to)?;
    if own.contains(as_of) {
        Interval::new(as_of, valid_to)
    } else {
        Interval::new(as_of, nearest_future_from.unwrap_or(*END_OF_TIME))
    }
}

/// Check every uniqueness constraint of `schema` against `candidate`.
///
/// Returns one failure per violated constraint; an empty list means the
/// candidate is clean. Constraints where the candidate carries only `Null`
/// values are skipped, matching relational unique-index behavior.
pub fn check<Src: RowSource + ?Sized>(
    src: &Src,
    schema: &TableSchema,
    candidate: &Candidate<'_>,
) -> Result<Vec<ValidationFailure>> {
    let mut failures = Vec::new();
    for constraint in schema.uniqueness_constraints() {
        let values: Vec<(&str, Value)> = constraint
            .columns
            .iter()
            .map(|column| {
                (
                    column.as_str(),
                    candidate
                        .payload
                        .get(column)
                        .cloned()
                        .unwrap_or(Value::Null),
                )
            })
            .collect();
        if values.iter().all(|(_, v)| v.is_null()) {
            continue;
        }

        let mut predicate = transaction_open().and(axis_overlaps(
            Axis::Valid,
            candidate.effective.from(),
            candidate.effective.to(),
        ));
        for (column, value) in &values {
            predicate = predicate.and(Predicate::payload_eq(*column, value.clone()));
        }

        let mut conflicting = src.execute_query(schema.name(), &predicate, &[], None)?;
        if let Some(exclude) = candidate.exclude_physical {
            conflicting.retain(|row| row.physical_id != exclude);
        }
        if !conflicting.is_empty() {
            failures.push(ValidationFailure::new(
                constraint.columns.clone(),
                format!(
                    "value already taken by {} row(s) with overlapping valid time {}",
                    conflicting.len(),
                    candidate.effective
                ),
            ));
        }
    }
    Ok(failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitempo_core::time::UNSET_VALID_FROM;
    use chrono::{TimeZone, Utc};

    fn at(month: u32, day: u32) -> Instant {
        Utc.with_ymd_and_hms(2020, month, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn new_record_occupies_from_the_as_of_instant() {
        let iv = effective_interval(*UNSET_VALID_FROM, *END_OF_TIME, at(3, 1), None).unwrap();
        assert_eq!(iv.from(), at(3, 1));
        assert!(iv.is_open_ended());
    }

    #[test]
    fn update_inside_own_interval_occupies_its_tail() {
        let iv = effective_interval(at(1, 1), at(6, 1), at(3, 1), Some(at(9, 1))).unwrap();
        assert_eq!(iv.from(), at(3, 1));
        assert_eq!(iv.to(), at(6, 1), "own upper bound wins inside the interval");
    }

    #[test]
    fn update_outside_own_interval_occupies_the_gap() {
        // As-of before the record starts: the gap runs to the nearest
        // future row.
        let iv = effective_interval(at(5, 1), at(6, 1), at(2, 1), Some(at(5, 1))).unwrap();
        assert_eq!(iv.from(), at(2, 1));
        assert_eq!(iv.to(), at(5, 1));
        // No future row at all: open-ended.
        let iv = effective_interval(at(5, 1), at(6, 1), at(7, 1), None).unwrap();
        assert_eq!(iv.from(), at(7, 1));
        assert!(iv.is_open_ended());
    }
}
