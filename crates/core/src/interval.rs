//! Half-open time intervals.
//!
//! Every row carries one interval per axis, both of the form `[from, to)`:
//! the lower bound is included, the upper bound is not. A row is therefore
//! NOT valid at exactly its `valid_to` instant, and two intervals that touch
//! at a single boundary do not overlap.

use crate::error::{Error, Result};
use crate::time::{Instant, END_OF_TIME};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open interval `[from, to)` on one time axis.
///
/// The constructor enforces the invariant `from < to`; a zero-length or
/// inverted interval is a validation error, never a representable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    from: Instant,
    to: Instant,
}

impl Interval {
    /// Create an interval, rejecting `from >= to`.
    pub fn new(from: Instant, to: Instant) -> Result<Self> {
        if from >= to {
            return Err(Error::Validation(format!(
                "interval lower bound {} must precede upper bound {}",
                from, to
            )));
        }
        Ok(Interval { from, to })
    }

    /// Create an interval open to the right: `[from, END_OF_TIME)`.
    pub fn from_instant(from: Instant) -> Result<Self> {
        Interval::new(from, *END_OF_TIME)
    }

    /// Lower bound (inclusive).
    pub fn from(&self) -> Instant {
        self.from
    }

    /// Upper bound (exclusive).
    pub fn to(&self) -> Instant {
        self.to
    }

    /// Whether the interval is open to the right (upper bound is the sentinel).
    pub fn is_open_ended(&self) -> bool {
        self.to == *END_OF_TIME
    }

    /// Whether `t` lies inside the interval: `from <= t && t < to`.
    pub fn contains(&self, t: Instant) -> bool {
        self.from <= t && t < self.to
    }

    /// Half-open overlap test: `[a, b)` and `[c, d)` overlap iff
    /// `a < d && c < b`. Touching boundaries do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.from < other.to && other.from < self.to
    }

    /// The sub-interval before `at`, if non-empty: `[from, at)`.
    pub fn before(&self, at: Instant) -> Option<Interval> {
        (self.from < at).then(|| Interval {
            from: self.from,
            to: at.min(self.to),
        })
    }

    /// The sub-interval from `at` on, if non-empty: `[at, to)`.
    pub fn since(&self, at: Instant) -> Option<Interval> {
        (at < self.to).then(|| Interval {
            from: at.max(self.from),
            to: self.to,
        })
    }

    /// Replace the upper bound, keeping the invariant.
    pub fn with_to(&self, to: Instant) -> Result<Interval> {
        Interval::new(self.from, to)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_open_ended() {
            write!(f, "[{}, ...)", self.from)
        } else {
            write!(f, "[{}, {})", self.from, self.to)
        }
    }
}
