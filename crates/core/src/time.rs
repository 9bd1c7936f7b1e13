//! Time instants and the sentinel bounds used by both time axes.
//!
//! Interval comparisons in this engine are total: open-ended rows carry the
//! far-future [`END_OF_TIME`] sentinel in their `*_to` column instead of a
//! NULL, and a record that has never been persisted carries the far-past
//! [`UNSET_VALID_FROM`] sentinel until the writer resolves it to the as-of
//! instant in effect.

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;

/// A point on either time axis. UTC, microsecond-or-better precision.
pub type Instant = DateTime<Utc>;

/// Far-future sentinel standing in for an open upper bound (`9999-12-31`).
pub static END_OF_TIME: Lazy<Instant> = Lazy::new(|| {
    Utc.with_ymd_and_hms(9999, 12, 31, 0, 0, 0)
        .single()
        .expect("end-of-time sentinel is a valid instant")
});

/// Far-past sentinel marking a `valid_from` that has not been resolved yet
/// (`0001-01-01`). Persisting a record replaces it with the as-of instant.
pub static UNSET_VALID_FROM: Lazy<Instant> = Lazy::new(|| {
    Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0)
        .single()
        .expect("unset-valid-from sentinel is a valid instant")
});

/// The current instant.
pub fn now() -> Instant {
    Utc::now()
}

/// Whether `t` is the open-upper-bound sentinel.
pub fn is_end_of_time(t: Instant) -> bool {
    t == *END_OF_TIME
}

/// Whether `t` is the unresolved `valid_from` placeholder.
pub fn is_unset(t: Instant) -> bool {
    t == *UNSET_VALID_FROM
}
