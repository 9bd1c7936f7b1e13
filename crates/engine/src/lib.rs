//! The bitemporal versioning engine.
//!
//! Four cooperating pieces, all working against the store contract from
//! `bitempo-store`:
//!
//! - [`options`] — ambient, thread-local as-of context with scoped frames.
//! - [`scope`] — time-scoped queries with the implicit current-row filter.
//! - [`writer`] — the create/update/destroy history state machine.
//! - [`uniqueness`] — overlap-scoped uniqueness validation.
//! - [`identity`] — the dual-identity record wrapper.

#![warn(missing_docs)]

pub mod identity;
pub mod options;
pub mod scope;
pub mod uniqueness;
pub mod writer;

pub use identity::Record;
pub use options::{
    current as current_options, force_update_scope, ignore_transaction_datetime,
    ignore_valid_datetime, transaction_at, valid_at, valid_at_force, with_options,
    BitemporalOptions, FrameGuard,
};
pub use scope::{AxisBound, TemporalScope};
pub use uniqueness::{effective_interval, Candidate};
pub use writer::{live_rows, DestroyHook, SaveOutcome, VersionWriter};
