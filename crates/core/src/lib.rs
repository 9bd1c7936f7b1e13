//! Core types for the bitemporal versioning engine.
//!
//! This crate holds the leaf vocabulary shared by the store contract and the
//! engine: instants and sentinel bounds, half-open intervals, the physical
//! row model, payload values, the predicate expression tree, per-table
//! schema configuration, and the error taxonomy.

#![warn(missing_docs)]

pub mod error;
pub mod interval;
pub mod predicate;
pub mod row;
pub mod schema;
pub mod time;
pub mod value;

pub use error::{Error, Result, ValidationFailure};
pub use interval::Interval;
pub use predicate::{Axis, Column, CmpOp, Predicate, Scalar, TimeRange};
pub use row::{ColumnPatch, LogicalId, NewRow, PhysicalId, VersionedRow};
pub use schema::{TableSchema, TransactionTimeMode, UniquenessConstraint};
pub use time::{now, Instant, END_OF_TIME, UNSET_VALID_FROM};
pub use value::{merge_payload, payload_from_json, Payload, Value};
