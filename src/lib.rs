//! # Bitempo
//!
//! Bitemporal record versioning over a relational store: every logical
//! entity tracks both *valid time* (when a fact held in the real world) and
//! *transaction time* (when the database believed it), while ordinary
//! queries keep seeing a single current row per entity.
//!
//! ## Quick Start
//!
//! ```ignore
//! use bitempo::prelude::*;
//!
//! let db = Bitempo::in_memory()
//!     .table(TableSchema::new("employees").unique(["name"]))
//!     .open()?;
//! let employees = db.table("employees")?;
//!
//! // Create, update, and travel in time.
//! let mut alice = employees.create(payload_from_json(json!({"name": "Alice"}))?)?;
//! employees.update(&mut alice, payload_from_json(json!({"name": "Alicia"}))?)?;
//! let current = employees.find(alice.id())?;
//! let before = employees.find_at_time_opt(past_instant, alice.id())?;
//! ```
//!
//! ## Scoped as-of context
//!
//! Query and write operations consult an ambient, thread-local option stack:
//!
//! ```ignore
//! bitempo::valid_at(jan_1, || {
//!     employees.find(alice.id())   // resolves as of jan_1
//! });
//! ```
//!
//! ## Layers
//!
//! - `bitempo-core` — intervals, rows, predicates, schemas, errors.
//! - `bitempo-store` — the relational-store contract and the in-memory
//!   reference store.
//! - `bitempo-engine` — ambient options, temporal scopes, the version
//!   writer, uniqueness, identity.
//! - this crate — the database facade, per-table surface, and the debug
//!   visualizer.

#![warn(missing_docs)]

mod database;
mod error;
mod table;

pub mod prelude;
pub mod visualize;

// Re-export main entry points
pub use database::{Bitempo, BitempoBuilder};
pub use error::{Error, Result};
pub use table::{Query, VersionedTable};

// Re-export the ambient option surface at the crate root
pub use bitempo_engine::{
    current_options, force_update_scope, ignore_transaction_datetime, ignore_valid_datetime,
    transaction_at, valid_at, valid_at_force, with_options, BitemporalOptions,
};

// Re-export the working vocabulary
pub use bitempo_core::{
    payload_from_json, Instant, Interval, LogicalId, Payload, PhysicalId, TableSchema, TimeRange,
    Value, VersionedRow,
};
pub use bitempo_engine::{Record, SaveOutcome};
pub use bitempo_store::{MemoryStore, RelationalStore};
