//! Convenient imports for Bitempo.
//!
//! ```ignore
//! use bitempo::prelude::*;
//!
//! let db = Bitempo::in_memory()
//!     .table(TableSchema::new("employees"))
//!     .open()?;
//! ```

// Main entry point
pub use crate::database::{Bitempo, BitempoBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Per-entity surface
pub use crate::table::{Query, VersionedTable};

// Core vocabulary
pub use bitempo_core::{
    payload_from_json, Instant, Interval, LogicalId, Payload, PhysicalId, TableSchema, TimeRange,
    Value, VersionedRow, END_OF_TIME,
};

// Ambient option scoping
pub use bitempo_engine::{
    force_update_scope, ignore_transaction_datetime, ignore_valid_datetime, transaction_at,
    valid_at, valid_at_force, with_options, BitemporalOptions,
};

// Records and save outcomes
pub use bitempo_engine::{Record, SaveOutcome};

// Reference store
pub use bitempo_store::MemoryStore;

// Re-export serde_json for convenience
pub use serde_json::json;
