//! Dual identity of a hydrated record.
//!
//! Callers address an entity by its stable logical id while writes always
//! target one specific physical row. Instead of mutating an `id` field in
//! place, a [`Record`] keeps both identities as explicit fields: the
//! externally-visible id is the logical id, and the physical row id stays
//! reachable as the "swapped id".

use bitempo_core::interval::Interval;
use bitempo_core::row::{LogicalId, PhysicalId, VersionedRow};
use bitempo_core::time::Instant;
use bitempo_core::value::Payload;

/// A hydrated versioned row with swap-on-load identity semantics.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    row: VersionedRow,
    previous_physical: Option<PhysicalId>,
}

impl Record {
    /// Hydrate a stored row. This is the "swap on load": from here on the
    /// record's [`id`](Record::id) is the logical id and the physical row id
    /// is available via [`swapped_id`](Record::swapped_id).
    pub fn from_row(row: VersionedRow) -> Self {
        Record {
            row,
            previous_physical: None,
        }
    }

    /// The externally-visible identity: the stable logical id.
    pub fn id(&self) -> LogicalId {
        self.row.logical_id
    }

    /// The physical id of the row this record currently fronts.
    pub fn swapped_id(&self) -> PhysicalId {
        self.row.physical_id
    }

    /// The physical id this record fronted before its last update, if an
    /// update happened since hydration or the last reload.
    pub fn swapped_id_previously_was(&self) -> Option<PhysicalId> {
        self.previous_physical
    }

    /// The underlying stored row.
    pub fn row(&self) -> &VersionedRow {
        &self.row
    }

    /// Entity payload of the fronted row.
    pub fn payload(&self) -> &Payload {
        &self.row.payload
    }

    /// Valid-time interval of the fronted row.
    pub fn valid(&self) -> Interval {
        self.row.valid
    }

    /// Transaction-time interval of the fronted row.
    pub fn transaction(&self) -> Interval {
        self.row.transaction
    }

    /// Soft-delete view of the fronted row's transaction close.
    pub fn deleted_at(&self) -> Option<Instant> {
        self.row.deleted_at()
    }

    /// Whether the fronted row was written by a force update.
    pub fn previously_force_updated(&self) -> bool {
        self.row.force_updated
    }

    /// Point the record at the row a write just produced, remembering the
    /// previous physical id for change tracking.
    pub(crate) fn apply_write(&mut self, new_row: VersionedRow) {
        self.previous_physical = Some(self.row.physical_id);
        self.row = new_row;
    }

    /// Replace state from a fresh load, clearing previous-swap memory.
    pub fn reload_from(&mut self, row: VersionedRow) {
        self.previous_physical = None;
        self.row = row;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitempo_core::value::Value;
    use chrono::{TimeZone, Utc};

    fn row(physical: u64, logical: u64) -> VersionedRow {
        let jan = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        VersionedRow {
            physical_id: PhysicalId::new(physical),
            logical_id: LogicalId::new(logical),
            valid: Interval::from_instant(jan).unwrap(),
            transaction: Interval::from_instant(jan).unwrap(),
            force_updated: false,
            payload: Payload::from([("name".to_string(), Value::from("A"))]),
        }
    }

    #[test]
    fn swap_on_load_exposes_logical_id() {
        let record = Record::from_row(row(5, 1));
        assert_eq!(record.id(), LogicalId::new(1));
        assert_eq!(record.swapped_id(), PhysicalId::new(5));
        assert_eq!(record.swapped_id_previously_was(), None);
    }

    #[test]
    fn apply_write_tracks_the_previous_physical_id() {
        let mut record = Record::from_row(row(5, 1));
        record.apply_write(row(9, 1));
        assert_eq!(record.id(), LogicalId::new(1), "logical id is stable");
        assert_eq!(record.swapped_id(), PhysicalId::new(9));
        assert_eq!(record.swapped_id_previously_was(), Some(PhysicalId::new(5)));
    }

    #[test]
    fn reload_clears_previous_swap_memory() {
        let mut record = Record::from_row(row(5, 1));
        record.apply_write(row(9, 1));
        record.reload_from(row(9, 1));
        assert_eq!(record.swapped_id_previously_was(), None);
    }
}
