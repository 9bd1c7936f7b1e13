//! Window filters and history navigation: `valid_in`, `valid_allin`,
//! `most_past` / `most_future`, and the deleted-row scopes.

use anyhow::Result;
use bitempo::prelude::*;
use chrono::{TimeZone, Utc};

fn at(month: u32, day: u32) -> Instant {
    Utc.with_ymd_and_hms(2020, month, day, 0, 0, 0).unwrap()
}

fn db() -> Bitempo {
    Bitempo::in_memory()
        .table(TableSchema::new("employees"))
        .open()
        .unwrap()
}

fn name_is(name: &str) -> Payload {
    payload_from_json(json!({ "name": name })).unwrap()
}

fn names(rows: &[VersionedRow]) -> Vec<String> {
    rows.iter()
        .map(|r| r.payload.get("name").unwrap().as_str().unwrap().to_string())
        .collect()
}

/// A[Jan,Mar) B[Mar,May) C[May,open), one entity.
fn seeded(db: &Bitempo) -> Result<Record> {
    let employees = db.table("employees")?;
    let mut e = bitempo::valid_at(at(1, 1), || employees.create(name_is("A")))?;
    bitempo::valid_at(at(3, 1), || employees.update(&mut e, name_is("B")))?;
    bitempo::valid_at(at(5, 1), || employees.update(&mut e, name_is("C")))?;
    Ok(e)
}

// ============================================================================
// valid_in (window overlap)
// ============================================================================

mod valid_in {
    use super::*;

    #[test]
    fn returns_rows_intersecting_the_window() -> Result<()> {
        let db = db();
        let e = seeded(&db)?;
        let employees = db.table("employees")?;

        let rows = employees
            .valid_in(at(1, 15)..at(2, 15))
            .bitemporal_for(e.id())
            .rows()?;
        assert_eq!(names(&rows), vec!["A"]);

        let rows = employees
            .valid_in(at(2, 1)..at(6, 1))
            .bitemporal_for(e.id())
            .rows()?;
        assert_eq!(names(&rows), vec!["A", "B", "C"]);
        Ok(())
    }

    #[test]
    fn exclusive_end_excludes_rows_starting_at_the_boundary() -> Result<()> {
        let db = db();
        let e = seeded(&db)?;
        let employees = db.table("employees")?;

        // B starts exactly at Mar 1.
        let exclusive = employees
            .valid_in(at(2, 1)..at(3, 1))
            .bitemporal_for(e.id())
            .rows()?;
        assert_eq!(names(&exclusive), vec!["A"], "exclusive end misses B");

        let inclusive = employees
            .valid_in(at(2, 1)..=at(3, 1))
            .bitemporal_for(e.id())
            .rows()?;
        assert_eq!(names(&inclusive), vec!["A", "B"], "inclusive end reaches B");
        Ok(())
    }
}

// ============================================================================
// valid_allin (window containment)
// ============================================================================

mod valid_allin {
    use super::*;

    #[test]
    fn returns_only_rows_fully_inside_the_window() -> Result<()> {
        let db = db();
        let e = seeded(&db)?;
        let employees = db.table("employees")?;

        let rows = employees
            .valid_allin(at(1, 1)..=at(5, 1))?
            .bitemporal_for(e.id())
            .rows()?;
        assert_eq!(names(&rows), vec!["A", "B"], "open-ended C is not contained");
        Ok(())
    }

    #[test]
    fn rejects_exclusive_end_ranges() -> Result<()> {
        let db = db();
        let _ = seeded(&db)?;
        let employees = db.table("employees")?;

        let err = employees.valid_allin(at(1, 1)..at(5, 1)).unwrap_err();
        assert!(err.is_validation(), "exclusive-end input is ambiguous: {err}");
        Ok(())
    }
}

// ============================================================================
// History navigation
// ============================================================================

mod navigation {
    use super::*;

    #[test]
    fn most_past_and_most_future_pick_the_edges() -> Result<()> {
        let db = db();
        let e = seeded(&db)?;
        let employees = db.table("employees")?;

        let past = employees.most_past(e.id())?.unwrap();
        assert_eq!(past.payload().get("name").unwrap().as_str(), Some("A"));
        let future = employees.most_future(e.id())?.unwrap();
        assert_eq!(future.payload().get("name").unwrap().as_str(), Some("C"));
        Ok(())
    }

    #[test]
    fn edges_of_an_unknown_entity_are_empty() -> Result<()> {
        let db = db();
        let employees = db.table("employees")?;
        assert!(employees.most_past(LogicalId::new(999))?.is_none());
        assert!(employees.most_future(LogicalId::new(999))?.is_none());
        Ok(())
    }

    #[test]
    fn find_many_is_strict_over_every_id() -> Result<()> {
        let db = db();
        let employees = db.table("employees")?;
        let a = bitempo::valid_at(at(1, 1), || employees.create(name_is("A")))?;
        let b = bitempo::valid_at(at(1, 1), || employees.create(name_is("B")))?;

        let found = employees.find_many(&[b.id(), a.id()])?;
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id(), b.id(), "results come back in input order");

        bitempo::valid_at(at(3, 1), || employees.destroy(&b))?;
        let err = employees.find_many(&[a.id(), b.id()]).unwrap_err();
        assert!(err.is_not_found(), "one missing id fails the whole lookup");
        Ok(())
    }
}

// ============================================================================
// Deleted-row scopes
// ============================================================================

mod deleted_scopes {
    use super::*;

    #[test]
    fn within_deleted_surfaces_superseded_rows() -> Result<()> {
        let db = db();
        let e = seeded(&db)?;
        let employees = db.table("employees")?;

        // Two updates closed two superseded rows.
        let current_only = employees
            .ignore_valid_datetime()
            .bitemporal_for(e.id())
            .count()?;
        let with_deleted = employees
            .within_deleted()
            .ignore_valid_datetime()
            .bitemporal_for(e.id())
            .count()?;
        assert_eq!(current_only, 3);
        assert_eq!(with_deleted, 5, "superseded originals included");
        Ok(())
    }

    #[test]
    fn without_deleted_matches_a_plain_current_read() -> Result<()> {
        let db = db();
        let e = seeded(&db)?;
        let employees = db.table("employees")?;

        let plain = employees.find(e.id())?;
        let scoped = employees.without_deleted().find(e.id())?;
        assert_eq!(plain.swapped_id(), scoped.swapped_id());
        Ok(())
    }
}
