//! Destroy-path contracts: hook ordering, rollback atomicity, and the
//! force variant.

use anyhow::Result;
use bitempo::prelude::*;
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn at(month: u32, day: u32) -> Instant {
    Utc.with_ymd_and_hms(2020, month, day, 0, 0, 0).unwrap()
}

fn name_is(name: &str) -> Payload {
    payload_from_json(json!({ "name": name })).unwrap()
}

#[test]
fn hooks_observe_the_row_being_destroyed() -> Result<()> {
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_in_hook = Arc::clone(&seen);
    let db = Bitempo::in_memory()
        .table(TableSchema::new("employees"))
        .destroy_hook("employees", move |row| {
            assert_eq!(
                row.payload.get("name").and_then(|v| v.as_str()),
                Some("A"),
                "hook sees the current row's payload"
            );
            seen_in_hook.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .open()?;
    let employees = db.table("employees")?;

    let e = bitempo::valid_at(at(1, 1), || employees.create(name_is("A")))?;
    bitempo::valid_at(at(3, 1), || employees.destroy(&e))?;
    assert_eq!(seen.load(Ordering::SeqCst), 1, "hook ran exactly once");
    Ok(())
}

#[test]
fn failing_hook_rolls_back_the_whole_destroy() -> Result<()> {
    let db = Bitempo::in_memory()
        .table(TableSchema::new("employees"))
        .destroy_hook("employees", |_| {
            Err(bitempo_core::Error::Validation(
                "veto from the hook".to_string(),
            ))
        })
        .open()?;
    let employees = db.table("employees")?;

    let e = bitempo::valid_at(at(1, 1), || employees.create(name_is("A")))?;
    let err = bitempo::valid_at(at(3, 1), || employees.destroy(&e)).unwrap_err();
    assert!(err.is_validation());

    // No partial state: the entity is still current and the pre-inserted
    // history row did not survive the rollback.
    assert!(employees.find(e.id()).is_ok(), "entity still current");
    let all = employees
        .ignore_valid_datetime()
        .ignore_transaction_datetime()
        .bitemporal_for(e.id())
        .count()?;
    assert_eq!(all, 1, "only the original row exists after rollback");
    Ok(())
}

#[test]
fn destroy_records_the_trimmed_state_as_live_history() -> Result<()> {
    let db = Bitempo::in_memory()
        .table(TableSchema::new("employees"))
        .open()?;
    let employees = db.table("employees")?;

    let e = bitempo::valid_at(at(1, 1), || employees.create(name_is("A")))?;
    bitempo::valid_at(at(3, 1), || employees.destroy(&e))?;

    let live = employees.histories_for(e.id()).rows()?;
    assert_eq!(live.len(), 1, "one trimmed history row remains live");
    assert_eq!(live[0].valid.from(), at(1, 1));
    assert_eq!(live[0].valid.to(), at(3, 1), "trimmed to the destroy instant");

    let closed = employees
        .within_deleted()
        .ignore_valid_datetime()
        .bitemporal_for(e.id())
        .rows()?;
    assert_eq!(closed.len(), 2, "original row retained with closed transaction");
    Ok(())
}

#[test]
fn force_destroy_closes_without_recording_history() -> Result<()> {
    let db = Bitempo::in_memory()
        .table(TableSchema::new("employees"))
        .open()?;
    let employees = db.table("employees")?;

    let e = bitempo::valid_at(at(1, 1), || employees.create(name_is("A")))?;
    employees.destroy_force(&e)?;

    assert!(employees.find(e.id()).unwrap_err().is_not_found());
    let live = employees.histories_for(e.id()).count()?;
    assert_eq!(live, 0, "no trimmed copy was written");

    // The closed row itself is still inspectable under the deleted scope.
    let closed = employees
        .within_deleted()
        .ignore_valid_datetime()
        .bitemporal_for(e.id())
        .rows()?;
    assert_eq!(closed.len(), 1);
    assert!(closed[0].deleted_at().is_some());
    Ok(())
}

#[test]
fn force_destroying_a_closed_row_reports_not_found() -> Result<()> {
    let db = Bitempo::in_memory()
        .table(TableSchema::new("employees"))
        .open()?;
    let employees = db.table("employees")?;

    let e = bitempo::valid_at(at(1, 1), || employees.create(name_is("A")))?;
    employees.destroy_force(&e)?;
    let err = employees.destroy_force(&e).unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}
