//! The debug visualizer, driven end to end through the table surface.

use anyhow::Result;
use bitempo::prelude::*;
use chrono::{TimeZone, Utc};

fn at(month: u32, day: u32) -> Instant {
    Utc.with_ymd_and_hms(2020, month, day, 0, 0, 0).unwrap()
}

fn name_is(name: &str) -> Payload {
    payload_from_json(json!({ "name": name })).unwrap()
}

#[test]
fn grid_covers_every_row_ever_written() -> Result<()> {
    let db = Bitempo::in_memory()
        .table(TableSchema::new("employees"))
        .open()?;
    let employees = db.table("employees")?;

    let mut e = bitempo::valid_at(at(1, 1), || employees.create(name_is("A")))?;
    bitempo::valid_at(at(3, 1), || employees.update(&mut e, name_is("B")))?;

    let grid = employees.visualize(e.id())?;
    assert!(grid.contains("valid boundaries:"), "{grid}");
    assert!(grid.contains("2020-01-01 00:00"), "boundary legend:\n{grid}");
    assert!(grid.contains("2020-03-01 00:00"), "split boundary listed:\n{grid}");
    assert!(grid.contains("<eot>"), "open bound labeled:\n{grid}");

    // One line per row ever written: original + before copy + after row.
    let body_lines = grid
        .lines()
        .filter(|line| line.contains('|') && line.contains('#'))
        .count();
    assert_eq!(body_lines, 3, "three occupancy lines:\n{grid}");

    // The superseded original is marked closed.
    assert!(grid.contains("closed"), "closed transaction shown:\n{grid}");
    assert!(grid.contains("open"), "live rows shown as open:\n{grid}");
    Ok(())
}

#[test]
fn unknown_entity_renders_the_placeholder() -> Result<()> {
    let db = Bitempo::in_memory()
        .table(TableSchema::new("employees"))
        .open()?;
    let employees = db.table("employees")?;
    assert_eq!(employees.visualize(LogicalId::new(42))?, "(no rows)\n");
    Ok(())
}
