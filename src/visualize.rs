//! Debug rendering of an entity's bitemporal history.
//!
//! Produces a text grid with one line per stored row (ordered by
//! transaction start, then physical id) and one column per span between
//! consecutive valid-time boundaries. Not used by production logic.

use bitempo_core::row::VersionedRow;
use bitempo_core::time::{is_end_of_time, Instant};

const CELL_WIDTH: usize = 4;

fn label(t: Instant) -> String {
    if is_end_of_time(t) {
        "<eot>".to_string()
    } else {
        t.format("%Y-%m-%d %H:%M").to_string()
    }
}

/// Render rows of one logical entity as a transaction-time by valid-time
/// occupancy grid.
pub fn render(rows: &[VersionedRow]) -> String {
    if rows.is_empty() {
        return "(no rows)\n".to_string();
    }

    let mut boundaries: Vec<Instant> = rows
        .iter()
        .flat_map(|row| [row.valid.from(), row.valid.to()])
        .collect();
    boundaries.sort();
    boundaries.dedup();

    let mut out = String::new();
    out.push_str("valid boundaries:\n");
    for (i, bound) in boundaries.iter().enumerate() {
        out.push_str(&format!("  [{i}] {}\n", label(*bound)));
    }
    out.push('\n');

    let mut ordered: Vec<&VersionedRow> = rows.iter().collect();
    ordered.sort_by_key(|row| (row.transaction.from(), row.physical_id));

    let tx_width = ordered
        .iter()
        .map(|row| label(row.transaction.from()).len())
        .max()
        .unwrap_or(0)
        .max("transaction_from".len());
    let status_width = ordered
        .iter()
        .map(|row| transaction_status(row).len())
        .max()
        .unwrap_or(0)
        .max("status".len());

    let cell_width = CELL_WIDTH;
    out.push_str(&format!(
        "{:<tx_width$}  {:<status_width$}  ",
        "transaction_from", "status"
    ));
    for i in 0..boundaries.len().saturating_sub(1) {
        out.push_str(&format!("|{i:^cell_width$}"));
    }
    out.push_str("|\n");

    for row in ordered {
        out.push_str(&format!(
            "{:<tx_width$}  {:<status_width$}  ",
            label(row.transaction.from()),
            transaction_status(row)
        ));
        for window in boundaries.windows(2) {
            let covered = row.valid.from() <= window[0] && window[1] <= row.valid.to();
            let cell = if covered { "#".repeat(CELL_WIDTH) } else { " ".repeat(CELL_WIDTH) };
            out.push('|');
            out.push_str(&cell);
        }
        out.push_str(&format!("|  #{}", row.physical_id));
        if row.force_updated {
            out.push_str("  (forced)");
        }
        out.push('\n');
    }
    out
}

fn transaction_status(row: &VersionedRow) -> String {
    match row.deleted_at() {
        None => "open".to_string(),
        Some(at) => format!("closed {}", label(at)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitempo_core::interval::Interval;
    use bitempo_core::row::{LogicalId, PhysicalId};
    use bitempo_core::time::END_OF_TIME;
    use bitempo_core::value::Payload;
    use chrono::{TimeZone, Utc};

    fn at(month: u32, day: u32) -> Instant {
        Utc.with_ymd_and_hms(2020, month, day, 0, 0, 0).unwrap()
    }

    fn row(physical: u64, valid: Interval, transaction: Interval) -> VersionedRow {
        VersionedRow {
            physical_id: PhysicalId::new(physical),
            logical_id: LogicalId::new(1),
            valid,
            transaction,
            force_updated: false,
            payload: Payload::new(),
        }
    }

    #[test]
    fn empty_history_renders_a_placeholder() {
        assert_eq!(render(&[]), "(no rows)\n");
    }

    #[test]
    fn grid_marks_covered_spans() {
        let rows = vec![
            row(
                1,
                Interval::new(at(1, 1), at(3, 1)).unwrap(),
                Interval::from_instant(at(1, 1)).unwrap(),
            ),
            row(
                2,
                Interval::new(at(3, 1), *END_OF_TIME).unwrap(),
                Interval::from_instant(at(3, 1)).unwrap(),
            ),
        ];
        let grid = render(&rows);
        assert!(grid.contains("valid boundaries:"), "legend present:\n{grid}");
        assert!(grid.contains("<eot>"), "open bound labeled:\n{grid}");
        let lines: Vec<&str> = grid.lines().collect();
        let first = lines.iter().find(|l| l.contains("#1")).unwrap();
        let second = lines.iter().find(|l| l.contains("#2")).unwrap();
        assert!(first.contains("|####|    |"), "row 1 covers the first span:\n{grid}");
        assert!(second.contains("|    |####|"), "row 2 covers the second span:\n{grid}");
    }

    #[test]
    fn closed_rows_show_their_close_instant() {
        let rows = vec![row(
            1,
            Interval::new(at(1, 1), at(3, 1)).unwrap(),
            Interval::new(at(1, 1), at(2, 1)).unwrap(),
        )];
        let grid = render(&rows);
        assert!(grid.contains("closed 2020-02-01"), "{grid}");
    }

    #[test]
    fn forced_rows_are_flagged() {
        let mut r = row(
            1,
            Interval::new(at(1, 1), at(3, 1)).unwrap(),
            Interval::from_instant(at(1, 1)).unwrap(),
        );
        r.force_updated = true;
        assert!(render(&[r]).contains("(forced)"));
    }
}
