//! Sequential shot numbering for damage-dealing attack rows.

use std::collections::HashMap;

use tracing::warn;

use crate::ingest::columns::{
    resolve_column, ATTACKER_COLUMN_CANDIDATES, SHOT_INDEX_COLUMN, TARGET_COLUMN_CANDIDATES,
};
use crate::ingest::table::{Cell, Table};

fn is_attack(table: &Table, row: usize) -> bool {
    table
        .text(row, "event_type")
        .is_some_and(|kind| kind.trim().eq_ignore_ascii_case("attack"))
}

fn positive(value: Option<f64>) -> bool {
    value.is_some_and(|value| value > 0.0)
}

/// Whether a row counts as a shot: an attack that dealt normal-lane damage,
/// or, when that total is unavailable, one that hit shield or hull.
pub fn is_shot(table: &Table, row: usize) -> bool {
    if !is_attack(table, row) {
        return false;
    }
    let pool_hit = positive(table.number(row, "shield_damage"))
        || positive(table.number(row, "hull_damage"));
    if !table.has_column("total_normal") {
        return pool_hit;
    }
    match table.number(row, "total_normal") {
        Some(total) => total > 0.0,
        None => pool_hit,
    }
}

/// Add `shot_index`: a 1-based counter per (attacker, target) pair over
/// qualifying rows in row order. Rows with a missing name share one group
/// for that side. Without resolvable attacker and target columns the counter
/// is global. Non-qualifying rows get a missing value.
pub fn append_shot_index(table: &mut Table) {
    let attacker = resolve_column(table, ATTACKER_COLUMN_CANDIDATES);
    let target = resolve_column(table, TARGET_COLUMN_CANDIDATES);
    if !table.is_empty() && (attacker.is_none() || target.is_none()) {
        warn!(
            section = "combat",
            column = SHOT_INDEX_COLUMN,
            "attacker/target columns unresolved, numbering shots globally"
        );
    }

    let mut counters: HashMap<(Option<String>, Option<String>), u32> = HashMap::new();
    let mut global = 0u32;
    let values: Vec<Cell> = (0..table.len())
        .map(|row| {
            if !is_shot(table, row) {
                return Cell::Missing;
            }
            let index = match (attacker, target) {
                (Some(attacker), Some(target)) => {
                    let key = (
                        table.cell(row, attacker).label(),
                        table.cell(row, target).label(),
                    );
                    let counter = counters.entry(key).or_insert(0);
                    *counter += 1;
                    *counter
                }
                _ => {
                    global += 1;
                    global
                }
            };
            Cell::Number(f64::from(index))
        })
        .collect();

    table.set_column(SHOT_INDEX_COLUMN, values);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> Cell {
        Cell::Text(value.to_string())
    }

    fn row(kind: &str, attacker: &str, target: &str, total: Option<f64>, hull: f64) -> Vec<Cell> {
        vec![
            text(kind),
            text(attacker),
            text(target),
            Cell::from_option(total),
            Cell::Number(0.0),
            Cell::Number(hull),
        ]
    }

    fn columns() -> Vec<String> {
        ["event_type", "attacker_name", "target_name", "total_normal", "shield_damage", "hull_damage"]
            .map(String::from)
            .to_vec()
    }

    fn indices(table: &Table) -> Vec<Option<f64>> {
        (0..table.len())
            .map(|row| table.number(row, SHOT_INDEX_COLUMN))
            .collect()
    }

    #[test]
    fn counts_per_attacker_target_pair() {
        let mut table = Table::from_rows(
            columns(),
            vec![
                row("Attack", "Alice", "Cube", Some(10.0), 5.0),
                row("Attack", "Bob", "Cube", Some(10.0), 5.0),
                row("Officer", "Alice", "Cube", None, 0.0),
                row(" attack ", "Alice", "Cube", Some(3.0), 1.0),
                row("Attack", "Cube", "Alice", Some(8.0), 8.0),
                row("Attack", "Alice", "Cube", Some(0.0), 0.0),
            ],
        );
        append_shot_index(&mut table);

        assert_eq!(
            indices(&table),
            vec![Some(1.0), Some(1.0), None, Some(2.0), Some(1.0), None]
        );
    }

    #[test]
    fn missing_total_falls_back_to_pool_damage() {
        let mut table = Table::from_rows(
            columns(),
            vec![
                row("Attack", "Alice", "Cube", None, 40.0),
                row("Attack", "Alice", "Cube", None, 0.0),
            ],
        );
        append_shot_index(&mut table);
        assert_eq!(indices(&table), vec![Some(1.0), None]);
    }

    #[test]
    fn missing_names_form_their_own_group() {
        let mut table = Table::from_rows(
            columns(),
            vec![
                vec![text("Attack"), Cell::Missing, text("Cube"), Cell::Number(1.0)],
                row("Attack", "Alice", "Cube", Some(1.0), 1.0),
                vec![text("Attack"), Cell::Missing, text("Cube"), Cell::Number(1.0)],
            ],
        );
        append_shot_index(&mut table);
        assert_eq!(indices(&table), vec![Some(1.0), Some(1.0), Some(2.0)]);
    }

    #[test]
    fn unresolved_columns_use_global_sequence() {
        let mut table = Table::from_rows(
            vec!["event_type".into(), "total_normal".into()],
            vec![
                vec![text("Attack"), Cell::Number(5.0)],
                vec![text("Officer"), Cell::Number(5.0)],
                vec![text("Attack"), Cell::Number(7.0)],
            ],
        );
        append_shot_index(&mut table);
        assert_eq!(indices(&table), vec![Some(1.0), None, Some(2.0)]);
    }

    #[test]
    fn absent_total_column_uses_pool_damage_only() {
        let mut table = Table::from_rows(
            vec!["event_type".into(), "target_name".into(), "Attacker".into(), "shield_damage".into()],
            vec![
                vec![text("Attack"), text("Cube"), text("Alice"), Cell::Number(5.0)],
                vec![text("Attack"), text("Cube"), text("Alice"), Cell::Number(0.0)],
                vec![text("Attack"), text("Cube"), text("Alice"), Cell::Number(2.0)],
            ],
        );
        append_shot_index(&mut table);
        assert_eq!(indices(&table), vec![Some(1.0), None, Some(2.0)]);
    }

    #[test]
    fn indices_strictly_increase_per_pair() {
        let rows = (0..20)
            .map(|i| {
                let attacker = if i % 3 == 0 { "Alice" } else { "Bob" };
                row("Attack", attacker, "Cube", Some(f64::from(i % 4)), 1.0)
            })
            .collect();
        let mut table = Table::from_rows(columns(), rows);
        append_shot_index(&mut table);

        for name in ["Alice", "Bob"] {
            let seen: Vec<f64> = (0..table.len())
                .filter(|&r| table.text(r, "attacker_name") == Some(name))
                .filter_map(|r| table.number(r, SHOT_INDEX_COLUMN))
                .collect();
            assert_eq!(seen.first(), Some(&1.0));
            assert!(seen.windows(2).all(|w| w[1] == w[0] + 1.0), "{name}: {seen:?}");
        }
    }

    #[test]
    fn empty_table_still_gets_the_column() {
        let mut table = Table::new(["event_type"]);
        append_shot_index(&mut table);
        assert!(table.has_column(SHOT_INDEX_COLUMN));
        assert!(table.is_empty());
    }
}
