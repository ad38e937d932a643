//! Canonical combat column names and the lookups that resolve them.

use tracing::{debug, warn};

use crate::ingest::table::{Cell, Table};

/// Export header → canonical combat column.
pub const COMBAT_COLUMN_RENAMES: &[(&str, &str)] = &[
    ("Critical Hit?", "is_crit"),
    ("Hull Damage", "hull_damage"),
    ("Shield Damage", "shield_damage"),
    ("Mitigated Damage", "mitigated_normal"),
    ("Mitigated Isolytic Damage", "mitigated_iso"),
    ("Mitigated Apex Barrier", "mitigated_apex"),
    ("Total Damage", "total_normal"),
    ("Total Isolytic Damage", "total_iso"),
    ("Round", "round"),
    ("Battle Event", "battle_event"),
    ("Type", "event_type"),
    ("Attacker Name", "attacker_name"),
    ("Attacker Alliance", "attacker_alliance"),
    ("Attacker Ship", "attacker_ship"),
    ("Attacker - Is Armada?", "attacker_is_armada"),
    ("Target Name", "target_name"),
    ("Target Alliance", "target_alliance"),
    ("Target Ship", "target_ship"),
    ("Target - Is Armada?", "target_is_armada"),
    ("Ability Type", "ability_type"),
    ("Ability Value", "ability_value"),
    ("Ability Name", "ability_name"),
    ("Ability Owner Name", "ability_owner_name"),
    ("Target Defeated", "target_defeated"),
    ("Target Destroyed", "target_destroyed"),
];

/// Numeric combat columns under their export names.
pub const RAW_NUMERIC_COLUMNS: &[&str] = &[
    "Round",
    "Total Damage",
    "Mitigated Damage",
    "Mitigated Isolytic Damage",
    "Mitigated Apex Barrier",
    "Total Isolytic Damage",
    "Ability Value",
    "Shield Damage",
    "Hull Damage",
];

/// Numeric combat columns under their canonical names.
pub const NUMERIC_COLUMNS: &[&str] = &[
    "round",
    "total_normal",
    "mitigated_normal",
    "mitigated_iso",
    "mitigated_apex",
    "total_iso",
    "ability_value",
    "shield_damage",
    "hull_damage",
];

pub const BOOLEAN_COLUMNS: &[&str] = &["is_crit", "attacker_is_armada", "target_is_armada"];

/// Output order of the normalized combat table. Columns not listed here
/// follow in their source order.
pub const COMBAT_COLUMN_ORDER: &[&str] = &[
    "round",
    "battle_event",
    "event_type",
    "is_crit",
    "attacker_name",
    "attacker_ship",
    "attacker_alliance",
    "attacker_is_armada",
    "target_name",
    "target_ship",
    "target_alliance",
    "target_is_armada",
    "applied_damage",
    "damage_after_apex",
    "shield_damage",
    "hull_damage",
    "mitigated_apex",
    "damage_before_apex",
    "apex_r",
    "apex_barrier_hit",
    "total_iso",
    "mitigated_iso",
    "iso_remain",
    "total_normal",
    "mitigated_normal",
    "normal_remain",
    "remain_before_apex",
    "accounting_delta",
    "ability_type",
    "ability_value",
    "ability_name",
    "ability_owner_name",
    "target_defeated",
    "target_destroyed",
];

pub const SHOT_INDEX_COLUMN: &str = "shot_index";

pub const ATTACKER_COLUMN_CANDIDATES: &[&str] = &["attacker_name", "Attacker"];
pub const TARGET_COLUMN_CANDIDATES: &[&str] = &["target_name", "Target", "Defender Name"];

/// First candidate column present in `table`, in priority order.
pub fn resolve_column<'a>(table: &Table, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .copied()
        .find(|candidate| table.has_column(candidate))
}

/// Merge `ability_type` into `event_type`: a non-missing ability type wins.
/// Adds `event_type` if only `ability_type` exists; no-op if neither does.
pub fn resolve_event_type(table: &mut Table) {
    let Some(ability) = table.column("ability_type") else {
        return;
    };
    let resolved: Vec<Cell> = ability
        .into_iter()
        .enumerate()
        .map(|(row, ability)| {
            if ability.is_missing() {
                table.cell(row, "event_type").clone()
            } else {
                ability.clone()
            }
        })
        .collect();
    table.set_column("event_type", resolved);
}

/// Add each absent column in `columns` with every value missing, so callers
/// can rely on the schema regardless of which fields the export carried.
pub fn fill_missing_columns(table: &mut Table, section: &str, columns: &[&str]) {
    for &column in columns {
        if table.has_column(column) {
            continue;
        }
        if table.is_empty() {
            debug!(section, column, "canonical column missing from empty section");
        } else {
            warn!(section, column, "canonical column missing, filled with missing values");
        }
        table.set_column(column, vec![Cell::Missing; table.len()]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_column_honours_priority_order() {
        let table = Table::new(["Target", "Defender Name", "Attacker"]);
        assert_eq!(resolve_column(&table, TARGET_COLUMN_CANDIDATES), Some("Target"));
        assert_eq!(resolve_column(&table, ATTACKER_COLUMN_CANDIDATES), Some("Attacker"));
        assert_eq!(resolve_column(&Table::default(), ATTACKER_COLUMN_CANDIDATES), None);
    }

    #[test]
    fn ability_type_overrides_event_type_when_present() {
        let mut table = Table::from_rows(
            vec!["event_type".into(), "ability_type".into()],
            vec![
                vec![Cell::Text("Attack".into()), Cell::Missing],
                vec![Cell::Text("Attack".into()), Cell::Text("Officer".into())],
            ],
        );
        resolve_event_type(&mut table);
        assert_eq!(table.text(0, "event_type"), Some("Attack"));
        assert_eq!(table.text(1, "event_type"), Some("Officer"));
    }

    #[test]
    fn event_type_is_created_from_ability_type_alone() {
        let mut table = Table::from_rows(
            vec!["ability_type".into()],
            vec![vec![Cell::Text("ForbiddenTechAbility".into())]],
        );
        resolve_event_type(&mut table);
        assert_eq!(table.text(0, "event_type"), Some("ForbiddenTechAbility"));
    }

    #[test]
    fn fill_missing_columns_keeps_present_values() {
        let mut table = Table::from_rows(
            vec!["round".into()],
            vec![vec![Cell::Number(1.0)], vec![Cell::Number(2.0)]],
        );
        fill_missing_columns(&mut table, "combat", &["round", "total_iso", "is_crit"]);

        assert_eq!(table.columns(), ["round", "total_iso", "is_crit"]);
        assert_eq!(table.number(1, "round"), Some(2.0));
        assert!(table.cell(0, "total_iso").is_missing());
        assert!(table.cell(1, "is_crit").is_missing());
    }
}
