//! Player, fleet and reward side tables.
//!
//! Exports sometimes omit one side of the fight from the players section.
//! When that happens the roster is filled in from the names and ships seen in
//! combat rows. Inferred rows carry only `Player Name` and `Ship Name`; every
//! other field is missing, not guessed.

use serde::Serialize;
use tracing::warn;

use crate::ingest::normalize::{coerce_numeric, coerce_yes_no, normalize, parse_number};
use crate::ingest::sections::SectionKind;
use crate::ingest::table::{decode_section, Cell, Table};

pub const PLAYER_NAME: &str = "Player Name";
pub const SHIP_NAME: &str = "Ship Name";

const FLEET_COLUMN_RENAMES: &[(&str, &str)] = &[
    ("Buff applied", "buff_applied"),
    ("Debuff applied", "debuff_applied"),
];
const FLEET_BOOLEAN_COLUMNS: &[&str] = &["buff_applied", "debuff_applied"];
const LOOT_NUMERIC_COLUMNS: &[&str] = &["Count"];

/// Which side of the fight a roster row belongs to. The export lists the
/// NPC (or opposing side) last; that position is resolved once here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Player,
    Npc,
}

/// Battle outcome as reported in the players section.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Victory,
    Defeat,
    Partial,
    Other(String),
}

impl Outcome {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let normalized = trimmed.to_uppercase().replace('_', " ");
        Some(match normalized.as_str() {
            "VICTORY" => Self::Victory,
            "DEFEAT" => Self::Defeat,
            "PARTIAL" | "PARTIAL VICTORY" => Self::Partial,
            _ => Self::Other(trimmed.to_string()),
        })
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Victory => "VICTORY",
            Self::Defeat => "DEFEAT",
            Self::Partial => "PARTIAL",
            Self::Other(raw) => raw,
        }
    }
}

/// Captain and bridge officers assigned to a ship.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BridgeCrew {
    pub captain: Option<String>,
    pub first_officer: Option<String>,
    pub second_officer: Option<String>,
}

impl BridgeCrew {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        [&self.captain, &self.first_officer, &self.second_officer]
            .into_iter()
            .flatten()
            .map(String::as_str)
    }
}

/// Typed view of one players-section row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerMetadata {
    pub name: Option<String>,
    pub level: Option<u32>,
    pub outcome: Option<Outcome>,
    pub ship_name: Option<String>,
    pub ship_level: Option<u32>,
    pub ship_strength: Option<f64>,
    pub crew: BridgeCrew,
    pub hull_health: Option<f64>,
    pub hull_health_remaining: Option<f64>,
    pub shield_health: Option<f64>,
    pub shield_health_remaining: Option<f64>,
    pub alliance: Option<String>,
    pub location: Option<String>,
    pub timestamp: Option<String>,
    pub role: Role,
    /// True for rows synthesized from combat data.
    pub inferred: bool,
}

/// Normalized players table with a role and provenance per row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayerTable {
    table: Table,
    roles: Vec<Role>,
    /// Row index in the players section, `None` for inferred rows.
    source_rows: Vec<Option<usize>>,
}

impl PlayerTable {
    fn tagged(table: Table, source_rows: Vec<Option<usize>>) -> Self {
        let len = table.len();
        let roles = (0..len)
            .map(|row| if row + 1 == len { Role::Npc } else { Role::Player })
            .collect();
        Self {
            table,
            roles,
            source_rows,
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn role(&self, row: usize) -> Option<Role> {
        self.roles.get(row).copied()
    }

    pub fn is_inferred(&self, row: usize) -> bool {
        self.source_rows.get(row).is_some_and(Option::is_none)
    }

    /// Row index in the original players section; fleets align to this.
    pub fn source_row(&self, row: usize) -> Option<usize> {
        self.source_rows.get(row).copied().flatten()
    }

    pub fn npc_row(&self) -> Option<usize> {
        self.roles.iter().rposition(|role| *role == Role::Npc)
    }

    pub fn player_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.roles
            .iter()
            .enumerate()
            .filter(|(_, role)| **role == Role::Player)
            .map(|(row, _)| row)
    }

    pub fn metadata(&self, row: usize) -> Option<PlayerMetadata> {
        if row >= self.len() {
            return None;
        }
        let text = |column: &str| self.table.text(row, column).map(str::to_string);
        let number = |column: &str| cell_number(self.table.cell(row, column));
        Some(PlayerMetadata {
            name: text(PLAYER_NAME),
            level: number("Player Level").and_then(to_u32),
            outcome: self.table.text(row, "Outcome").and_then(Outcome::parse),
            ship_name: text(SHIP_NAME),
            ship_level: number("Ship Level").and_then(to_u32),
            ship_strength: number("Ship Strength").or_else(|| number("Ship Power")),
            crew: BridgeCrew {
                captain: text("Officer One"),
                first_officer: text("Officer Two"),
                second_officer: text("Officer Three"),
            },
            hull_health: number("Hull Health"),
            hull_health_remaining: number("Hull Health Remaining"),
            shield_health: number("Shield Health"),
            shield_health_remaining: number("Shield Health Remaining"),
            alliance: text("Alliance").or_else(|| text("Player Alliance")),
            location: text("Location"),
            timestamp: text("Timestamp"),
            role: self.roles[row],
            inferred: self.is_inferred(row),
        })
    }

    pub fn all_metadata(&self) -> Vec<PlayerMetadata> {
        (0..self.len()).filter_map(|row| self.metadata(row)).collect()
    }
}

fn cell_number(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(value) => Some(*value),
        Cell::Text(text) => parse_number(text),
        _ => None,
    }
}

fn to_u32(value: f64) -> Option<u32> {
    (value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX)).then_some(value as u32)
}

/// Decode and normalize the players section, then fill in missing
/// combatants from `combat` when the section has at most one row.
pub fn parse_players(section_text: Option<&str>, combat: &Table) -> PlayerTable {
    let mut players = decode_section(section_text, SectionKind::Players);
    normalize(&mut players);
    augment_players(players, combat)
}

/// Add inferred combatants ahead of the trailing NPC row when the players
/// table has zero or one rows. Larger tables are returned unchanged.
pub fn augment_players(players: Table, combat: &Table) -> PlayerTable {
    let original_rows: Vec<Option<usize>> = (0..players.len()).map(Some).collect();
    if players.len() > 1 {
        return PlayerTable::tagged(players, original_rows);
    }

    let npc_name = players
        .len()
        .checked_sub(1)
        .and_then(|last| players.text(last, PLAYER_NAME))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);

    let inferred = fallback_players(combat, npc_name.as_deref());
    if inferred.is_empty() {
        return PlayerTable::tagged(players, original_rows);
    }

    let mut columns = players.columns().to_vec();
    for required in [PLAYER_NAME, SHIP_NAME] {
        if !columns.iter().any(|column| column == required) {
            columns.push(required.to_string());
        }
    }
    let mut combined = Table::new(columns.iter().cloned());
    let name_index = combined.column_index(PLAYER_NAME);
    let ship_index = combined.column_index(SHIP_NAME);
    for (name, ship) in &inferred {
        let mut row = vec![Cell::Missing; columns.len()];
        if let Some(index) = name_index {
            row[index] = name.clone().map_or(Cell::Missing, Cell::Text);
        }
        if let Some(index) = ship_index {
            row[index] = ship.clone().map_or(Cell::Missing, Cell::Text);
        }
        combined.push_row(row);
    }
    let mut source_rows = vec![None; inferred.len()];
    let npc = players.reindex_columns(&columns);
    for (row, cells) in npc.rows().iter().enumerate() {
        combined.push_row(cells.clone());
        source_rows.push(Some(row));
    }

    warn!(
        section = SectionKind::Players.name(),
        column = PLAYER_NAME,
        inferred = inferred.len(),
        npc = npc_name.as_deref().unwrap_or(""),
        "players section incomplete, roster inferred from combat rows"
    );
    PlayerTable::tagged(combined, source_rows)
}

/// Distinct (name, ship) pairs from combat attackers, then targets, in row
/// order. Skips fully blank pairs and any pair named `npc_name`.
pub fn fallback_players(
    combat: &Table,
    npc_name: Option<&str>,
) -> Vec<(Option<String>, Option<String>)> {
    const PAIRS: [(&str, &str); 2] = [
        ("attacker_name", "attacker_ship"),
        ("target_name", "target_ship"),
    ];
    let missing: Vec<&str> = PAIRS
        .iter()
        .flat_map(|(name, ship)| [*name, *ship])
        .filter(|column| !combat.has_column(column))
        .collect();
    if !missing.is_empty() {
        warn!(
            section = SectionKind::Combat.name(),
            column = missing.join(",").as_str(),
            "cannot infer players, combat columns missing"
        );
        return Vec::new();
    }

    let mut seen: Vec<(String, String)> = Vec::new();
    for (name_column, ship_column) in PAIRS {
        for row in 0..combat.len() {
            let name = combat.cell(row, name_column).label();
            let ship = combat.cell(row, ship_column).label();
            if name.is_none() && ship.is_none() {
                continue;
            }
            let pair = (name.unwrap_or_default(), ship.unwrap_or_default());
            if !seen.contains(&pair) {
                seen.push(pair);
            }
        }
    }

    seen.into_iter()
        .filter(|(name, _)| npc_name.map_or(true, |npc| name.trim() != npc))
        .filter(|(name, ship)| !name.trim().is_empty() || !ship.trim().is_empty())
        .map(|(name, ship)| (non_empty(name), non_empty(ship)))
        .collect()
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// Decode and normalize the fleets section; buff flags become booleans.
pub fn parse_fleets(section_text: Option<&str>) -> Table {
    let mut fleets = decode_section(section_text, SectionKind::Fleets);
    normalize(&mut fleets);
    fleets.rename_columns(FLEET_COLUMN_RENAMES);
    coerce_yes_no(&mut fleets, SectionKind::Fleets.name(), FLEET_BOOLEAN_COLUMNS);
    fleets
}

/// Decode and normalize the rewards section; `Count` becomes numeric.
pub fn parse_loot(section_text: Option<&str>) -> Table {
    let mut loot = decode_section(section_text, SectionKind::Rewards);
    normalize(&mut loot);
    coerce_numeric(&mut loot, SectionKind::Rewards.name(), LOOT_NUMERIC_COLUMNS);
    loot
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combat(rows: &[[&str; 4]]) -> Table {
        Table::from_rows(
            ["attacker_name", "attacker_ship", "target_name", "target_ship"]
                .map(String::from)
                .to_vec(),
            rows.iter()
                .map(|row| row.iter().map(|value| Cell::from_raw(value)).collect())
                .collect(),
        )
    }

    #[test]
    fn empty_players_section_is_inferred_from_combat() {
        let combat = combat(&[
            ["Alice", "BORG CUBE", "Borg Cube NPC", "Borg Cube"],
            ["Borg Cube NPC", "Borg Cube", "Alice", "BORG CUBE"],
            ["Alice", "BORG CUBE", "Borg Cube NPC", "Borg Cube"],
        ]);
        let players = parse_players(None, &combat);

        assert_eq!(players.len(), 2);
        assert_eq!(players.table().text(0, PLAYER_NAME), Some("Alice"));
        assert_eq!(players.table().text(0, SHIP_NAME), Some("BORG CUBE"));
        assert_eq!(players.table().text(1, PLAYER_NAME), Some("Borg Cube NPC"));
        assert_eq!(players.table().text(1, SHIP_NAME), Some("Borg Cube"));
        assert!(players.is_inferred(0) && players.is_inferred(1));
        assert_eq!(players.role(0), Some(Role::Player));
        assert_eq!(players.role(1), Some(Role::Npc));
        assert!(players.table().cell(0, "Outcome").is_missing());
    }

    #[test]
    fn single_npc_row_gets_inferred_players_inserted_before_it() {
        let section = "Player Name\tPlayer Level\tOutcome\tShip Name\n Hostile \t40\tVICTORY\tHostile";
        let combat = combat(&[
            ["Alice", "ENTERPRISE", "Hostile", "Hostile"],
            ["Bob", "SS REVENANT", "Hostile", "Hostile"],
            ["Hostile", "Hostile", "Alice", "ENTERPRISE"],
            ["--", "--", "Hostile", "Hostile"],
        ]);
        let players = parse_players(Some(section), &combat);

        assert_eq!(players.len(), 3);
        assert_eq!(players.table().text(0, PLAYER_NAME), Some("Alice"));
        assert_eq!(players.table().text(1, PLAYER_NAME), Some("Bob"));
        assert_eq!(players.table().text(2, PLAYER_NAME), Some("Hostile"));
        assert!(players.table().cell(0, "Player Level").is_missing());
        assert_eq!(players.npc_row(), Some(2));
        assert_eq!(players.source_row(2), Some(0));
        assert_eq!(players.player_rows().collect::<Vec<_>>(), vec![0, 1]);

        let npc = players.metadata(2).expect("npc");
        assert_eq!(npc.level, Some(40));
        assert_eq!(npc.outcome, Some(Outcome::Victory));
        assert!(!npc.inferred);
    }

    #[test]
    fn full_players_section_is_untouched() {
        let section = "Player Name\tPlayer Level\tOutcome\nAlice\t50\tDEFEAT\nHostile\t--\tVICTORY";
        let combat = combat(&[["Carol", "X", "Hostile", "Y"]]);
        let players = parse_players(Some(section), &combat);

        assert_eq!(players.len(), 2);
        assert!(!players.is_inferred(0));
        assert!(players.table().cell(1, "Player Level").is_missing());
        assert_eq!(players.role(0), Some(Role::Player));
        assert_eq!(players.role(1), Some(Role::Npc));
    }

    #[test]
    fn fallback_requires_all_name_and_ship_columns() {
        let partial = Table::new(["attacker_name", "target_name"]);
        assert!(fallback_players(&partial, None).is_empty());
    }

    #[test]
    fn fallback_keeps_pairs_with_only_a_ship() {
        let combat = combat(&[["--", "Mining Platform", "Alice", "--"]]);
        let pairs = fallback_players(&combat, None);
        assert_eq!(
            pairs,
            vec![
                (None, Some("Mining Platform".to_string())),
                (Some("Alice".to_string()), None),
            ]
        );
    }

    #[test]
    fn outcome_parsing_normalizes_case_and_underscores() {
        assert_eq!(Outcome::parse("victory"), Some(Outcome::Victory));
        assert_eq!(Outcome::parse("Partial_Victory"), Some(Outcome::Partial));
        assert_eq!(Outcome::parse(" DEFEAT "), Some(Outcome::Defeat));
        assert_eq!(Outcome::parse("Draw"), Some(Outcome::Other("Draw".into())));
        assert_eq!(Outcome::parse("  "), None);
    }

    #[test]
    fn section_parsers_trim_and_null_tokens_consistently() {
        let loot = parse_loot(Some("Reward Name\tCount\n  Nanoprobe  \t -- "));
        let fleets = parse_fleets(Some(
            "Fleet Type\tAttack\tDefense\tHealth\tBuff applied\n  Nanoprobe  \t -- \t \u{2014} \t  100  \tyes",
        ));

        assert_eq!(loot.text(0, "Reward Name"), Some("Nanoprobe"));
        assert!(loot.cell(0, "Count").is_missing());

        assert_eq!(fleets.text(0, "Fleet Type"), Some("Nanoprobe"));
        assert!(fleets.cell(0, "Attack").is_missing());
        assert!(fleets.cell(0, "Defense").is_missing());
        assert_eq!(fleets.text(0, "Health"), Some("100"));
        assert_eq!(fleets.boolean(0, "buff_applied"), Some(true));
    }
}
