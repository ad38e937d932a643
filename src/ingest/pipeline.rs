//! Entry point: raw export bytes in, normalized combat table with side tables out.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info_span, warn};

use crate::error::IngestError;
use crate::ingest::columns::{
    fill_missing_columns, resolve_event_type, BOOLEAN_COLUMNS, COMBAT_COLUMN_ORDER,
    COMBAT_COLUMN_RENAMES, NUMERIC_COLUMNS, RAW_NUMERIC_COLUMNS, SHOT_INDEX_COLUMN,
};
use crate::ingest::damage_flow::{
    accounting_summary, append_damage_flow, AccountingSummary, DamageFlow, DamageInputs,
    ACCOUNTING_TOLERANCE, DAMAGE_FLOW_COLUMNS,
};
use crate::ingest::normalize::{coerce_numeric, coerce_yes_no, normalize};
use crate::ingest::roster::{parse_fleets, parse_loot, parse_players, PlayerTable};
use crate::ingest::sections::{extract_sections, SectionKind};
use crate::ingest::shot_index::append_shot_index;
use crate::ingest::table::{decode_section, Table};

/// Share of replacement characters above which lossy-decoded input is
/// treated as binary rather than damaged text.
const MAX_REPLACEMENT_RATIO: f64 = 0.3;

/// One parsed export: the normalized combat table plus the side tables that
/// came with it. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct CombatTable {
    filename: String,
    combat: Table,
    players: PlayerTable,
    fleets: Table,
    loot: Table,
    raw_combat: Table,
}

impl CombatTable {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Normalized combat rows in canonical column order.
    pub fn combat(&self) -> &Table {
        &self.combat
    }

    pub fn players(&self) -> &PlayerTable {
        &self.players
    }

    /// Fleet rows, positionally aligned with the players section.
    pub fn fleets(&self) -> &Table {
        &self.fleets
    }

    pub fn loot(&self) -> &Table {
        &self.loot
    }

    /// Combat section as decoded, before trimming, coercion and renames.
    pub fn raw_combat(&self) -> &Table {
        &self.raw_combat
    }

    pub fn len(&self) -> usize {
        self.combat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combat.is_empty()
    }

    pub fn events(&self) -> Vec<CombatEvent> {
        (0..self.combat.len())
            .map(|row| CombatEvent::from_row(&self.combat, row))
            .collect()
    }

    pub fn summary(&self) -> ParseSummary {
        let combat = &self.combat;
        let rounds = (0..combat.len())
            .filter_map(|row| combat.number(row, "round"))
            .fold(None, |max: Option<f64>, round| Some(max.map_or(round, |m| m.max(round))));
        ParseSummary {
            filename: self.filename.clone(),
            combat_rows: combat.len(),
            rounds: rounds.and_then(|round| (round >= 0.0).then_some(round as u32)),
            shots: (0..combat.len())
                .filter(|&row| combat.number(row, SHOT_INDEX_COLUMN).is_some())
                .count(),
            players: self.players.len(),
            inferred_players: (0..self.players.len())
                .filter(|&row| self.players.is_inferred(row))
                .count(),
            fleets: self.fleets.len(),
            rewards: self.loot.len(),
            accounting: accounting_summary(combat, ACCOUNTING_TOLERANCE),
        }
    }
}

/// Headline counts for one parsed export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseSummary {
    pub filename: String,
    pub combat_rows: usize,
    pub rounds: Option<u32>,
    pub shots: usize,
    pub players: usize,
    pub inferred_players: usize,
    pub fleets: usize,
    pub rewards: usize,
    pub accounting: AccountingSummary,
}

/// Typed view of one normalized combat row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombatEvent {
    pub round: Option<u32>,
    pub battle_event: Option<String>,
    pub event_type: Option<String>,
    pub is_crit: Option<bool>,
    pub attacker_name: Option<String>,
    pub attacker_ship: Option<String>,
    pub attacker_alliance: Option<String>,
    pub attacker_is_armada: Option<bool>,
    pub target_name: Option<String>,
    pub target_ship: Option<String>,
    pub target_alliance: Option<String>,
    pub target_is_armada: Option<bool>,
    pub damage: DamageInputs,
    pub flow: DamageFlow,
    pub ability_type: Option<String>,
    pub ability_value: Option<f64>,
    pub ability_name: Option<String>,
    pub ability_owner_name: Option<String>,
    pub target_defeated: Option<String>,
    pub target_destroyed: Option<String>,
    pub shot_index: Option<u32>,
}

impl CombatEvent {
    fn from_row(table: &Table, row: usize) -> Self {
        let text = |column: &str| table.cell(row, column).label();
        let whole = |column: &str| {
            table
                .number(row, column)
                .filter(|value| *value >= 0.0 && value.fract() == 0.0)
                .map(|value| value as u32)
        };
        Self {
            round: whole("round"),
            battle_event: text("battle_event"),
            event_type: text("event_type"),
            is_crit: table.boolean(row, "is_crit"),
            attacker_name: text("attacker_name"),
            attacker_ship: text("attacker_ship"),
            attacker_alliance: text("attacker_alliance"),
            attacker_is_armada: table.boolean(row, "attacker_is_armada"),
            target_name: text("target_name"),
            target_ship: text("target_ship"),
            target_alliance: text("target_alliance"),
            target_is_armada: table.boolean(row, "target_is_armada"),
            damage: DamageInputs::from_row(table, row),
            flow: DamageFlow {
                applied_damage: table.number(row, "applied_damage"),
                damage_after_apex: table.number(row, "damage_after_apex"),
                damage_before_apex: table.number(row, "damage_before_apex"),
                iso_remain: table.number(row, "iso_remain"),
                normal_remain: table.number(row, "normal_remain"),
                remain_before_apex: table.number(row, "remain_before_apex"),
                apex_r: table.number(row, "apex_r"),
                apex_barrier_hit: table.number(row, "apex_barrier_hit"),
                accounting_delta: table.number(row, "accounting_delta"),
            },
            ability_type: text("ability_type"),
            ability_value: table.number(row, "ability_value"),
            ability_name: text("ability_name"),
            ability_owner_name: text("ability_owner_name"),
            target_defeated: text("target_defeated"),
            target_destroyed: text("target_destroyed"),
            shot_index: whole(SHOT_INDEX_COLUMN),
        }
    }

    pub fn is_attack(&self) -> bool {
        self.event_type
            .as_deref()
            .is_some_and(|kind| kind.trim().eq_ignore_ascii_case("attack"))
    }
}

/// Decode raw upload bytes as text. UTF-8 with replacement for bad sequences;
/// UTF-16 when a byte-order mark says so. Binary content is rejected.
pub fn decode_text<'a>(bytes: &'a [u8], filename: &str) -> Result<Cow<'a, str>, IngestError> {
    let undecodable = |reason: &str| IngestError::Undecodable {
        filename: filename.to_string(),
        reason: reason.to_string(),
    };

    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return Ok(Cow::Owned(decode_utf16(rest, u16::from_le_bytes)));
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return Ok(Cow::Owned(decode_utf16(rest, u16::from_be_bytes)));
    }
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    if bytes.contains(&0) {
        return Err(undecodable("contains NUL bytes"));
    }

    let text = String::from_utf8_lossy(bytes);
    if let Cow::Owned(decoded) = &text {
        let total = decoded.chars().count();
        let replaced = decoded.chars().filter(|&c| c == char::REPLACEMENT_CHARACTER).count();
        if total > 0 && replaced as f64 / total as f64 > MAX_REPLACEMENT_RATIO {
            return Err(undecodable("mostly invalid UTF-8"));
        }
        warn!(filename, replaced, "invalid UTF-8 sequences replaced");
    }
    Ok(text)
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Parse one uploaded export. Fails only when the bytes are not text.
pub fn parse_battle_log(input: impl AsRef<[u8]>, filename: &str) -> Result<CombatTable, IngestError> {
    let text = decode_text(input.as_ref(), filename)?;
    Ok(parse_battle_text(&text, filename))
}

/// Read and parse an export from disk. The file name becomes the log's
/// `filename`.
pub fn read_battle_log(path: &Path) -> Result<CombatTable, IngestError> {
    let bytes = fs::read(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse_battle_log(bytes, &filename)
}

/// Parse already-decoded export text. Never fails: missing or malformed
/// sections become empty tables.
pub fn parse_battle_text(text: &str, filename: &str) -> CombatTable {
    let _span = info_span!("parse_battle_log", filename).entered();

    let sections = extract_sections(text);
    if !sections.contains(SectionKind::Combat) {
        warn!(section = SectionKind::Combat.name(), "combat section not found");
    }

    let raw_combat = decode_section(sections.get(SectionKind::Combat), SectionKind::Combat);
    let combat = normalize_combat(raw_combat.clone());
    let players = parse_players(sections.get(SectionKind::Players), &combat);
    let fleets = parse_fleets(sections.get(SectionKind::Fleets));
    let loot = parse_loot(sections.get(SectionKind::Rewards));

    debug!(
        combat_rows = combat.len(),
        players = players.len(),
        fleets = fleets.len(),
        rewards = loot.len(),
        "battle log parsed"
    );

    CombatTable {
        filename: filename.to_string(),
        combat,
        players,
        fleets,
        loot,
        raw_combat,
    }
}

/// Trim, coerce, rename and derive the combat section.
pub fn normalize_combat(mut table: Table) -> Table {
    let section = SectionKind::Combat.name();
    normalize(&mut table);
    coerce_numeric(&mut table, section, RAW_NUMERIC_COLUMNS);
    table.rename_columns(COMBAT_COLUMN_RENAMES);
    coerce_numeric(&mut table, section, NUMERIC_COLUMNS);
    coerce_yes_no(&mut table, section, BOOLEAN_COLUMNS);
    resolve_event_type(&mut table);

    let source_columns: Vec<&str> = COMBAT_COLUMN_ORDER
        .iter()
        .copied()
        .filter(|column| !DAMAGE_FLOW_COLUMNS.contains(column))
        .collect();
    fill_missing_columns(&mut table, section, &source_columns);

    append_damage_flow(&mut table);
    append_shot_index(&mut table);

    let mut order: Vec<&str> = COMBAT_COLUMN_ORDER.to_vec();
    order.push(SHOT_INDEX_COLUMN);
    table.reorder_front(&order);
    table
}
