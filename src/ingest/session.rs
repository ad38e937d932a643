//! Read-only queries over one parsed battle log.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;

use crate::ingest::pipeline::CombatTable;
use crate::ingest::roster::{Outcome, PlayerMetadata, PLAYER_NAME, SHIP_NAME};
use crate::ingest::table::Table;

const TIMESTAMP_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
];

/// A combatant identified by name, alliance and ship. Any part may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ShipSpecifier {
    pub name: Option<String>,
    pub alliance: Option<String>,
    pub ship: Option<String>,
}

impl ShipSpecifier {
    pub fn new(name: Option<&str>, alliance: Option<&str>, ship: Option<&str>) -> Self {
        Self {
            name: name.map(str::to_string),
            alliance: alliance.map(str::to_string),
            ship: ship.map(str::to_string),
        }
    }

    pub fn is_blank(&self) -> bool {
        [&self.name, &self.alliance, &self.ship]
            .into_iter()
            .all(|part| present(part).is_none())
    }

    /// Whether a combat row's attacker matches every known part of this spec.
    pub fn matches_attacker(&self, table: &Table, row: usize) -> bool {
        [
            (&self.name, "attacker_name"),
            (&self.alliance, "attacker_alliance"),
            (&self.ship, "attacker_ship"),
        ]
        .into_iter()
        .all(|(part, column)| {
            present(part).map_or(true, |wanted| table.text(row, column) == Some(wanted))
        })
    }
}

impl fmt::Display for ShipSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_deref().unwrap_or(""))?;
        if let Some(alliance) = &self.alliance {
            write!(f, " [{alliance}]")?;
        }
        if let Some(ship) = present(&self.ship) {
            if Some(ship) != self.name.as_deref() {
                write!(f, " \u{2014} {ship}")?;
            }
        }
        Ok(())
    }
}

fn present(part: &Option<String>) -> Option<&str> {
    part.as_deref().filter(|value| !value.is_empty())
}

/// Where and when the battle happened, and how long it ran.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionContext {
    pub location: Option<String>,
    pub timestamp_raw: Option<String>,
    pub timestamp: Option<NaiveDateTime>,
    pub rounds: Option<u32>,
}

impl SessionContext {
    /// Location with a trailing "System" unless the export already says so.
    pub fn location_label(&self) -> Option<String> {
        let location = self.location.as_deref()?.trim();
        if location.is_empty() {
            None
        } else if location.to_lowercase().contains("system") {
            Some(location.to_string())
        } else {
            Some(format!("{location} System"))
        }
    }
}

/// Parse an export timestamp; `None` when no known layout fits.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_local());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

/// Filtered views over a [`CombatTable`].
#[derive(Debug, Clone, Copy)]
pub struct SessionView<'a> {
    log: &'a CombatTable,
}

impl<'a> SessionView<'a> {
    pub fn new(log: &'a CombatTable) -> Self {
        Self { log }
    }

    fn combat(&self) -> &'a Table {
        self.log.combat()
    }

    fn players(&self) -> &'a Table {
        self.log.players().table()
    }

    fn event_rows(&self, kind: &'a str) -> impl Iterator<Item = usize> + 'a {
        let combat = self.combat();
        (0..combat.len()).filter(move |&row| {
            combat
                .text(row, "event_type")
                .is_some_and(|value| value.trim().eq_ignore_ascii_case(kind))
        })
    }

    fn distinct_text(
        table: &Table,
        rows: impl Iterator<Item = usize>,
        column: &str,
    ) -> BTreeSet<String> {
        rows.filter_map(|row| table.text(row, column))
            .map(str::to_string)
            .collect()
    }

    /// Distinct attacker (name, alliance, ship) combinations. Rows with all
    /// three parts missing are skipped.
    pub fn every_ship(&self) -> BTreeSet<ShipSpecifier> {
        let combat = self.combat();
        (0..combat.len())
            .map(|row| {
                ShipSpecifier::new(
                    combat.text(row, "attacker_name"),
                    combat.text(row, "attacker_alliance"),
                    combat.text(row, "attacker_ship"),
                )
            })
            .filter(|spec| !spec.is_blank())
            .collect()
    }

    /// Ships a combatant fired from in attack rows.
    pub fn ships_for(&self, combatant: &str) -> BTreeSet<String> {
        let combat = self.combat();
        let rows = self
            .event_rows("attack")
            .filter(|&row| combat.text(row, "attacker_name") == Some(combatant));
        Self::distinct_text(combat, rows, "attacker_ship")
    }

    /// First roster row for `combatant`, on `ship` when given.
    fn roster_row(&self, combatant: &str, ship: Option<&str>) -> Option<usize> {
        let players = self.players();
        (0..players.len()).find(|&row| {
            players.text(row, PLAYER_NAME) == Some(combatant)
                && ship.map_or(true, |ship| players.text(row, SHIP_NAME) == Some(ship))
        })
    }

    fn officer_slot(&self, combatant: &str, ship: &str, column: &str) -> BTreeSet<String> {
        let players = self.players();
        let rows = (0..players.len()).filter(|&row| {
            players.text(row, PLAYER_NAME) == Some(combatant)
                && players.text(row, SHIP_NAME) == Some(ship)
        });
        Self::distinct_text(players, rows, column)
    }

    pub fn captain(&self, combatant: &str, ship: &str) -> BTreeSet<String> {
        self.officer_slot(combatant, ship, "Officer One")
    }

    pub fn first_officer(&self, combatant: &str, ship: &str) -> BTreeSet<String> {
        self.officer_slot(combatant, ship, "Officer Two")
    }

    pub fn second_officer(&self, combatant: &str, ship: &str) -> BTreeSet<String> {
        self.officer_slot(combatant, ship, "Officer Three")
    }

    pub fn bridge_crew(&self, combatant: &str, ship: &str) -> BTreeSet<String> {
        let mut crew = self.captain(combatant, ship);
        crew.extend(self.first_officer(combatant, ship));
        crew.extend(self.second_officer(combatant, ship));
        crew
    }

    /// Every officer whose ability fired for this combatant and ship.
    pub fn all_officer_names(&self, combatant: &str, ship: &str) -> BTreeSet<String> {
        let combat = self.combat();
        let rows = self.event_rows("officer").filter(|&row| {
            combat.text(row, "attacker_name") == Some(combatant)
                && combat.text(row, "attacker_ship") == Some(ship)
        });
        Self::distinct_text(combat, rows, "ability_owner_name")
    }

    /// Officers that fired abilities but are not on the bridge.
    pub fn below_deck_officers(&self, combatant: &str, ship: &str) -> BTreeSet<String> {
        let bridge = self.bridge_crew(combatant, ship);
        self.all_officer_names(combatant, ship)
            .into_iter()
            .filter(|name| !bridge.contains(name))
            .collect()
    }

    /// Player names from the roster plus every attacker name in combat.
    pub fn combatant_names(&self) -> BTreeSet<String> {
        let players = self.players();
        let combat = self.combat();
        let mut names = Self::distinct_text(players, 0..players.len(), PLAYER_NAME);
        names.extend(Self::distinct_text(combat, 0..combat.len(), "attacker_name"));
        names
    }

    pub fn alliance_names(&self) -> BTreeSet<String> {
        let combat = self.combat();
        Self::distinct_text(combat, 0..combat.len(), "attacker_alliance")
    }

    /// Indices of combat rows fired by `spec`.
    pub fn attacker_rows(&self, spec: &ShipSpecifier) -> Vec<usize> {
        let combat = self.combat();
        (0..combat.len())
            .filter(|&row| spec.matches_attacker(combat, row))
            .collect()
    }

    pub fn rows_by_attacker(&self, spec: &ShipSpecifier) -> Table {
        self.combat().select_rows(&self.attacker_rows(spec))
    }

    /// Combat rows fired by any of `specs`, in row order. No specs means no
    /// filter.
    pub fn rows_by_attackers(&self, specs: &[ShipSpecifier]) -> Table {
        let combat = self.combat();
        if specs.is_empty() {
            return combat.clone();
        }
        let rows: Vec<usize> = (0..combat.len())
            .filter(|&row| specs.iter().any(|spec| spec.matches_attacker(combat, row)))
            .collect();
        combat.select_rows(&rows)
    }

    /// Outcome per attacker spec, taken from the roster row with the same
    /// player and ship. Specs without a matching row are absent.
    pub fn outcome_lookup(&self) -> HashMap<ShipSpecifier, Outcome> {
        let roster = self.log.players();
        self.every_ship()
            .into_iter()
            .filter_map(|spec| {
                let name = present(&spec.name)?;
                let row = self.roster_row(name, present(&spec.ship))?;
                let outcome = roster.metadata(row)?.outcome?;
                Some((spec, outcome))
            })
            .collect()
    }

    /// The opposing side's roster entry (the last players row).
    pub fn npc(&self) -> Option<PlayerMetadata> {
        let roster = self.log.players();
        roster.npc_row().and_then(|row| roster.metadata(row))
    }

    pub fn context(&self) -> SessionContext {
        let players = self.players();
        let first_text = |column: &str| {
            (0..players.len())
                .find_map(|row| players.text(row, column))
                .map(str::to_string)
        };
        let timestamp_raw = first_text("Timestamp");
        let combat = self.combat();
        let rounds = (0..combat.len())
            .filter_map(|row| combat.number(row, "round"))
            .filter(|round| *round >= 0.0)
            .map(|round| round as u32)
            .max();
        SessionContext {
            location: first_text("Location"),
            timestamp: timestamp_raw.as_deref().and_then(parse_timestamp),
            timestamp_raw,
            rounds,
        }
    }
}
