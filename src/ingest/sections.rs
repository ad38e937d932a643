//! Split a raw battle-log export into its labeled sections.
//!
//! The export is a sequence of tab-separated blocks separated by blank lines.
//! Each block starts with a header line whose leading field names identify it;
//! those prefixes are the only structural markers in the file.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

/// The four section kinds a battle-log export can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Players,
    Rewards,
    Fleets,
    Combat,
}

impl SectionKind {
    /// Match order for header detection; first match wins.
    pub const ALL: [SectionKind; 4] = [
        SectionKind::Players,
        SectionKind::Rewards,
        SectionKind::Fleets,
        SectionKind::Combat,
    ];

    /// Literal tab-separated prefix of the section's header line.
    pub const fn header_prefix(self) -> &'static str {
        match self {
            Self::Players => "Player Name\tPlayer Level\tOutcome",
            Self::Rewards => "Reward Name\tCount",
            Self::Fleets => "Fleet Type\tAttack\tDefense\tHealth",
            Self::Combat => "Round\tBattle Event\tType",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Players => "players",
            Self::Rewards => "rewards",
            Self::Fleets => "fleets",
            Self::Combat => "combat",
        }
    }

    fn matching(line: &str) -> Option<SectionKind> {
        Self::ALL
            .into_iter()
            .find(|kind| line.starts_with(kind.header_prefix()))
    }
}

/// Joined text of every section found in one export, header line inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sections {
    blocks: HashMap<SectionKind, String>,
}

impl Sections {
    pub fn get(&self, kind: SectionKind) -> Option<&str> {
        self.blocks.get(&kind).map(String::as_str)
    }

    pub fn contains(&self, kind: SectionKind) -> bool {
        self.blocks.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    fn flush(&mut self, current: Option<SectionKind>, buffer: &mut Vec<&str>) {
        if let Some(kind) = current {
            if !buffer.is_empty() {
                debug!(section = kind.name(), lines = buffer.len(), "section extracted");
                self.blocks.insert(kind, buffer.join("\n"));
            }
        }
        buffer.clear();
    }
}

/// Scan `text` line by line and collect each recognised section.
///
/// A blank line closes the open section. A header line opens a new section,
/// closing any previous one. Lines outside any section are dropped.
pub fn extract_sections(text: &str) -> Sections {
    let mut sections = Sections::default();
    let mut current: Option<SectionKind> = None;
    let mut buffer: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            sections.flush(current.take(), &mut buffer);
            continue;
        }

        if let Some(kind) = SectionKind::matching(line) {
            sections.flush(current.take(), &mut buffer);
            current = Some(kind);
            buffer.push(line);
            continue;
        }

        if current.is_some() {
            buffer.push(line);
        }
    }
    sections.flush(current, &mut buffer);

    sections
}
