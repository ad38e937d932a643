//! Battle-log ingestion: section splitting, decoding, normalization and the
//! derived damage and shot columns.

pub mod columns;
pub mod damage_flow;
pub mod normalize;
pub mod pipeline;
pub mod roster;
pub mod sections;
pub mod session;
pub mod shot_index;
pub mod table;

pub use damage_flow::{reconstruct, AccountingSummary, DamageFlow, DamageInputs};
pub use pipeline::{
    parse_battle_log, parse_battle_text, read_battle_log, CombatEvent, CombatTable, ParseSummary,
};
pub use roster::{Outcome, PlayerMetadata, PlayerTable, Role};
pub use sections::{extract_sections, SectionKind, Sections};
pub use session::{SessionContext, SessionView, ShipSpecifier};
pub use table::{Cell, Table};
