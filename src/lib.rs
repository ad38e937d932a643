pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod parallel;
pub mod server;

pub use error::IngestError;
pub use ingest::{parse_battle_log, parse_battle_text, read_battle_log, CombatTable, SessionView};
