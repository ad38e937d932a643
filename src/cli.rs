use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::AppConfig;
use crate::error::IngestError;
use crate::ingest::{read_battle_log, CombatTable, ParseSummary, SessionContext, SessionView};
use crate::parallel::parse_files;
use crate::server;

const USAGE: &str = "usage: battlelog <parse|summary|batch|serve>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Parse,
    Summary,
    Batch,
    Serve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Tsv,
    Json,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("parse") => Some(Command::Parse),
        Some("summary") => Some(Command::Summary),
        Some("batch") => Some(Command::Batch),
        Some("serve") => Some(Command::Serve),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    let config = AppConfig::from_env();
    match parse_command(args) {
        Some(Command::Parse) => handle_parse(args),
        Some(Command::Summary) => handle_summary(args),
        Some(Command::Batch) => handle_batch(args, &config),
        Some(Command::Serve) => handle_serve(&config),
        None => {
            eprintln!("{USAGE}");
            2
        }
    }
}

/// Positional arguments after the subcommand, flags removed.
fn positional(args: &[String]) -> Vec<&str> {
    args.iter()
        .skip(2)
        .map(String::as_str)
        .filter(|arg| !arg.starts_with("--"))
        .collect()
}

fn output_format(args: &[String]) -> Result<OutputFormat, String> {
    let mut format = OutputFormat::Tsv;
    for flag in args.iter().skip(2).filter(|arg| arg.starts_with("--")) {
        format = match flag.as_str() {
            "--json" => OutputFormat::Json,
            "--tsv" => OutputFormat::Tsv,
            other => return Err(format!("unknown flag '{other}'")),
        };
    }
    Ok(format)
}

fn single_path(args: &[String], command: &str) -> Option<PathBuf> {
    match positional(args).as_slice() {
        [path] => Some(PathBuf::from(path)),
        _ => {
            eprintln!("usage: battlelog {command} <battle-log.tsv>");
            None
        }
    }
}

fn load(path: &Path) -> Option<CombatTable> {
    match read_battle_log(path) {
        Ok(log) => Some(log),
        Err(err) => {
            eprintln!("parse failed: {err}");
            None
        }
    }
}

#[derive(Debug, Serialize)]
struct ParseOutput<'a> {
    summary: ParseSummary,
    context: SessionContext,
    log: &'a CombatTable,
}

fn handle_parse(args: &[String]) -> i32 {
    let format = match output_format(args) {
        Ok(format) => format,
        Err(msg) => {
            eprintln!("{msg}");
            eprintln!("usage: battlelog parse <battle-log.tsv> [--json|--tsv]");
            return 2;
        }
    };
    let Some(path) = single_path(args, "parse [--json|--tsv]") else {
        return 2;
    };
    let Some(log) = load(&path) else {
        return 1;
    };

    let written = match format {
        OutputFormat::Tsv => log
            .combat()
            .write_tsv(io::stdout().lock())
            .map_err(IngestError::from),
        OutputFormat::Json => {
            let output = ParseOutput {
                summary: log.summary(),
                context: SessionView::new(&log).context(),
                log: &log,
            };
            print_json(&output)
        }
    };
    match written {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("failed to write output: {err}");
            1
        }
    }
}

#[derive(Debug, Serialize)]
struct SummaryOutput {
    #[serde(flatten)]
    summary: ParseSummary,
    context: SessionContext,
    location_label: Option<String>,
}

fn handle_summary(args: &[String]) -> i32 {
    let Some(path) = single_path(args, "summary") else {
        return 2;
    };
    let Some(log) = load(&path) else {
        return 1;
    };
    let context = SessionView::new(&log).context();
    let output = SummaryOutput {
        summary: log.summary(),
        location_label: context.location_label(),
        context,
    };
    match print_json(&output) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("failed to serialize summary: {err}");
            1
        }
    }
}

#[derive(Debug, Serialize)]
struct BatchEntry {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ParseSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn handle_batch(args: &[String], config: &AppConfig) -> i32 {
    let paths: Vec<PathBuf> = positional(args).into_iter().map(PathBuf::from).collect();
    if paths.is_empty() {
        eprintln!("usage: battlelog batch <battle-log.tsv>...");
        return 2;
    }

    let results = parse_files(&paths, &config.worker_pool());
    let mut failed = false;
    let entries: Vec<BatchEntry> = paths
        .iter()
        .zip(results)
        .map(|(path, result)| {
            let path = path.display().to_string();
            match result {
                Ok(log) => BatchEntry {
                    path,
                    summary: Some(log.summary()),
                    error: None,
                },
                Err(err) => {
                    failed = true;
                    BatchEntry {
                        path,
                        summary: None,
                        error: Some(err.to_string()),
                    }
                }
            }
        })
        .collect();

    match print_json(&entries) {
        Ok(()) if failed => 1,
        Ok(()) => 0,
        Err(err) => {
            eprintln!("failed to serialize batch result: {err}");
            1
        }
    }
}

fn handle_serve(config: &AppConfig) -> i32 {
    match server::run_server(config) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("server error: {err}");
            1
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), IngestError> {
    let payload = serde_json::to_string_pretty(value)?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{payload}").map_err(|source| IngestError::Io {
        path: "<stdout>".to_string(),
        source,
    })
}
