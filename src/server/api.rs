use serde::Serialize;

use crate::error::IngestError;
use crate::ingest::roster::{PlayerMetadata, PlayerTable};
use crate::ingest::{parse_battle_log, ParseSummary, SessionContext, SessionView, Table};

pub const DEFAULT_UPLOAD_NAME: &str = "upload.tsv";

#[derive(Debug, Serialize)]
pub struct ParseResponse<'a> {
    pub status: &'static str,
    pub summary: ParseSummary,
    pub context: SessionContext,
    pub combat: &'a Table,
    pub players: &'a PlayerTable,
    pub roster: Vec<PlayerMetadata>,
    pub fleets: &'a Table,
    pub loot: &'a Table,
}

pub fn health_payload() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&serde_json::json!({
        "status": "ok",
        "service": "battlelog-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Value of `filename` in the request path's query string, if any.
pub fn upload_filename(path: &str) -> Option<String> {
    let query = path.split_once('?')?.1;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "filename")
        .map(|(_, value)| percent_decode(value))
        .filter(|value| !value.is_empty())
}

fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|hex| u8::from_str_radix(hex, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 2;
                    }
                    None => out.push(b'%'),
                }
            }
            byte => out.push(byte),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parse an uploaded export and render the summary and tables as JSON.
pub fn parse_payload(body: &[u8], filename: &str) -> Result<String, IngestError> {
    let log = parse_battle_log(body, filename)?;
    let response = ParseResponse {
        status: "ok",
        summary: log.summary(),
        context: SessionView::new(&log).context(),
        combat: log.combat(),
        players: log.players(),
        roster: log.players().all_metadata(),
        fleets: log.fleets(),
        loot: log.loot(),
    };
    Ok(serde_json::to_string_pretty(&response)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_comes_from_query_string() {
        assert_eq!(
            upload_filename("/api/parse?filename=fight%201.tsv").as_deref(),
            Some("fight 1.tsv")
        );
        assert_eq!(
            upload_filename("/api/parse?x=1&filename=a+b.tsv").as_deref(),
            Some("a b.tsv")
        );
        assert_eq!(upload_filename("/api/parse"), None);
        assert_eq!(upload_filename("/api/parse?filename="), None);
    }

    #[test]
    fn malformed_escapes_pass_through() {
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
    }
}
