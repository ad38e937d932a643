use std::path::Path;

use battlelog::server::routes::route_request;

const LIMIT: usize = 1024 * 1024;

fn fixture_bytes() -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("battle_log.tsv");
    std::fs::read(path).expect("read fixture")
}

#[test]
fn health_endpoint_returns_ok_json() {
    let response = route_request("GET", "/api/health", b"", LIMIT);
    assert_eq!(response.status_code, 200);
    assert_eq!(response.content_type, "application/json");
    assert!(response.body.contains("\"status\": \"ok\""));
}

#[test]
fn parse_endpoint_returns_summary_and_tables() {
    let response = route_request("POST", "/api/parse?filename=fight.tsv", &fixture_bytes(), LIMIT);
    assert_eq!(response.status_code, 200);

    let payload: serde_json::Value =
        serde_json::from_str(&response.body).expect("response should be valid json");
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["summary"]["filename"], "fight.tsv");
    assert_eq!(payload["summary"]["combat_rows"], 6);
    assert_eq!(payload["players"]["roles"][1], "npc");
    assert_eq!(payload["roster"][0]["crew"]["captain"], "Kirk");
    assert_eq!(payload["roster"][0]["outcome"], "victory");
    assert_eq!(payload["loot"]["rows"][0][1], 1200.0);
    assert!(payload["combat"]["columns"]
        .as_array()
        .expect("columns array")
        .iter()
        .any(|column| column == "apex_barrier_hit"));
}

#[test]
fn parse_endpoint_defaults_filename() {
    let response = route_request("POST", "/api/parse", b"Reward Name\tCount\nLatinum\t1\n", LIMIT);
    assert_eq!(response.status_code, 200);
    let payload: serde_json::Value =
        serde_json::from_str(&response.body).expect("response should be valid json");
    assert_eq!(payload["summary"]["filename"], "upload.tsv");
}

#[test]
fn empty_body_parses_to_empty_tables() {
    let response = route_request("POST", "/api/parse", b"", LIMIT);
    assert_eq!(response.status_code, 200);
    let payload: serde_json::Value =
        serde_json::from_str(&response.body).expect("response should be valid json");
    assert_eq!(payload["summary"]["combat_rows"], 0);
}

#[test]
fn binary_body_is_bad_request() {
    let response = route_request("POST", "/api/parse", &[0x00, 0xFF, 0x00, 0x10], LIMIT);
    assert_eq!(response.status_code, 400);
    assert!(response.body.contains("\"status\": \"error\""));
}

#[test]
fn oversized_body_is_rejected() {
    let response = route_request("POST", "/api/parse", &fixture_bytes(), 16);
    assert_eq!(response.status_code, 413);
}

#[test]
fn unknown_route_is_not_found() {
    let response = route_request("GET", "/api/officers", b"", LIMIT);
    assert_eq!(response.status_code, 404);
    let response = route_request("GET", "/api/parse", b"", LIMIT);
    assert_eq!(response.status_code, 404);
}
