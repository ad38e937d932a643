use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};

use tracing::{debug, info, warn};

use crate::config::AppConfig;

pub mod api;
pub mod routes;

const MAX_HEADER_BYTES: usize = 64 * 1024;

pub fn run_server(config: &AppConfig) -> io::Result<()> {
    let listener = TcpListener::bind(&config.bind_addr)?;
    info!(bind = %config.bind_addr, "battlelog server listening");

    for stream in listener.incoming() {
        match stream {
            Ok(mut stream) => {
                if let Err(err) = handle_connection(&mut stream, config.max_body_bytes) {
                    warn!(error = %err, "request error");
                }
            }
            Err(err) => warn!(error = %err, "connection failed"),
        }
    }

    Ok(())
}

struct RequestHead {
    method: String,
    path: String,
    content_length: usize,
}

fn parse_head(head: &str) -> RequestHead {
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut request_parts = request_line.split_whitespace();
    let method = request_parts.next().unwrap_or("GET").to_string();
    let path = request_parts.next().unwrap_or("/").to_string();
    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0);
    RequestHead {
        method,
        path,
        content_length,
    }
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|index| index + 4)
}

fn handle_connection(stream: &mut TcpStream, max_body_bytes: usize) -> io::Result<()> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 16_384];
    let header_end = loop {
        let bytes_read = stream.read(&mut chunk)?;
        if bytes_read == 0 {
            return Ok(());
        }
        buffer.extend_from_slice(&chunk[..bytes_read]);
        if let Some(end) = find_header_end(&buffer) {
            break end;
        }
        if buffer.len() > MAX_HEADER_BYTES {
            let response = routes::error_response(
                431,
                "Request Header Fields Too Large",
                "Request headers too large",
            );
            return write_response(stream, &response);
        }
    };

    let head = parse_head(&String::from_utf8_lossy(&buffer[..header_end]));
    debug!(method = %head.method, path = %head.path, content_length = head.content_length, "request");

    if head.content_length > max_body_bytes {
        return write_response(stream, &routes::payload_too_large(max_body_bytes));
    }

    let mut body = buffer.split_off(header_end);
    while body.len() < head.content_length {
        let bytes_read = stream.read(&mut chunk)?;
        if bytes_read == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..bytes_read]);
    }
    body.truncate(head.content_length);

    let response = routes::route_request(&head.method, &head.path, &body, max_body_bytes);
    write_response(stream, &response)
}

fn write_response(stream: &mut TcpStream, response: &routes::HttpResponse) -> io::Result<()> {
    stream.write_all(response.to_http_string().as_bytes())?;
    stream.flush()
}
