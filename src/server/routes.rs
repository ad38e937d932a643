use crate::error::IngestError;
use crate::server::api;

pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: &'static str,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    pub fn to_http_string(&self) -> String {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.status_code,
            self.status_text,
            self.content_type,
            self.body.len(),
            self.body
        )
    }
}

pub fn route_request(method: &str, path: &str, body: &[u8], max_body_bytes: usize) -> HttpResponse {
    let route = path.split('?').next().unwrap_or(path);
    match (method, route) {
        ("GET", "/api/health") => match api::health_payload() {
            Ok(payload) => json_ok(payload),
            Err(err) => error_response(500, "Internal Server Error", &err.to_string()),
        },
        ("POST", "/api/parse") => {
            if body.len() > max_body_bytes {
                return payload_too_large(max_body_bytes);
            }
            let filename =
                api::upload_filename(path).unwrap_or_else(|| api::DEFAULT_UPLOAD_NAME.to_string());
            match api::parse_payload(body, &filename) {
                Ok(payload) => json_ok(payload),
                Err(err @ IngestError::Undecodable { .. }) => {
                    error_response(400, "Bad Request", &err.to_string())
                }
                Err(err) => error_response(500, "Internal Server Error", &err.to_string()),
            }
        }
        _ => error_response(404, "Not Found", "Route not found"),
    }
}

pub fn payload_too_large(max_body_bytes: usize) -> HttpResponse {
    error_response(
        413,
        "Payload Too Large",
        &format!("Request body exceeds {max_body_bytes} bytes"),
    )
}

fn json_ok(body: String) -> HttpResponse {
    HttpResponse {
        status_code: 200,
        status_text: "OK",
        content_type: "application/json",
        body,
    }
}

pub fn error_response(status_code: u16, status_text: &'static str, message: &str) -> HttpResponse {
    HttpResponse {
        status_code,
        status_text,
        content_type: "application/json",
        body: format!(
            "{{\n  \"status\": \"error\",\n  \"message\": {}\n}}",
            serde_json::to_string(message).unwrap_or_else(|_| "\"Unknown error\"".to_string())
        ),
    }
}
