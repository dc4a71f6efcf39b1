//! Cheap request screening ahead of the handlers.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::CONTENT_LENGTH, header::USER_AGENT, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// Allowance for multipart boundaries and part headers on top of the file itself.
pub const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

const TRAVERSAL_MARKERS: [&str; 5] = ["/..", "\\..", "/./", "\\.\\", "\0"];
// Compared against the lowercased path
const ENCODED_TRAVERSAL_MARKERS: [&str; 8] =
    ["%2e%2e", "%252e%252e", "%2e/", "%252e%2f", "/%2e", "%2f%2e", "%5c%2e", "%00"];
const HOSTILE_AGENTS: [&str; 4] = ["scanner", "nikto", "sqlmap", "acunetix"];

/// Rejects traversal paths with `400 INVALID_PATH` and uploads whose declared
/// `Content-Length` is over the limit with `413`. Known attack tools are logged.
pub async fn validate_request_middleware(
    State(cfg): State<Arc<AppConfig>>,
    req: Request,
    next: Next,
) -> Response {
    if contains_path_traversal(req.uri().path()) {
        return AppError::InvalidPath.into_response();
    }

    if let Some(ua) = req.headers().get(USER_AGENT).and_then(|v| v.to_str().ok()) {
        if is_suspicious_user_agent(ua) {
            tracing::warn!(path = %req.uri().path(), "Suspicious user agent: {}", sanitize_for_logging(ua));
        }
    }

    if matches!(*req.method(), Method::POST | Method::PUT) {
        let declared = req
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let max_body = cfg.uploads.max_file_size.saturating_add(MULTIPART_OVERHEAD);
        if declared.is_some_and(|len| len > max_body) {
            return AppError::PayloadTooLarge { limit: cfg.uploads.max_file_size }.into_response();
        }
    }

    next.run(req).await
}

fn contains_path_traversal(path: &str) -> bool {
    if path.starts_with("..") || TRAVERSAL_MARKERS.iter().any(|m| path.contains(m)) {
        return true;
    }
    let lower = path.to_ascii_lowercase();
    ENCODED_TRAVERSAL_MARKERS.iter().any(|m| lower.contains(m))
}

fn is_suspicious_user_agent(ua: &str) -> bool {
    let ua = ua.to_ascii_lowercase();
    let unnamed_crawler = ua.contains("crawler") && !ua.contains("googlebot") && !ua.contains("bingbot");
    unnamed_crawler || HOSTILE_AGENTS.iter().any(|a| ua.contains(a))
}

/// Checks that a path segment is an md5 hash and returns it lowercased.
pub fn validate_md5(raw: &str) -> AppResult<String> {
    let md5 = raw.trim();
    if md5.len() != 32 || !md5.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AppError::ValidationError {
            field: "md5".to_string(),
            message: format!("Expected 32 hexadecimal characters, got {:?}", sanitize_for_logging(raw)),
        });
    }
    Ok(md5.to_ascii_lowercase())
}

/// Strips control characters and caps length so user input is safe to log.
pub fn sanitize_for_logging(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || *c == ' ')
        .take(200)
        .collect::<String>()
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
}
