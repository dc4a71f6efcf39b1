//! Security headers for every response.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA},
        HeaderMap, HeaderName, HeaderValue,
    },
    middleware::Next,
    response::Response,
};

use crate::config::{AppConfig, SecurityConfig};

const DEFAULT_HSTS_MAX_AGE: u64 = 31_536_000;

// The API is never framed; the museum frontend reads screenshots and JSON
// from another origin.
const STATIC_HEADERS: [(&str, &str); 6] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "no-referrer"),
    ("permissions-policy", "geolocation=(), microphone=(), camera=()"),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "cross-origin"),
];

fn hsts_value(sec: &SecurityConfig) -> Option<HeaderValue> {
    if !sec.enable_hsts.unwrap_or(false) {
        return None;
    }
    let mut value = format!("max-age={}", sec.hsts_max_age.unwrap_or(DEFAULT_HSTS_MAX_AGE));
    if sec.hsts_include_subdomains.unwrap_or(false) {
        value.push_str("; includeSubDomains");
    }
    HeaderValue::from_str(&value).ok()
}

fn apply_configured(headers: &mut HeaderMap, sec: &SecurityConfig) {
    if let Some(hsts) = hsts_value(sec) {
        headers.insert(HeaderName::from_static("strict-transport-security"), hsts);
    }
    let csp = sec.csp.as_deref().map(str::trim).filter(|c| !c.is_empty());
    if let Some(val) = csp.and_then(|c| HeaderValue::from_str(c).ok()) {
        headers.insert(HeaderName::from_static("content-security-policy"), val);
    }
}

/// Adds the fixed security headers, plus HSTS and CSP when the `[security]`
/// section asks for them.
///
/// JSON responses are marked `no-store`: museum pages are cached on the server
/// and intermediaries must not keep them past the server's own expiry.
pub async fn security_headers_middleware(
    State(cfg): State<Arc<AppConfig>>,
    req: Request,
    next: Next,
) -> Response {
    let mut res = next.run(req).await;
    let headers = res.headers_mut();

    for (name, value) in STATIC_HEADERS {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    if let Some(sec) = cfg.security.as_ref() {
        apply_configured(headers, sec);
    }

    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .is_some_and(|s| s.starts_with("application/json"));
    if is_json {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    }

    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hsts_only_when_enabled() {
        assert!(hsts_value(&SecurityConfig::default()).is_none());

        let sec = SecurityConfig {
            enable_hsts: Some(true),
            hsts_max_age: Some(60),
            hsts_include_subdomains: Some(true),
            csp: None,
        };
        assert_eq!(hsts_value(&sec).unwrap(), "max-age=60; includeSubDomains");
    }

    #[test]
    fn test_blank_csp_is_skipped() {
        let mut headers = HeaderMap::new();
        let sec = SecurityConfig { csp: Some("   ".to_string()), ..Default::default() };
        apply_configured(&mut headers, &sec);
        assert!(headers.is_empty());

        let sec = SecurityConfig { csp: Some("default-src 'none'".to_string()), ..Default::default() };
        apply_configured(&mut headers, &sec);
        assert_eq!(headers["content-security-policy"], "default-src 'none'");
    }
}
