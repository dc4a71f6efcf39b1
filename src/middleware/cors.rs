//! Origin allow-list.
//!
//! Only the public frontends may call the API from a browser. A request that
//! carries an `Origin` outside the allow-list is refused outright; requests without
//! an `Origin` (curl, server-to-server) pass. Allowed origins get the usual CORS
//! response headers from [`CorsPolicy::layer`], which also answers preflights.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::ORIGIN, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use regex::RegexSet;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct CorsPolicy {
    patterns: Arc<RegexSet>,
}

impl CorsPolicy {
    /// Compiles the configured patterns. They are unanchored, so `netlify.app`
    /// admits every deploy preview.
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self { patterns: Arc::new(RegexSet::new(patterns)?) })
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.patterns.is_match(origin)
    }

    /// CORS response headers and preflight handling for allowed origins.
    pub fn layer(&self) -> CorsLayer {
        let policy = self.clone();
        CorsLayer::new()
            .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _parts| {
                origin.to_str().map(|o| policy.is_allowed(o)).unwrap_or(false)
            }))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    }
}

pub async fn origin_guard_middleware(
    State(policy): State<CorsPolicy>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(origin) = req.headers().get(ORIGIN) {
        let origin = String::from_utf8_lossy(origin.as_bytes()).into_owned();
        if !policy.is_allowed(&origin) {
            tracing::warn!(origin = %origin, "Rejected request from origin outside the allow-list");
            return AppError::Forbidden(format!("Request from origin \"{}\" not allowed by CORS.", origin))
                .into_response();
        }
    }
    next.run(req).await
}
