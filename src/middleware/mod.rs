//! Middleware components for HTTP request processing.
//!
//! Cross-cutting concerns layered onto the router: the CORS origin allow-list,
//! security headers, rate limiting, request validation and client identification.

pub mod cors;
pub mod ip;
pub mod rate_limit;
pub mod security_headers;
pub mod validation;

pub use cors::CorsPolicy;
pub use rate_limit::EndpointRateLimiter;
