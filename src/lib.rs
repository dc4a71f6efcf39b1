//! # Skin Database Backend Library
//!
//! This is the core library behind the Winamp skin museum API: a catalog of skin
//! archives identified by their MD5 hash, browsable page by page, with uploads from
//! the public and a moderation workflow announced in Discord.
//!
//! ## Architecture
//!
//! The application is built using:
//! - **Axum**: Modern web framework for HTTP server and routing
//! - **SQLx**: Asynchronous database operations with SQLite
//! - **Tokio**: Async runtime for concurrent operations
//! - **Serde**: Serialization/deserialization for JSON APIs
//! - **reqwest**: Outbound calls to the Discord REST API
//!
//! ## Core Components
//!
//! - [`cache`]: Bounded, time-limited cache for museum pages
//! - [`config`]: Application configuration management
//! - [`db`]: Database schema initialization
//! - [`error`]: Centralized error handling and HTTP error responses
//! - [`metrics`]: Application usage counters
//! - [`middleware`]: CORS allow-list, security headers, rate limiting and validation
//! - [`notify`]: Moderator notifications
//! - [`routes`]: HTTP API endpoint handlers and the router
//! - [`skins`]: Catalog queries
//! - [`state`]: Shared application state
//! - [`types`]: Data transfer objects and shared type definitions
//! - [`upload`]: Archive inspection, storage and registration of new skins
//!
//! ## Features
//!
//! - Museum pagination ordered by review status, with cached pages
//! - Skin details, screenshot and download redirects
//! - Bulk "which of these hashes are missing" checks
//! - Multipart uploads with deduplication by content hash
//! - Reporting skins for NSFW review
//! - Rate limiting and security headers
//! - Comprehensive error handling and logging

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod notify;
pub mod routes;
pub mod skins;
pub mod state;
pub mod types;
pub mod upload;

#[cfg(test)]
mod tests;
