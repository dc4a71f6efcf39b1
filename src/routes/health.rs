use std::time::Duration;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::state::AppState;

const READY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
pub struct Readiness {
    pub database: String,
    pub storage: String,
}

impl Readiness {
    fn is_ready(&self) -> bool {
        self.database == "ok" && self.storage == "ok"
    }
}

// Liveness: the process answers, nothing else is touched
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn check_database(state: &AppState) -> String {
    let db_check = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM skins").fetch_one(&state.db);
    match tokio::time::timeout(READY_TIMEOUT, db_check).await {
        Ok(Ok(_)) => "ok".to_string(),
        Ok(Err(e)) => format!("error: {}", e),
        Err(_) => "error: timeout".to_string(),
    }
}

// Uploads create the directory on demand, so a missing one is fine as long as it can be made
async fn check_storage(state: &AppState) -> String {
    match tokio::fs::create_dir_all(state.storage.root()).await {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error: {}", e),
    }
}

/// Readiness: the catalog can be queried and uploads have somewhere to go.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let report = Readiness { database: check_database(&state).await, storage: check_storage(&state).await };
    let status = if report.is_ready() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    if status != StatusCode::OK {
        tracing::warn!(?report, "Readiness check failed");
    }
    (status, Json(report))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.get_snapshot())
}

pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.metrics.get_snapshot().to_prometheus();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

pub async fn version(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "cache": {
            "maxEntries": state.config.cache.max_entries,
            "maxAgeSecs": state.config.cache.max_age_secs,
        },
        "maxUploadBytes": state.config.uploads.max_file_size,
        "discord": state.config.discord.enabled,
    }))
}
