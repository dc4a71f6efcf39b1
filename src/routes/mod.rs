//! HTTP route handlers and the application router.
//!
//! - `health`: liveness, readiness, metrics and version endpoints
//! - `skins`: catalog lookup, pagination, upload and moderation reporting

pub mod health;
pub mod skins;

use std::any::Any;

use axum::{
    extract::{DefaultBodyLimit, OriginalUri},
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{catch_panic::CatchPanicLayer, compression::CompressionLayer, trace::TraceLayer};

use crate::{
    error::AppError,
    middleware::{
        cors::{origin_guard_middleware, CorsPolicy},
        rate_limit::rate_limit_middleware,
        security_headers::security_headers_middleware,
        validation::{validate_request_middleware, MULTIPART_OVERHEAD},
    },
    state::AppState,
};

const PANIC_MESSAGE: &str = "Oops. Something went wrong. We're working on it.";

/// JSON body indented with two spaces, the format the museum frontend has always received.
pub struct PrettyJson<T>(pub T);

impl<T: Serialize> IntoResponse for PrettyJson<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec_pretty(&self.0) {
            Ok(bytes) => {
                ([(CONTENT_TYPE, HeaderValue::from_static("application/json"))], bytes).into_response()
            }
            Err(e) => AppError::Internal(anyhow::anyhow!("failed to serialize response: {}", e)).into_response(),
        }
    }
}

async fn not_found(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("Handler panicked: {}", detail);
    (StatusCode::INTERNAL_SERVER_ERROR, PANIC_MESSAGE).into_response()
}

/// Builds the full application: routes, state and middleware stack.
pub fn router(state: AppState) -> anyhow::Result<Router> {
    let cfg = state.config.clone();
    let cors = CorsPolicy::from_patterns(&cfg.cors.allowed_origins)
        .map_err(|e| anyhow::anyhow!("invalid CORS allow-list: {}", e))?;
    let body_limit = usize::try_from(cfg.uploads.max_file_size.saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);

    let app = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version))
        .route("/skins", get(skins::list_skins).post(skins::upload_skin))
        .route("/skins/", get(skins::list_skins).post(skins::upload_skin))
        .route("/skins/missing", post(skins::missing_skins))
        .route("/skins/{md5}", get(skins::get_skin))
        .route("/skins/{md5}/index", post(skins::index_skin))
        .route("/skins/{md5}/report", post(skins::report_skin))
        .route("/skins/{md5}/screenshot.png", get(skins::screenshot))
        .route("/skins/{md5}/download", get(skins::download))
        .fallback(not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn_with_state(cfg.clone(), validate_request_middleware))
        .layer(from_fn(rate_limit_middleware))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(cfg, security_headers_middleware))
        .layer(cors.layer())
        .layer(from_fn_with_state(cors, origin_guard_middleware))
        .layer(CatchPanicLayer::custom(handle_panic));

    Ok(app)
}
