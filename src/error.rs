use axum::{
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::upload::UploadError;

/// The error type every handler returns.
///
/// Each variant maps to one HTTP status and one machine-readable code; the
/// response body is the JSON envelope built in [`IntoResponse`].
#[derive(Debug, Error)]
pub enum AppError {
    /// Unexpected failures. The cause is logged, never sent to the client.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    /// Refused by policy, such as an origin outside the CORS allow-list.
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// Upload above the configured size limit, in bytes.
    #[error("Payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Database error: {0}")]
    Database(String),
    /// Uploaded data that is not a usable skin archive.
    #[error("Invalid skin: {0}")]
    InvalidSkin(String),
    #[error("Rate limited. Retry after {retry_after_seconds} seconds")]
    RateLimited { retry_after_seconds: u64 },
    #[error("Validation error on field '{field}': {message}")]
    ValidationError { field: String, message: String },
    #[error("I/O error: {0}")]
    IoError(String),
    /// Storing an accepted upload failed. `code` names the failing layer.
    #[error("{message}")]
    UploadFailed { code: &'static str, message: String },
    #[error("Path traversal detected in request")]
    InvalidPath,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_)
            | AppError::InvalidSkin(_)
            | AppError::ValidationError { .. }
            | AppError::InvalidPath => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_)
            | AppError::Database(_)
            | AppError::IoError(_)
            | AppError::UploadFailed { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            AppError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::InvalidSkin(_) => "INVALID_SKIN",
            AppError::RateLimited { .. } => "RATE_LIMITED",
            AppError::ValidationError { .. } => "VALIDATION_ERROR",
            AppError::IoError(_) => "IO_ERROR",
            AppError::InvalidPath => "INVALID_PATH",
            AppError::UploadFailed { code, .. } => *code,
        }
    }

    /// Client-facing message and optional details. Server-side failures are
    /// logged here and replaced by a generic message.
    fn public_parts(self) -> (String, Option<Value>) {
        match self {
            AppError::Internal(e) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!(error_id = %error_id, "Internal error: {:?}", e);
                ("An internal server error occurred".to_string(), Some(json!({ "error_id": error_id.to_string() })))
            }
            AppError::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                ("A database error occurred".to_string(), Some(json!({ "details": msg })))
            }
            AppError::IoError(msg) => {
                tracing::error!("I/O error: {}", msg);
                ("An I/O error occurred".to_string(), Some(json!({ "details": msg })))
            }
            AppError::UploadFailed { message, .. } => {
                tracing::error!("{}", message);
                (message, None)
            }
            AppError::InvalidSkin(msg) => {
                tracing::warn!("Rejected skin upload: {}", msg);
                (msg, None)
            }
            AppError::PayloadTooLarge { limit } => {
                (format!("File exceeds maximum size of {} bytes", limit), Some(json!({ "limit_bytes": limit })))
            }
            AppError::RateLimited { retry_after_seconds } => (
                format!("Too many requests. Please retry after {} seconds", retry_after_seconds),
                Some(json!({ "retry_after_seconds": retry_after_seconds })),
            ),
            AppError::ValidationError { field, message } => (
                format!("Validation failed for field '{}'", field),
                Some(json!({ "field": field, "message": message })),
            ),
            AppError::InvalidPath => ("Path traversal detected in request".to_string(), None),
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Forbidden(msg)
            | AppError::ServiceUnavailable(msg) => (msg, None),
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
    status: u16,
    timestamp: String,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let retry_after = match &self {
            AppError::RateLimited { retry_after_seconds } => Some(*retry_after_seconds),
            _ => None,
        };
        let (message, details) = self.public_parts();
        let body = ErrorEnvelope {
            error: ErrorDetail { code, message, details },
            status: status.as_u16(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        let mut res = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            res.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        res
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => AppError::Database(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut => {
                AppError::ServiceUnavailable("Database connection pool timed out".to_string())
            }
            other => AppError::Database(other.to_string()),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(format!("{}: {}", err.kind(), err))
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::BadRequest(format!("Malformed multipart body: {}", err.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        let message = format!("Error adding skin: {}", err);
        match err {
            UploadError::NotAnArchive | UploadError::UnrecognizedSkin { .. } => AppError::InvalidSkin(message),
            UploadError::Storage(_) => AppError::UploadFailed { code: "IO_ERROR", message },
            UploadError::Database(_) => AppError::UploadFailed { code: "DATABASE_ERROR", message },
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Turns a missing row into a 404.
pub trait OptionExt<T> {
    fn ok_or_not_found(self, entity: &str) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, entity: &str) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(format!("{} not found", entity)))
    }
}
