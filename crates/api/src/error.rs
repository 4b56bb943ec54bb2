use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use querypilot_core::confirmation::GateError;
use querypilot_core::connection::{ConnectError, ConnectErrorCode};
use querypilot_core::error::CoreError;
use querypilot_llm::LlmError;
use querypilot_target::TargetError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Target database connection or administration failure.
    #[error(transparent)]
    Connection(#[from] ConnectError),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("SQL generation failed: {0}")]
    Llm(#[from] LlmError),

    /// The user has no active target connection.
    #[error("No database connection")]
    NotConnected,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<TargetError> for AppError {
    fn from(err: TargetError) -> Self {
        match err {
            TargetError::Connect(e) => Self::Connection(e),
            TargetError::Schema(msg) => Self::Connection(ConnectError::new(
                ConnectErrorCode::UnknownError,
                format!("Failed to read the database schema: {msg}"),
            )),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Core(CoreError::Validation(errors.to_string()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::RateLimited { retry_after_secs } => {
                    return rate_limited_response(*retry_after_secs);
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            AppError::Database(err) => classify_sqlx_error(err),

            AppError::Connection(err) => return connection_error_response(err),

            AppError::Gate(err) => match err {
                GateError::Busy { ticket } => {
                    let body = json!({
                        "error": "Confirm or cancel the pending statement before asking a new question",
                        "code": "PENDING_CONFIRMATION",
                        "ticket": ticket,
                    });
                    return (StatusCode::CONFLICT, axum::Json(body)).into_response();
                }
                GateError::NotFound(_) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    "No pending statement for this ticket".to_string(),
                ),
                GateError::ConnectionChanged(_) => (
                    StatusCode::CONFLICT,
                    "CONNECTION_CHANGED",
                    "The database connection changed; the pending statement was discarded"
                        .to_string(),
                ),
                GateError::SqlMismatch => (
                    StatusCode::BAD_REQUEST,
                    "BAD_REQUEST",
                    err.to_string(),
                ),
            },

            AppError::Llm(err) => {
                tracing::error!(error = %err, "SQL generation failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "LLM_ERROR",
                    "The SQL generator is unavailable. Please try again.".to_string(),
                )
            }

            AppError::NotConnected => (
                StatusCode::BAD_REQUEST,
                "NOT_CONNECTED",
                "No database connection. Please connect to a database first.".to_string(),
            ),

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `{success: false, code, error, message, suggestion}` with the taxonomy status.
fn connection_error_response(err: &ConnectError) -> Response {
    let status = StatusCode::from_u16(err.code.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::warn!(code = %err.code, message = %err.message, "Target connection error");
    }
    let body = json!({
        "success": false,
        "code": err.code,
        "error": err.code.title(),
        "message": err.message,
        "suggestion": err.suggestion,
    });
    (status, axum::Json(body)).into_response()
}

fn rate_limited_response(retry_after_secs: u64) -> Response {
    let body = json!({
        "error": "Too many requests. Please slow down and try again later.",
        "code": "RATE_LIMITED",
        "retry_after": retry_after_secs,
    });
    let mut response = (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
    response
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
