use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{service} returned status {status}: {message}")]
    ExternalApi {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by the run engine to decide whether an error
/// aborts the run or is recorded against the smallest enclosing scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Transient,
    Validation,
}

impl AppError {
    pub fn external(service: &'static str, status: u16, message: impl Into<String>) -> Self {
        AppError::ExternalApi {
            service,
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Configuration(_) => ErrorKind::Configuration,
            AppError::InvalidInput(_) => ErrorKind::Validation,
            _ => ErrorKind::Transient,
        }
    }

    /// Only configuration and validation errors abort a run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Configuration | ErrorKind::Validation
        )
    }

    /// Whether repeating the same call may succeed.
    ///
    /// Timeouts, connection failures and 5xx responses are retryable; client
    /// errors (4xx), missing resources and auth failures are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::HttpClient(e) => {
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                e.is_timeout() || e.is_connect() || e.is_request()
            }
            AppError::ExternalApi { status, .. } => (500..600).contains(status),
            AppError::Database(sqlx::Error::PoolTimedOut) | AppError::Database(sqlx::Error::Io(_)) => {
                true
            }
            AppError::Cache(e) => e.is_timeout() || e.is_connection_dropped(),
            _ => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::ExternalApi { .. } | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
            AppError::Configuration(_)
            | AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Cache(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
