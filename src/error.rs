//! Error types for the Auzolan backend
//!
//! This module provides error handling using thiserror for structured error
//! definitions and anyhow at the binary edge. Every variant knows which HTTP
//! status it maps onto, so handlers can simply propagate with `?`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Main error type for Auzolan operations
#[derive(Error, Debug)]
pub enum AuzolanError {
    /// SQLite operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool could not hand out or drive a connection
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// No (or an unusable) bearer token was supplied
    #[error("{0}")]
    Unauthorized(String),

    /// Token was syntactically valid but rejected
    #[error("{0}")]
    InvalidToken(String),

    /// Authenticated, but not allowed to do this
    #[error("{0}")]
    Forbidden(String),

    /// Entity lookup failed
    #[error("{0}")]
    NotFound(String),

    /// Request was understood but violates a business rule
    #[error("{0}")]
    BadRequest(String),

    /// A single payload field failed validation
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Auzolan operations
pub type Result<T> = std::result::Result<T, AuzolanError>;

impl AuzolanError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AuzolanError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        AuzolanError::NotFound("Not found.".to_string())
    }

    pub fn not_member() -> Self {
        AuzolanError::Forbidden("You are not a member of this community.".to_string())
    }

    pub fn not_moderator() -> Self {
        AuzolanError::Forbidden(
            "You do not have moderation permissions in this community.".to_string(),
        )
    }

    /// SQLite rejected a write on a UNIQUE, CHECK or foreign key constraint
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            AuzolanError::Database(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }

    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuzolanError::Unauthorized(_) | AuzolanError::InvalidToken(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuzolanError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuzolanError::NotFound(_) => StatusCode::NOT_FOUND,
            AuzolanError::BadRequest(_) | AuzolanError::Validation { .. } => {
                StatusCode::BAD_REQUEST
            }
            AuzolanError::Database(_)
            | AuzolanError::Pool(_)
            | AuzolanError::Config(_)
            | AuzolanError::Io(_)
            | AuzolanError::Serialization(_)
            | AuzolanError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert anyhow::Error to AuzolanError
impl From<anyhow::Error> for AuzolanError {
    fn from(err: anyhow::Error) -> Self {
        AuzolanError::Other(err.to_string())
    }
}

impl From<deadpool_sqlite::PoolError> for AuzolanError {
    fn from(err: deadpool_sqlite::PoolError) -> Self {
        AuzolanError::Pool(err.to_string())
    }
}

impl From<deadpool_sqlite::InteractError> for AuzolanError {
    fn from(err: deadpool_sqlite::InteractError) -> Self {
        AuzolanError::Pool(format!("Pool interaction failed: {}", err))
    }
}

impl IntoResponse for AuzolanError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match self {
            AuzolanError::Validation { field, message } => json!({ field: [message] }),
            AuzolanError::InvalidToken(detail) => json!({
                "detail": detail,
                "code": "token_not_valid",
            }),
            AuzolanError::Unauthorized(detail)
            | AuzolanError::Forbidden(detail)
            | AuzolanError::NotFound(detail)
            | AuzolanError::BadRequest(detail) => json!({ "detail": detail }),
            internal => {
                error!("Internal error while handling request: {}", internal);
                json!({ "detail": "Internal server error." })
            }
        };

        (status, Json(body)).into_response()
    }
}
