//! Domain error types for gauth.
//!
//! Uses thiserror for ergonomic error handling with automatic Display implementations.

use actix_web::{HttpResponse, ResponseError};
use std::fmt;

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Invalid input data (empty username, forced-false superuser flags, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Argument of the wrong kind (e.g. a non-string backend reference)
    #[error("Type error: {0}")]
    TypeMismatch(String),

    /// Backend selection or registry misconfiguration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operation the identity cannot perform (anonymous identities are never persisted)
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// The caller must re-authorize (revoked or unusable OAuth session)
    #[error("Authentication required: {0}")]
    AuthRequired(String),

    /// Authentication failed or caller lacks rights
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// OAuth provider unreachable or returned a server error
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        use actix_web::http::StatusCode;

        let (status, error_code, response_message) = match self {
            AppError::Database(err_str) => {
                tracing::error!("Database error: {}", err_str);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            AppError::InvalidInput(_) => {
                (StatusCode::BAD_REQUEST, "INVALID_INPUT", self.to_string())
            }
            AppError::TypeMismatch(_) => {
                (StatusCode::BAD_REQUEST, "TYPE_ERROR", self.to_string())
            }
            AppError::Configuration(err_str) => {
                tracing::error!("Configuration error: {}", err_str);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIGURATION_ERROR",
                    self.to_string(),
                )
            }
            AppError::NotSupported(_) => (
                StatusCode::NOT_IMPLEMENTED,
                "NOT_SUPPORTED",
                self.to_string(),
            ),
            AppError::AuthRequired(_) => {
                (StatusCode::UNAUTHORIZED, "AUTH_REQUIRED", self.to_string())
            }
            AppError::Unauthorized(_) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string())
            }
            AppError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", self.to_string()),
        };

        HttpResponse::build(status).json(ErrorResponse {
            error: error_code.to_string(),
            message: response_message,
        })
    }
}

/// Error response body.
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

// Conversion implementations for common error types

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        AppError::Database(err.to_string())
    }
}
