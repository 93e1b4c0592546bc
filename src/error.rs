//! Error types for Inmo
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::auth::session::TokenError;

/// One rejected field of a request payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Application-wide error type
///
/// This enum represents all possible errors that can occur
/// in the application. It implements `IntoResponse` to
/// automatically convert errors to appropriate HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// No credential on a protected route (401)
    #[error("Unauthorized")]
    Unauthorized,

    /// No credential on an identity endpoint (401)
    #[error("No token provided")]
    MissingToken,

    /// Bad signature, malformed or expired token (401)
    #[error("Token is invalid or expired")]
    InvalidToken,

    /// Role check failed (403)
    #[error("Forbidden: Only admin users can access this resource")]
    Forbidden,

    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Payload failed schema validation (400)
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Request body could not be read at all (400)
    #[error("{0}")]
    BadRequest(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Identity provider error (500)
    #[error("Identity provider error: {0}")]
    Upstream(String),

    /// HTTP client error (500)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<TokenError> for AppError {
    fn from(_: TokenError) -> Self {
        AppError::InvalidToken
    }
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized | AppError::MissingToken | AppError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_)
            | AppError::Upstream(_)
            | AppError::HttpClient(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            AppError::Unauthorized | AppError::MissingToken => "authentication_missing",
            AppError::InvalidToken => "authentication_invalid",
            AppError::Forbidden => "authorization_denied",
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) | AppError::BadRequest(_) => "validation",
            AppError::Database(_) => "database",
            AppError::Upstream(_) | AppError::HttpClient(_) => "upstream",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Server-side failures are logged and answered with a generic
    /// message; their detail never reaches the caller.
    fn into_response(self) -> Response {
        use axum::Json;

        let status = self.status_code();

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[self.error_type()]).inc();

        let body = match &self {
            AppError::Forbidden => serde_json::json!({ "error": self.to_string() }),
            AppError::Validation(errors) => serde_json::json!({
                "message": self.to_string(),
                "errors": errors,
            }),
            _ if status.is_server_error() => {
                tracing::error!(error = %self, "Request failed");
                serde_json::json!({ "message": "Internal server error" })
            }
            _ => serde_json::json!({ "message": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
