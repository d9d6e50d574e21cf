//! Error handling for VisaPilot
//!
//! This module defines the main error type used throughout the application,
//! its HTTP mapping, and a unified error handling strategy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::{error, warn};

/// Main error type for VisaPilot application
#[derive(Error, Debug)]
pub enum VisaPilotError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{message}")]
    Provider { service: &'static str, status: u16, message: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Result type alias for VisaPilot operations
pub type Result<T> = std::result::Result<T, VisaPilotError>;

impl VisaPilotError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        VisaPilotError::NotFound { resource, id: id.to_string() }
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            VisaPilotError::Database(_) => false,
            VisaPilotError::Migration(_) => false,
            VisaPilotError::Config(_) => false,
            VisaPilotError::PermissionDenied(_) => false,
            VisaPilotError::Authentication(_) => false,
            VisaPilotError::NotFound { .. } => false,
            VisaPilotError::Conflict(_) => false,
            VisaPilotError::Provider { status, .. } => *status >= 500,
            VisaPilotError::Http(_) => true,
            VisaPilotError::Serialization(_) => false,
            VisaPilotError::Io(_) => true,
            VisaPilotError::UrlParse(_) => false,
            VisaPilotError::RateLimitExceeded => true,
            VisaPilotError::InvalidInput(_) => false,
            VisaPilotError::ServiceUnavailable(_) => true,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            VisaPilotError::Database(_) => ErrorSeverity::Critical,
            VisaPilotError::Migration(_) => ErrorSeverity::Critical,
            VisaPilotError::Config(_) => ErrorSeverity::Critical,
            VisaPilotError::PermissionDenied(_) => ErrorSeverity::Warning,
            VisaPilotError::Authentication(_) => ErrorSeverity::Warning,
            VisaPilotError::RateLimitExceeded => ErrorSeverity::Warning,
            VisaPilotError::Conflict(_) => ErrorSeverity::Info,
            VisaPilotError::NotFound { .. } => ErrorSeverity::Info,
            VisaPilotError::InvalidInput(_) => ErrorSeverity::Info,
            VisaPilotError::Provider { status, .. } if *status < 500 => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }

    /// HTTP status the error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            VisaPilotError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            VisaPilotError::Provider { status, .. } if *status < 500 => StatusCode::BAD_REQUEST,
            VisaPilotError::Authentication(_) => StatusCode::UNAUTHORIZED,
            VisaPilotError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            VisaPilotError::NotFound { .. } => StatusCode::NOT_FOUND,
            VisaPilotError::Conflict(_) => StatusCode::CONFLICT,
            VisaPilotError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            VisaPilotError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the caller. Internal failures are not echoed back.
    pub fn public_message(&self) -> String {
        match self {
            VisaPilotError::Database(_)
            | VisaPilotError::Migration(_)
            | VisaPilotError::Config(_)
            | VisaPilotError::Http(_)
            | VisaPilotError::Serialization(_)
            | VisaPilotError::Io(_)
            | VisaPilotError::UrlParse(_) => "Internal server error".to_string(),
            VisaPilotError::Provider { message, .. } => message.clone(),
            VisaPilotError::PermissionDenied(message)
            | VisaPilotError::Authentication(message)
            | VisaPilotError::Conflict(message)
            | VisaPilotError::InvalidInput(message)
            | VisaPilotError::ServiceUnavailable(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for VisaPilotError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self.severity() {
            ErrorSeverity::Critical | ErrorSeverity::Error => {
                error!(error = %self, severity = %self.severity(), status = status.as_u16(), "Request failed");
            }
            ErrorSeverity::Warning => {
                warn!(error = %self, status = status.as_u16(), "Request rejected");
            }
            ErrorSeverity::Info => {}
        }

        let body = serde_json::json!({ "error": self.public_message() });
        (status, Json(body)).into_response()
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(VisaPilotError::InvalidInput("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(VisaPilotError::Authentication("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(VisaPilotError::PermissionDenied("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(VisaPilotError::not_found("Case", "abc").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(VisaPilotError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(VisaPilotError::RateLimitExceeded.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(VisaPilotError::Config("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_provider_message_is_verbatim() {
        let err = VisaPilotError::Provider {
            service: "identity",
            status: 422,
            message: "Token has expired or is invalid".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Token has expired or is invalid");

        let outage = VisaPilotError::Provider { service: "payments", status: 503, message: "down".into() };
        assert_eq!(outage.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(outage.is_recoverable());
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let err = VisaPilotError::Config("secret database url".to_string());
        assert_eq!(err.public_message(), "Internal server error");
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }
}
