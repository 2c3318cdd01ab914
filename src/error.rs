//! Error types for rssdld
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Database, Feed, remote Client failures, Config)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for rssdld operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for rssdld
///
/// This is the primary error type used throughout the library. Remote service
/// failures carry the name of the service so log lines and API bodies can tell
/// Transmission, Kodi and Trakt apart.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download_dir")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Episode (or other resource) not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A whole feed could not be fetched or parsed
    #[error("feed error: {0}")]
    Feed(String),

    /// A remote service answered with an error
    #[error("{service} error: {message}")]
    Client {
        /// Service name ("transmission", "kodi", "trakt")
        service: &'static str,
        /// What the service reported
        message: String,
    },

    /// A remote service call exceeded its time budget
    #[error("{service} did not answer in time")]
    Timeout {
        /// Service name
        service: &'static str,
    },

    /// Lifecycle state could not be parsed
    #[error("invalid episode state: {0}")]
    InvalidState(String),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a [`Error::Client`] failure
    pub fn client(service: &'static str, message: impl Into<String>) -> Self {
        Error::Client {
            service,
            message: message.into(),
        }
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "not_found",
///     "message": "not found: episode abc123"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::InvalidState(_) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,

            // 500 Internal Server Error - Server-side issues
            Error::Database(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Serialization(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - External service errors
            Error::Network(_) => 502,
            Error::Feed(_) => 502,
            Error::Client { .. } => 502,

            // 504 Gateway Timeout
            Error::Timeout { .. } => 504,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::NotFound(_) => "not_found",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Feed(_) => "feed_error",
            Error::Client { .. } => "service_error",
            Error::Timeout { .. } => "service_timeout",
            Error::InvalidState(_) => "invalid_state",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let mut api = ApiError::new(error.error_code(), error.to_string());
        api.error.details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({ "key": key })),
            Error::Client { service, .. } | Error::Timeout { service } => {
                Some(serde_json::json!({ "service": service }))
            }
            _ => None,
        };
        api
    }
}
