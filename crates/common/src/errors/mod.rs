//! Error types for VaultDrop services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling
//!
//! Client errors carry a specific, human-readable reason. Server errors are
//! logged with full context but rendered to callers with a generic message so
//! storage paths and secrets never leave the process.

use crate::db::models::DocumentStatus;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    MissingField,
    InvalidFormat,
    PayloadTooLarge,
    EmptyUpload,
    UnsupportedMediaType,
    RejectedContent,

    // Authentication errors (2xxx)
    InvalidSignature,
    ExpiredSignature,

    // Resource errors (4xxx)
    NotFound,
    DocumentNotFound,
    ObjectNotFound,
    ArtifactUnavailable,

    // Conflict errors (5xxx)
    DuplicateDocument,
    StatusConflict,

    // Rate limiting (6xxx)
    RateLimited,
    RequestTimeout,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // External service errors (8xxx)
    StorageError,
    QueueError,
    QueueFull,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
    SigningError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::MissingField => 1002,
            ErrorCode::InvalidFormat => 1003,
            ErrorCode::PayloadTooLarge => 1004,
            ErrorCode::EmptyUpload => 1005,
            ErrorCode::UnsupportedMediaType => 1006,
            ErrorCode::RejectedContent => 1007,

            // Auth (2xxx)
            ErrorCode::InvalidSignature => 2001,
            ErrorCode::ExpiredSignature => 2002,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,
            ErrorCode::DocumentNotFound => 4002,
            ErrorCode::ObjectNotFound => 4003,
            ErrorCode::ArtifactUnavailable => 4004,

            // Conflicts (5xxx)
            ErrorCode::DuplicateDocument => 5001,
            ErrorCode::StatusConflict => 5002,

            // Rate limits (6xxx)
            ErrorCode::RateLimited => 6001,
            ErrorCode::RequestTimeout => 6002,

            // Database (7xxx)
            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,

            // External (8xxx)
            ErrorCode::StorageError => 8001,
            ErrorCode::QueueError => 8002,
            ErrorCode::QueueFull => 8003,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
            ErrorCode::SigningError => 9004,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("File exceeds limit ({limit} bytes)")]
    PayloadTooLarge { limit: u64 },

    #[error("Empty file")]
    EmptyUpload,

    #[error("Unsupported file type: {detected}")]
    UnsupportedMediaType { detected: String },

    #[error("File rejected: {reason}")]
    RejectedContent { reason: String },

    // Signed URL errors
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("URL expired")]
    ExpiredSignature,

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Document not found: {id}")]
    DocumentNotFound { id: String },

    #[error("Object not found: {key}")]
    ObjectNotFound { key: String },

    #[error("Processed artifact unavailable for document {id}")]
    ArtifactUnavailable { id: String },

    // Conflict errors
    #[error("Document id already exists: {id}")]
    DuplicateDocument { id: String },

    #[error("Document {id} is {current}, transition not applied")]
    StatusConflict { id: String, current: DocumentStatus },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    #[error("Request timed out")]
    RequestTimeout,

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // External service errors
    #[error("Storage error during {operation} of {key}: {message}")]
    Storage {
        operation: &'static str,
        key: String,
        message: String,
    },

    #[error("Queue error: {message}")]
    QueueError { message: String },

    #[error("Processing queue full")]
    QueueFull,

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Signing error: {message}")]
    Signing { message: String },

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Build a storage error with operation and key context
    pub fn storage(operation: &'static str, key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        AppError::Storage {
            operation,
            key: key.into(),
            message: err.to_string(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            AppError::EmptyUpload => ErrorCode::EmptyUpload,
            AppError::UnsupportedMediaType { .. } => ErrorCode::UnsupportedMediaType,
            AppError::RejectedContent { .. } => ErrorCode::RejectedContent,
            AppError::InvalidSignature => ErrorCode::InvalidSignature,
            AppError::ExpiredSignature => ErrorCode::ExpiredSignature,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::DocumentNotFound { .. } => ErrorCode::DocumentNotFound,
            AppError::ObjectNotFound { .. } => ErrorCode::ObjectNotFound,
            AppError::ArtifactUnavailable { .. } => ErrorCode::ArtifactUnavailable,
            AppError::DuplicateDocument { .. } => ErrorCode::DuplicateDocument,
            AppError::StatusConflict { .. } => ErrorCode::StatusConflict,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::RequestTimeout => ErrorCode::RequestTimeout,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::Storage { .. } => ErrorCode::StorageError,
            AppError::QueueError { .. } => ErrorCode::QueueError,
            AppError::QueueFull => ErrorCode::QueueFull,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Signing { .. } => ErrorCode::SigningError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request: every intake validation failure
            AppError::Validation { .. }
            | AppError::MissingField { .. }
            | AppError::InvalidFormat { .. }
            | AppError::PayloadTooLarge { .. }
            | AppError::EmptyUpload
            | AppError::UnsupportedMediaType { .. }
            | AppError::RejectedContent { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::InvalidSignature | AppError::ExpiredSignature => StatusCode::UNAUTHORIZED,

            // 404 Not Found
            AppError::NotFound { .. }
            | AppError::DocumentNotFound { .. }
            | AppError::ObjectNotFound { .. }
            | AppError::ArtifactUnavailable { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::StatusConflict { .. } => StatusCode::CONFLICT,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 408 Request Timeout
            AppError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,

            // 500 Internal Server Error
            AppError::DuplicateDocument { .. }
            | AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Storage { .. }
            | AppError::QueueError { .. }
            | AppError::QueueFull
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Signing { .. }
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Message safe to show to callers
    pub fn public_message(&self) -> String {
        match self.status_code() {
            StatusCode::INTERNAL_SERVER_ERROR => match self {
                AppError::Storage { .. } => "failed to store file".to_string(),
                AppError::Database(_) | AppError::DatabaseConnection { .. } | AppError::DuplicateDocument { .. } => {
                    "failed to store metadata".to_string()
                }
                AppError::QueueError { .. } | AppError::QueueFull => "failed to queue job".to_string(),
                AppError::Signing { .. } => "failed to generate url".to_string(),
                _ => "internal server error".to_string(),
            },
            _ => self.to_string(),
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message: self.public_message(),
                request_id: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::DocumentNotFound { id: "test".into() };
        assert_eq!(err.code(), ErrorCode::DocumentNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_upload_rejections_are_bad_requests() {
        let errors = [
            AppError::PayloadTooLarge { limit: 10 },
            AppError::EmptyUpload,
            AppError::UnsupportedMediaType { detected: "text/plain".into() },
            AppError::MissingField { field: "file".into() },
        ];
        for err in errors {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST, "{err}");
            assert!(err.is_client_error());
        }
    }

    #[test]
    fn test_server_error_message_is_generic() {
        let err = AppError::storage("put", "uploads/abc/secret.pdf", "connection reset");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());

        let public = err.public_message();
        assert_eq!(public, "failed to store file");
        assert!(!public.contains("uploads/"));
    }

    #[test]
    fn test_client_error_message_is_specific() {
        let err = AppError::PayloadTooLarge { limit: 1024 };
        assert_eq!(err.public_message(), "File exceeds limit (1024 bytes)");
    }

    #[test]
    fn test_numeric_codes_are_grouped() {
        assert_eq!(ErrorCode::PayloadTooLarge.as_code() / 1000, 1);
        assert_eq!(ErrorCode::StorageError.as_code() / 1000, 8);
    }

    #[test]
    fn test_timeout_is_client_facing() {
        let err = AppError::RequestTimeout;
        assert_eq!(err.status_code(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(err.code().as_code(), 6002);
        assert_eq!(err.public_message(), "Request timed out");
    }
}
