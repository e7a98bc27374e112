//! Error types module
//!
//! This module provides the core error types used throughout the Thumbly
//! application. All errors are unified under the `AppError` enum which can
//! represent validation, authorization, storage, and job-tracking errors.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like degraded-mode fallbacks
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
/// This trait allows errors to self-describe their HTTP response characteristics
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "INVALID_VARIANT")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid document id: {0}")]
    InvalidDocumentId(String),

    #[error("Invalid variant: {0}")]
    InvalidVariant(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Thumbnail object missing: {0}")]
    ThumbnailMissing(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Missing source hash: {0}")]
    MissingSourceHash(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

// Conversions from lower-level error types
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON serialization error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidDocumentId(format!("UUID parsing error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
/// Reduces duplication in ErrorMetadata impl; client_message stays per-variant for dynamic content.
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::InvalidDocumentId(_) => (
            400,
            "INVALID_DOCUMENT_ID",
            false,
            Some("Check the document identifier format"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidVariant(_) => (
            400,
            "INVALID_VARIANT",
            false,
            Some("Request one of the supported thumbnail sizes"),
            false,
            LogLevel::Debug,
        ),
        AppError::DocumentNotFound(_) => (
            404,
            "DOCUMENT_NOT_FOUND",
            false,
            Some("Verify the document ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::ThumbnailMissing(_) => (
            404,
            "DOCUMENT_NOT_FOUND",
            true,
            Some("Request the thumbnail endpoint to trigger generation"),
            false,
            LogLevel::Debug,
        ),
        AppError::AccessDenied(_) => (
            403,
            "ACCESS_DENIED",
            false,
            Some("Verify you have read access to this document"),
            false,
            LogLevel::Warn,
        ),
        AppError::MissingSourceHash(_) => (
            400,
            "MISSING_SOURCE_HASH",
            false,
            Some("Re-upload or re-process the document to assign a source hash"),
            false,
            LogLevel::Warn,
        ),
        AppError::JobNotFound(_) => (
            404,
            "JOB_NOT_FOUND",
            false,
            Some("Verify the job ID returned by a previous request"),
            false,
            LogLevel::Debug,
        ),
        AppError::Storage(_) => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Config(_) => (
            500,
            "INTERNAL_ERROR",
            false,
            Some("Contact support if this error persists"),
            true,
            LogLevel::Error,
        ),
        AppError::Internal(_) => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::InvalidDocumentId(_) => "InvalidDocumentId",
            AppError::InvalidVariant(_) => "InvalidVariant",
            AppError::DocumentNotFound(_) => "DocumentNotFound",
            AppError::ThumbnailMissing(_) => "ThumbnailMissing",
            AppError::AccessDenied(_) => "AccessDenied",
            AppError::MissingSourceHash(_) => "MissingSourceHash",
            AppError::JobNotFound(_) => "JobNotFound",
            AppError::Storage(_) => "Storage",
            AppError::Config(_) => "Config",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::InvalidDocumentId(ref msg) => msg.clone(),
            AppError::InvalidVariant(ref msg) => msg.clone(),
            AppError::DocumentNotFound(ref msg) => msg.clone(),
            AppError::ThumbnailMissing(ref msg) => msg.clone(),
            AppError::AccessDenied(ref msg) => msg.clone(),
            AppError::MissingSourceHash(ref msg) => msg.clone(),
            AppError::JobNotFound(ref msg) => msg.clone(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Config(_) => "Internal server error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}
