//! Error types module
//!
//! This module provides the core error taxonomy of the gateway. Every failure that
//! reaches the HTTP layer is expressed as an `AppError`, and each variant describes
//! its own response through [`ErrorMetadata`].

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like missing objects
    Debug,
    /// Warning level - for client mistakes worth noticing
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "STORAGE_NOT_CONFIGURED")
    fn error_code(&self) -> &'static str;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Storage not configured for tenant: {0}")]
    StorageNotConfigured(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// A failure raised by a storage backend, already classified by kind.
    #[error("{kind}: {message}")]
    Backend {
        kind: String,
        code: i64,
        message: String,
    },

    #[error("Database error: {0}")]
    Database(String),

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

/// Static metadata for each variant: (http_status, error_code, sensitive, log_level).
fn app_error_static_metadata(err: &AppError) -> (u16, &'static str, bool, LogLevel) {
    match err {
        AppError::NotFound(_) => (404, "NOT_FOUND", false, LogLevel::Debug),
        AppError::Forbidden(_) => (403, "FORBIDDEN", false, LogLevel::Debug),
        AppError::StorageNotConfigured(_) => {
            (500, "STORAGE_NOT_CONFIGURED", false, LogLevel::Error)
        }
        AppError::InvalidOperation(_) => (400, "INVALID_OPERATION", false, LogLevel::Debug),
        AppError::UnknownOperation(_) => (404, "UNKNOWN_OPERATION", false, LogLevel::Debug),
        AppError::PayloadTooLarge(_) => (413, "PAYLOAD_TOO_LARGE", false, LogLevel::Warn),
        AppError::Backend { .. } => (500, "BACKEND_ERROR", false, LogLevel::Warn),
        AppError::Database(_) => (500, "DATABASE_ERROR", true, LogLevel::Error),
        AppError::Config(_) => (500, "CONFIGURATION_ERROR", true, LogLevel::Error),
        AppError::Internal(_) => (500, "INTERNAL_ERROR", true, LogLevel::Error),
        AppError::InternalWithSource { .. } => (500, "INTERNAL_ERROR", true, LogLevel::Error),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::NotFound(_) => "NotFound",
            AppError::Forbidden(_) => "Forbidden",
            AppError::StorageNotConfigured(_) => "StorageNotConfigured",
            AppError::InvalidOperation(_) => "InvalidOperation",
            AppError::UnknownOperation(_) => "UnknownOperation",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::Backend { kind, .. } => kind.as_str(),
            AppError::Database(_) => "Database",
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

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            AppError::NotFound(_) => "Not Found".to_string(),
            AppError::Forbidden(_) => "Forbidden".to_string(),
            AppError::StorageNotConfigured(_) => "Storage is not configured".to_string(),
            AppError::InvalidOperation(ref msg) => msg.clone(),
            AppError::UnknownOperation(ref msg) => format!("Unknown operation: {}", msg),
            AppError::PayloadTooLarge(ref msg) => msg.clone(),
            AppError::Backend { ref message, .. } => message.clone(),
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Config(_) => "Internal server error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}
