//! HTTP error response conversion
//!
//! This module provides HTTP-specific error response conversion for AppError.
//!
//! Handlers return `Result<Response, HttpAppError>`; storage and resolver
//! failures convert into `HttpAppError` with `?` and render consistently.
//! Backend failures use their own body shape `{error, code, message}` where
//! `error` is the failure kind and `code` the backend-defined number.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use storegate_core::{AppError, ErrorMetadata, LogLevel};
use storegate_storage::{FilesystemError, ResolveError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
}

/// Body of a failed storage operation.
#[derive(Debug, Serialize)]
pub struct BackendErrorResponse {
    pub error: String,
    pub code: i64,
    pub message: String,
}

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from storegate-core)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

impl From<FilesystemError> for HttpAppError {
    fn from(err: FilesystemError) -> Self {
        HttpAppError(AppError::Backend {
            kind: err.kind().as_str().to_string(),
            code: err.code(),
            message: err.message(),
        })
    }
}

impl From<ResolveError> for HttpAppError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotConfigured(tenant) => {
                HttpAppError(AppError::StorageNotConfigured(tenant))
            }
            ResolveError::Locator(err) => {
                HttpAppError(AppError::StorageNotConfigured(err.to_string()))
            }
            ResolveError::Backend(err) => err.into(),
        }
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

static EXPOSE_ERROR_DETAILS: AtomicBool = AtomicBool::new(false);

/// Set once at startup from `Config::expose_error_details`.
pub(crate) fn set_expose_error_details(expose: bool) {
    EXPOSE_ERROR_DETAILS.store(expose, Ordering::Relaxed);
}

fn expose_error_details() -> bool {
    EXPOSE_ERROR_DETAILS.load(Ordering::Relaxed)
}

fn error_body(app_error: &AppError, expose_details: bool) -> ErrorResponse {
    let (details, error_type) = if expose_details {
        (
            Some(app_error.detailed_message()),
            Some(app_error.error_type().to_string()),
        )
    } else {
        (None, None)
    };
    ErrorResponse {
        error: app_error.client_message(),
        details,
        error_type,
        code: app_error.error_code().to_string(),
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        if let AppError::Backend {
            kind,
            code,
            message,
        } = app_error
        {
            let body = BackendErrorResponse {
                error: kind.clone(),
                code: *code,
                message: message.clone(),
            };
            return (status, Json(body)).into_response();
        }

        let body = Json(error_body(app_error, expose_error_details()));

        (status, body).into_response()
    }
}
