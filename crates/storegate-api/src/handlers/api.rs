//! Operation endpoint: `POST /?method=<operation>&location=<path>&...`
//!
//! The operation name selects one [`Operation`]; the remaining query
//! parameters are its arguments. Backend failures are rendered as
//! `{error, code, message}` with status 500 by [`HttpAppError`].

use crate::error::HttpAppError;
use crate::middleware::TenantStorage;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Extension, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures::StreamExt;
use serde_json::json;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use storegate_core::{AppError, Visibility};
use storegate_storage::{ByteStream, OperationConfig, StorageAttributes};

/// The closed set of operations the endpoint understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    FileExists,
    DirectoryExists,
    Write,
    Read,
    Delete,
    DeleteDirectory,
    CreateDirectory,
    SetVisibility,
    Visibility,
    MimeType,
    LastModified,
    FileSize,
    ListContents,
    Move,
    Copy,
}

impl Operation {
    pub fn parse(name: &str) -> Option<Self> {
        let operation = match name {
            "fileExists" => Operation::FileExists,
            "directoryExists" => Operation::DirectoryExists,
            "write" => Operation::Write,
            "read" => Operation::Read,
            "delete" => Operation::Delete,
            "deleteDirectory" => Operation::DeleteDirectory,
            "createDirectory" => Operation::CreateDirectory,
            "setVisibility" => Operation::SetVisibility,
            "visibility" => Operation::Visibility,
            "mimeType" => Operation::MimeType,
            "lastModified" => Operation::LastModified,
            "fileSize" => Operation::FileSize,
            "listContents" => Operation::ListContents,
            "move" => Operation::Move,
            "copy" => Operation::Copy,
            _ => return None,
        };
        Some(operation)
    }

    /// Name of the query parameter carrying the primary location.
    pub fn location_param(name: &str) -> &'static str {
        match name {
            "move" | "copy" => "source",
            _ => "location",
        }
    }
}

#[tracing::instrument(
    skip(state, storage, params, headers, body),
    fields(tenant = %storage.tenant, method = params.get("method").map(String::as_str).unwrap_or(""))
)]
pub async fn handle_operation(
    State(state): State<Arc<AppState>>,
    Extension(storage): Extension<TenantStorage>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, HttpAppError> {
    let name = params
        .get("method")
        .ok_or_else(|| AppError::InvalidOperation("Missing method parameter".to_string()))?;
    let location_param = Operation::location_param(name);
    let location = params.get(location_param).ok_or_else(|| {
        AppError::InvalidOperation(format!("Missing {} parameter", location_param))
    })?;
    let operation =
        Operation::parse(name).ok_or_else(|| AppError::UnknownOperation(name.clone()))?;

    let fs = &storage.filesystem;

    let response = match operation {
        Operation::FileExists => {
            Json(json!({ "fileExists": fs.file_exists(location).await? })).into_response()
        }
        Operation::DirectoryExists => {
            Json(json!({ "directoryExists": fs.directory_exists(location).await? }))
                .into_response()
        }
        Operation::Write => {
            let limit = state.max_upload_size_bytes;
            if declared_length(&headers).is_some_and(|length| length > limit as u64) {
                return Err(payload_too_large(limit).into());
            }

            let config = OperationConfig::default()
                .with_visibility(visibility_param(&params, "visibility"));
            let exceeded = Arc::new(AtomicBool::new(false));
            let contents = limited_body(body, limit, exceeded.clone());
            if let Err(e) = fs.write_stream(location, contents, &config).await {
                if exceeded.load(Ordering::Relaxed) {
                    tracing::warn!(location = %location, limit, "Upload exceeded size limit");
                    return Err(payload_too_large(limit).into());
                }
                return Err(e.into());
            }
            StatusCode::CREATED.into_response()
        }
        Operation::Read => {
            let stream = fs.read_stream(location).await?;
            (
                [(header::CONTENT_TYPE, "application/octet-stream")],
                Body::from_stream(stream),
            )
                .into_response()
        }
        Operation::Delete => {
            fs.delete(location).await?;
            StatusCode::NO_CONTENT.into_response()
        }
        Operation::DeleteDirectory => {
            fs.delete_directory(location).await?;
            StatusCode::NO_CONTENT.into_response()
        }
        Operation::CreateDirectory => {
            let config = OperationConfig::default()
                .with_directory_visibility(visibility_param(&params, "directory_visibility"));
            fs.create_directory(location, &config).await?;
            StatusCode::CREATED.into_response()
        }
        Operation::SetVisibility => {
            fs.set_visibility(location, visibility_param(&params, "visibility"))
                .await?;
            StatusCode::OK.into_response()
        }
        Operation::Visibility => {
            Json(json!({ "visibility": fs.visibility(location).await? })).into_response()
        }
        Operation::MimeType => {
            Json(json!({ "mimeType": fs.mime_type(location).await? })).into_response()
        }
        Operation::LastModified => {
            Json(json!({ "lastModified": fs.last_modified(location).await? })).into_response()
        }
        Operation::FileSize => {
            Json(json!({ "fileSize": fs.file_size(location).await? })).into_response()
        }
        Operation::ListContents => {
            let deep = params.get("deep").map(String::as_str) == Some("true");
            let listing = fs.list_contents(location, deep).await?;
            let rows = listing.map(|entry| match entry {
                Ok(entry) => Ok(Bytes::from(csv_row(&entry))),
                Err(e) => {
                    tracing::error!(error = %e, "Listing aborted");
                    Err(io::Error::other(e))
                }
            });
            (
                [(header::CONTENT_TYPE, "text/csv")],
                Body::from_stream(rows),
            )
                .into_response()
        }
        Operation::Move | Operation::Copy => {
            let destination = params.get("destination").ok_or_else(|| {
                AppError::InvalidOperation("Missing destination parameter".to_string())
            })?;
            let config = OperationConfig::default()
                .with_visibility(visibility_param(&params, "visibility"))
                .with_directory_visibility(visibility_param(&params, "directory_visibility"));
            if operation == Operation::Move {
                fs.move_file(location, destination, &config).await?;
            } else {
                fs.copy(location, destination, &config).await?;
            }
            StatusCode::OK.into_response()
        }
    };

    Ok(response)
}

fn visibility_param(params: &HashMap<String, String>, name: &str) -> Visibility {
    Visibility::coerce_or_private(params.get(name).map(String::as_str))
}

/// One CSV line: type, path, visibility, lastModified, fileSize, mimeType, extraMetadata.
fn csv_row(entry: &StorageAttributes) -> String {
    let (file_size, mime_type) = match entry {
        StorageAttributes::File(file) => (
            file.file_size.map(|s| s.to_string()),
            file.mime_type.clone(),
        ),
        StorageAttributes::Directory(_) => (None, None),
    };
    let extra = entry.extra_metadata();
    let extra = if extra.is_empty() {
        None
    } else {
        serde_json::to_string(extra).ok()
    };

    let fields = [
        Some(entry.type_name().to_string()),
        Some(entry.path().to_string()),
        entry.visibility().map(|v| v.as_str().to_string()),
        entry.last_modified().map(|t| t.to_string()),
        file_size,
        mime_type,
        extra,
    ];

    let mut line = fields
        .iter()
        .map(|field| csv_field(field.as_deref().unwrap_or_default()))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn payload_too_large(limit: usize) -> AppError {
    AppError::PayloadTooLarge(format!(
        "Upload exceeds maximum allowed size of {} MB",
        limit / 1024 / 1024
    ))
}

/// Request body as a [`ByteStream`] that fails once more than `limit` bytes
/// have arrived, setting `exceeded`.
fn limited_body(body: Body, limit: usize, exceeded: Arc<AtomicBool>) -> ByteStream {
    let mut received: usize = 0;
    Box::pin(body.into_data_stream().map(move |chunk| {
        let chunk = chunk.map_err(io::Error::other)?;
        received = received.saturating_add(chunk.len());
        if received > limit {
            exceeded.store(true, Ordering::Relaxed);
            return Err(io::Error::other("upload exceeds size limit"));
        }
        Ok(chunk)
    }))
}

fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
