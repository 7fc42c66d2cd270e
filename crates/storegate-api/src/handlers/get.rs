//! Public read endpoint: `GET`/`HEAD /<path>`
//!
//! Serves a file only when it exists and is public. Directories and missing
//! files are 404, private files 403.

use crate::error::HttpAppError;
use crate::middleware::TenantStorage;
use axum::{
    body::Body,
    extract::Extension,
    http::{header, Method, StatusCode, Uri},
    response::Response,
};
use chrono::DateTime;
use storegate_core::AppError;

const CACHE_CONTROL: &str = "public, max-age=31536000";
const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

#[tracing::instrument(
    skip(storage, method, uri),
    fields(tenant = %storage.tenant, path = %uri.path())
)]
pub async fn serve_public_file(
    Extension(storage): Extension<TenantStorage>,
    method: Method,
    uri: Uri,
) -> Result<Response, HttpAppError> {
    let location = request_location(&uri);
    let fs = &storage.filesystem;

    if !fs.file_exists(&location).await? {
        return Err(AppError::NotFound(location).into());
    }
    if fs.visibility(&location).await?.is_private() {
        return Err(AppError::Forbidden(location).into());
    }

    let size = fs.file_size(&location).await?;
    let last_modified = http_date(fs.last_modified(&location).await?);
    let mime_type = match fs.mime_type(&location).await {
        Ok(mime_type) => mime_type,
        Err(e) => {
            tracing::debug!(error = %e, "Mime type unavailable, using fallback");
            FALLBACK_MIME_TYPE.to_string()
        }
    };

    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        Body::from_stream(fs.read_stream(&location).await?)
    };

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_type)
        .header(header::CACHE_CONTROL, CACHE_CONTROL)
        .header(header::CONTENT_LENGTH, size);
    if let Some(last_modified) = last_modified {
        response = response.header(header::LAST_MODIFIED, last_modified);
    }

    response.body(body).map_err(|e| {
        tracing::error!(error = %e, "Failed to build response");
        HttpAppError::from(AppError::Internal(e.to_string()))
    })
}

/// The storage location named by a request path, percent-decoded.
fn request_location(uri: &Uri) -> String {
    let path = uri.path();
    urlencoding::decode(path)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
fn http_date(timestamp: i64) -> Option<String> {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_date() {
        assert_eq!(
            http_date(784111777).as_deref(),
            Some("Sun, 06 Nov 1994 08:49:37 GMT")
        );
        assert_eq!(http_date(0).as_deref(), Some("Thu, 01 Jan 1970 00:00:00 GMT"));
    }

    #[test]
    fn test_request_location_is_decoded() {
        assert_eq!(
            request_location(&Uri::from_static("/docs/annual%20report.pdf")),
            "/docs/annual report.pdf"
        );
        assert_eq!(request_location(&Uri::from_static("/a.txt?x=1")), "/a.txt");
    }
}
