//! Tenant resolution and storage attachment.
//!
//! The tenant of a request is the host it was sent to. [`attach_storage`]
//! resolves that host to its (cached) filesystem handle and stores it in the
//! request extensions for the handlers.

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, Uri},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use storegate_core::AppError;
use storegate_storage::Filesystem;

/// The resolved storage of the requesting tenant
#[derive(Clone)]
pub struct TenantStorage {
    pub tenant: String,
    pub filesystem: Arc<Filesystem>,
}

/// Tenant key of a request: the `Host` header without its port, falling back
/// to the authority of an absolute request URI.
pub fn tenant_key(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(strip_port)
        .or_else(|| uri.host().map(strip_port))?;

    let host = host.trim().to_lowercase();
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

fn strip_port(host: &str) -> &str {
    // [::1]:8080
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

pub async fn attach_storage(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, HttpAppError> {
    let tenant = tenant_key(request.headers(), request.uri()).ok_or_else(|| {
        AppError::StorageNotConfigured("request carries no host".to_string())
    })?;

    let filesystem = state.resolver.resolve(&tenant).await?;
    tracing::debug!(tenant = %tenant, "Storage attached");

    request
        .extensions_mut()
        .insert(TenantStorage { tenant, filesystem });
    Ok(next.run(request).await)
}
