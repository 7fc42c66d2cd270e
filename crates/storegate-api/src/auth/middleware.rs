use crate::auth::basic::{parse_basic_credentials, Credentials};
use crate::error::HttpAppError;
use crate::middleware::tenant_key;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use storegate_core::AppError;

/// An authenticated user of the requesting tenant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub tenant: String,
    pub user: String,
}

/// Attach a [`Principal`] when the request carries valid Basic credentials.
///
/// Never rejects: missing, malformed or wrong credentials leave the request
/// anonymous.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let credentials = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(parse_basic_credentials);

    if let (Some(credentials), Some(tenant)) = (
        credentials,
        tenant_key(request.headers(), request.uri()),
    ) {
        if let Some(principal) = verify(&state, tenant, credentials).await {
            request.extensions_mut().insert(principal);
        }
    }

    next.run(request).await
}

async fn verify(state: &AppState, tenant: String, credentials: Credentials) -> Option<Principal> {
    let hash = match state.tenants.password_hash(&tenant, &credentials.user) {
        Some(hash) => hash.to_string(),
        None => {
            tracing::debug!(tenant = %tenant, user = %credentials.user, "Unknown user");
            return None;
        }
    };

    let password = credentials.password;
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await;

    match verified {
        Ok(Ok(true)) => {
            tracing::debug!(tenant = %tenant, user = %credentials.user, "Authenticated");
            Some(Principal {
                tenant,
                user: credentials.user,
            })
        }
        Ok(Ok(false)) => {
            tracing::info!(tenant = %tenant, user = %credentials.user, "Password mismatch");
            None
        }
        Ok(Err(e)) => {
            tracing::warn!(
                tenant = %tenant,
                user = %credentials.user,
                error = %e,
                "Unusable password hash"
            );
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "Password verification task failed");
            None
        }
    }
}

/// Reject anonymous requests with 403.
pub async fn require_principal(request: Request, next: Next) -> Result<Response, HttpAppError> {
    if request.extensions().get::<Principal>().is_none() {
        return Err(AppError::Forbidden("authentication required".to_string()).into());
    }
    Ok(next.run(request).await)
}
