//! Route configuration and setup

use crate::auth;
use crate::error::HttpAppError;
use crate::handlers;
use crate::middleware::attach_storage;
use crate::state::AppState;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{get, post, MethodRouter},
    Router,
};
use std::any::Any;
use std::sync::Arc;
use storegate_core::AppError;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
///
/// Every path is served by the same method table: GET/HEAD go to the public
/// read handler, POST to the operation endpoint behind authentication, and
/// anything else is 404.
pub fn setup_routes(state: Arc<AppState>) -> Router {
    let gateway = gateway_methods(state.clone());

    Router::new()
        .route("/", gateway.clone())
        .route("/{*path}", gateway)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn gateway_methods(state: Arc<AppState>) -> MethodRouter<Arc<AppState>> {
    // Layers wrap inside-out: for POST, authenticate runs first, then the
    // principal check, then storage resolution.
    let read = get(handlers::serve_public_file)
        .layer(from_fn_with_state(state.clone(), attach_storage));

    let write = post(handlers::handle_operation)
        .layer(from_fn_with_state(state.clone(), attach_storage))
        .layer(from_fn(auth::require_principal))
        .layer(from_fn_with_state(state, auth::authenticate));

    read.merge(write).fallback(not_routed)
}

async fn not_routed() -> HttpAppError {
    AppError::NotFound("no route for request method".to_string()).into()
}

/// Render a panic from a handler or middleware as a generic 500.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!(panic = %message, "Request handler panicked");
    HttpAppError::from(AppError::Internal(format!("handler panicked: {}", message)))
        .into_response()
}
