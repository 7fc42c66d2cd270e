//! Storegate API Library
//!
//! This crate provides the HTTP gateway: tenant resolution, authentication,
//! the operation endpoint, the public read endpoint and application setup.

mod handlers;
mod middleware;
mod telemetry;

pub mod auth;
pub mod error;
pub mod setup;
pub mod state;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use handlers::Operation;
