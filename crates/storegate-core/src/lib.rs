//! Storegate Core Library
//!
//! This crate provides the configuration, error types and domain models that are
//! shared across all Storegate components.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{BaseConfig, Config, GatewayConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{Tenant, TenantDirectory, TenantSettings, Visibility};
