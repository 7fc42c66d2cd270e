//! Application setup and initialization
//!
//! This module contains all application initialization logic extracted from main.rs
//! for better organization and testability.

pub mod database;
pub mod routes;
pub mod server;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use storegate_core::Config;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Validate configuration first - fail fast on misconfiguration
    config
        .validate()
        .context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.environment());

    tracing::info!(
        tenants_file = %config.tenants_config_path().display(),
        tenants = config.tenants().len(),
        error_details = config.expose_error_details(),
        "Configuration loaded and validated successfully"
    );

    crate::error::set_expose_error_details(config.expose_error_details());

    let database = database::setup_database(&config).await?;
    let resolver = storage::setup_storage(&config, database.clone());

    let state = Arc::new(AppState {
        tenants: Arc::new(config.tenants().clone()),
        database,
        resolver,
        max_upload_size_bytes: config.max_upload_size_bytes(),
    });

    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}
