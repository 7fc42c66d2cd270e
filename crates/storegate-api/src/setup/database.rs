//! Database setup and initialization

use anyhow::{Context, Result};
use std::path::PathBuf;
use storegate_core::Config;
use storegate_db::Database;

/// Open the visibility database and apply migrations
pub async fn setup_database(config: &Config) -> Result<Database> {
    let parent = sqlite_file(config.database_url()).and_then(|p| p.parent().map(PathBuf::from));
    if let Some(parent) = parent.filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(&parent).await.with_context(|| {
            format!("Failed to create database directory {}", parent.display())
        })?;
    }

    tracing::info!("Connecting to database...");
    let database = Database::new(config.database_url(), config.db_ping_interval());

    database
        .migrate()
        .await
        .context("Failed to run database migrations")?;
    tracing::info!(
        ping_interval_secs = config.db_ping_interval().as_secs(),
        "Database migrations applied"
    );

    Ok(database)
}

/// File path of a `sqlite://` URL; `None` for in-memory databases.
fn sqlite_file(url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(PathBuf::from(path))
    }
}
