//! Configuration module
//!
//! This module provides the configuration for the gateway: listener settings,
//! the visibility database, and the static tenant directory.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::TenantDirectory;

// Common constants
const SERVER_PORT: u16 = 8080;
const DB_PING_INTERVAL_SECS: u64 = 10;
const MAX_UPLOAD_SIZE_MB: usize = 1024;

/// Listener and runtime settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub debug: bool,
}

/// Gateway configuration
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub base: BaseConfig,
    /// Application root; relative `file://` locators resolve against it.
    pub app_root: PathBuf,
    pub database_url: String,
    pub db_ping_interval_secs: u64,
    pub tenants_config_path: PathBuf,
    pub max_upload_size_bytes: usize,
    pub tenants: TenantDirectory,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<GatewayConfig>);

impl Config {
    fn as_gateway(&self) -> &GatewayConfig {
        &self.0
    }

    pub fn new(config: GatewayConfig) -> Self {
        Config(Box::new(config))
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.as_gateway().base.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    /// Error details are echoed to clients only in debug, non-production mode.
    pub fn expose_error_details(&self) -> bool {
        self.as_gateway().base.debug && !self.is_production()
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = GatewayConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_gateway().validate()
    }

    pub fn server_host(&self) -> &str {
        &self.as_gateway().base.server_host
    }

    pub fn server_port(&self) -> u16 {
        self.as_gateway().base.server_port
    }

    pub fn environment(&self) -> &str {
        &self.as_gateway().base.environment
    }

    pub fn app_root(&self) -> &Path {
        &self.as_gateway().app_root
    }

    pub fn database_url(&self) -> &str {
        &self.as_gateway().database_url
    }

    pub fn db_ping_interval(&self) -> Duration {
        Duration::from_secs(self.as_gateway().db_ping_interval_secs)
    }

    pub fn tenants_config_path(&self) -> &Path {
        &self.as_gateway().tenants_config_path
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.as_gateway().max_upload_size_bytes
    }

    pub fn tenants(&self) -> &TenantDirectory {
        &self.as_gateway().tenants
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let app_root = match env::var("APP_ROOT") {
            Ok(root) => PathBuf::from(root),
            Err(_) => env::current_dir()
                .map_err(|e| anyhow::anyhow!("Cannot determine working directory: {}", e))?,
        };

        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| {
            format!(
                "sqlite://{}?mode=rwc",
                app_root.join("var").join("visibility.sqlite").display()
            )
        });

        let tenants_config_path = env::var("TENANTS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| app_root.join("config").join("tenants.json"));
        let tenants = TenantDirectory::load(&tenants_config_path)?;

        let max_upload_size_mb = env::var("MAX_UPLOAD_SIZE_MB")
            .unwrap_or_else(|_| MAX_UPLOAD_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_UPLOAD_SIZE_MB);

        let base = BaseConfig {
            server_host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            debug: env::var("DEBUG").map(|v| is_truthy(&v)).unwrap_or(false),
        };

        Ok(GatewayConfig {
            base,
            app_root,
            database_url,
            db_ping_interval_secs: env::var("DB_PING_INTERVAL_SECS")
                .unwrap_or_else(|_| DB_PING_INTERVAL_SECS.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_PING_INTERVAL_SECS must be a valid number"))?,
            tenants_config_path,
            max_upload_size_bytes: max_upload_size_mb * 1024 * 1024,
            tenants,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.server_port == 0 {
            return Err(anyhow::anyhow!("PORT must be greater than 0"));
        }
        if self.db_ping_interval_secs == 0 {
            return Err(anyhow::anyhow!(
                "DB_PING_INTERVAL_SECS must be greater than 0"
            ));
        }
        if self.database_url.trim().is_empty() {
            return Err(anyhow::anyhow!("DATABASE_URL must not be empty"));
        }
        Ok(())
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
