//! Storage setup and initialization

use std::sync::Arc;
use storegate_core::Config;
use storegate_db::{Database, PrivatePathRepository};
use storegate_storage::StorageResolver;

/// Build the process-wide storage resolver.
///
/// Backends are constructed lazily on the first request for each tenant; an
/// unusable locator only fails requests of the tenant that carries it.
pub fn setup_storage(config: &Config, database: Database) -> Arc<StorageResolver> {
    let tenants = Arc::new(config.tenants().clone());
    for tenant in tenants.keys() {
        match tenants.storage_locator(tenant) {
            Some(locator) => tracing::info!(
                tenant = %tenant,
                locator = %storegate_storage::locator::redact(locator),
                "Tenant storage configured"
            ),
            None => tracing::warn!(tenant = %tenant, "Tenant has no storage locator"),
        }
    }

    Arc::new(StorageResolver::new(
        tenants,
        config.app_root(),
        PrivatePathRepository::new(database),
    ))
}
