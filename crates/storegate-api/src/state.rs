//! Application state shared by every request.

use std::sync::Arc;
use storegate_core::TenantDirectory;
use storegate_db::Database;
use storegate_storage::StorageResolver;

#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub tenants: Arc<TenantDirectory>,
    pub resolver: Arc<StorageResolver>,
    /// Upper bound for a `write` body.
    pub max_upload_size_bytes: usize,
}
