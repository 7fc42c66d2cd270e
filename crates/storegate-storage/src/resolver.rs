//! Tenant storage resolution
//!
//! Handles are cached by locator string, not by tenant: two tenants configured
//! with byte-identical locators share one handle, and with it the overlay
//! created for whichever of them was resolved first. Visibility records of the
//! second tenant are therefore filed under the first tenant's project.

use crate::error::FilesystemError;
use crate::filesystem::Filesystem;
use crate::local::LocalAdapter;
use crate::locator::{redact, BackendKind, BackendLocator, LocatorError};
use crate::object::ObjectStoreAdapter;
use crate::overlay::VisibilityOverlay;
use crate::traits::FilesystemAdapter;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use storegate_core::TenantDirectory;
use storegate_db::PrivatePathRepository;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No storage configured for tenant {0}")]
    NotConfigured(String),

    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error(transparent)]
    Backend(#[from] FilesystemError),
}

/// Process-wide registry of backend handles
pub struct StorageResolver {
    tenants: Arc<TenantDirectory>,
    app_root: PathBuf,
    repository: PrivatePathRepository,
    handles: Mutex<HashMap<String, Arc<Filesystem>>>,
}

impl StorageResolver {
    pub fn new(
        tenants: Arc<TenantDirectory>,
        app_root: impl Into<PathBuf>,
        repository: PrivatePathRepository,
    ) -> Self {
        Self {
            tenants,
            app_root: app_root.into(),
            repository,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Return the handle for `tenant`, constructing it on first use.
    ///
    /// The cache lock is held across construction so that concurrent first
    /// resolutions of one locator build exactly one handle.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, tenant: &str) -> Result<Arc<Filesystem>, ResolveError> {
        let locator = self
            .tenants
            .storage_locator(tenant)
            .ok_or_else(|| ResolveError::NotConfigured(tenant.to_string()))?;

        let mut handles = self.handles.lock().await;
        if let Some(handle) = handles.get(locator) {
            return Ok(handle.clone());
        }

        let handle = Arc::new(self.build(locator, tenant).await?);
        handles.insert(locator.to_string(), handle.clone());

        tracing::info!(
            tenant = %tenant,
            locator = %redact(locator),
            "Storage backend constructed"
        );

        Ok(handle)
    }

    async fn build(&self, locator: &str, project: &str) -> Result<Filesystem, ResolveError> {
        let parsed = BackendLocator::parse(locator)?;

        let backend: Arc<dyn FilesystemAdapter> = match parsed.kind {
            BackendKind::File => {
                Arc::new(LocalAdapter::new(parsed.local_root(&self.app_root)).await?)
            }
            BackendKind::Memory => Arc::new(ObjectStoreAdapter::in_memory()),
            BackendKind::Webdav => Arc::new(ObjectStoreAdapter::webdav(
                &parsed.webdav_url()?,
                parsed.credentials(),
            )?),
        };

        let overlay = VisibilityOverlay::new(backend, self.repository.clone(), project);
        Ok(Filesystem::new(Arc::new(overlay)))
    }

    /// Number of constructed handles.
    pub async fn cached(&self) -> usize {
        self.handles.lock().await.len()
    }
}
