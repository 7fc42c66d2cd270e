//! Domain models shared between the storage layer and the HTTP gateway.

pub mod tenant;
pub mod visibility;

pub use tenant::{Tenant, TenantDirectory, TenantSettings};
pub use visibility::Visibility;
