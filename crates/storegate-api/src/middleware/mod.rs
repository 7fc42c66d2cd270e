pub mod tenant;

pub use tenant::{attach_storage, tenant_key, TenantStorage};
