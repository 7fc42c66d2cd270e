//! HTTP Basic authentication against the tenant's configured users.

pub mod basic;
pub mod middleware;

pub use basic::{parse_basic_credentials, Credentials};
pub use middleware::{authenticate, require_principal, Principal};
