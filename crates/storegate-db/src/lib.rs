//! Storegate database layer
//!
//! A single, lazily established SQLite connection shared by the whole process,
//! re-validated on an interval and transparently re-established when the
//! liveness probe fails. On top of it sits the repository for the `private`
//! table that backs the visibility overlay.

pub mod connection;
pub mod error;
pub mod params;
pub mod private_path;
pub mod rows;
pub mod transaction;

pub use connection::Database;
pub use error::DatabaseError;
pub use params::Param;
pub use private_path::PrivatePathRepository;
pub use rows::RowStream;
pub use transaction::TransactionGuard;
