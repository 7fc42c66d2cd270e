pub mod api;
pub mod get;

pub use api::{handle_operation, Operation};
pub use get::serve_public_file;
