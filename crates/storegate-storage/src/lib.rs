//! Storegate Storage Library
//!
//! This crate provides the filesystem abstraction the gateway serves from and
//! its implementations: a local directory, any `object_store` backend (in-memory
//! or WebDAV), and the visibility overlay that wraps every resolved backend.
//!
//! # Locations
//!
//! Clients address files with `/`-separated locations. [`Filesystem`] normalizes
//! them before they reach an adapter; adapters only ever see relative paths
//! without `.` or `..` segments. Visibility records use the `/`-rooted form of
//! the same path (see [`normalizer::visibility_key`]).

pub mod attributes;
pub mod error;
pub mod filesystem;
pub mod local;
pub mod locator;
pub mod normalizer;
pub mod object;
pub mod overlay;
pub mod resolver;
pub mod traits;

// Re-export commonly used types
pub use attributes::{DirectoryAttributes, FileAttributes, StorageAttributes};
pub use error::{FailureKind, FilesystemError, FilesystemResult};
pub use filesystem::Filesystem;
pub use local::LocalAdapter;
pub use locator::{BackendKind, BackendLocator, LocatorError};
pub use object::ObjectStoreAdapter;
pub use overlay::VisibilityOverlay;
pub use resolver::{ResolveError, StorageResolver};
pub use traits::{ByteStream, FilesystemAdapter, ListingStream, OperationConfig};
