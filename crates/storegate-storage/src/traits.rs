//! Filesystem capability trait
//!
//! Every backend (local disk, in-memory, WebDAV) and the visibility overlay
//! implement [`FilesystemAdapter`]. Locations reaching an adapter are already
//! normalized by [`crate::Filesystem`]: relative, `/`-separated, no `.`/`..`
//! segments and no leading or trailing slash. The empty string is the root.

use crate::attributes::StorageAttributes;
use crate::error::{FailureKind, FilesystemError, FilesystemResult};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::io;
use std::pin::Pin;
use storegate_core::Visibility;

/// A stream of content chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send>>;

/// A stream of listing entries
pub type ListingStream = Pin<Box<dyn Stream<Item = FilesystemResult<StorageAttributes>> + Send>>;

/// Per-call options for mutating operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationConfig {
    /// Visibility of written or moved files
    pub visibility: Option<Visibility>,
    /// Visibility of created or moved directories; falls back to `visibility`
    pub directory_visibility: Option<Visibility>,
}

impl OperationConfig {
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn with_directory_visibility(mut self, visibility: Visibility) -> Self {
        self.directory_visibility = Some(visibility);
        self
    }

    /// Visibility for files, private when unset.
    pub fn file_visibility(&self) -> Visibility {
        self.visibility.unwrap_or(Visibility::Private)
    }

    /// Visibility for directories, falling back to the file visibility.
    pub fn dir_visibility(&self) -> Visibility {
        self.directory_visibility
            .or(self.visibility)
            .unwrap_or(Visibility::Private)
    }
}

/// Filesystem abstraction trait
///
/// Backends without a native notion of visibility keep the default
/// `set_visibility`/`visibility` implementations, which fail.
#[async_trait]
pub trait FilesystemAdapter: Send + Sync {
    async fn file_exists(&self, path: &str) -> FilesystemResult<bool>;

    async fn directory_exists(&self, path: &str) -> FilesystemResult<bool>;

    /// Write a whole buffer, replacing any existing file.
    async fn write(
        &self,
        path: &str,
        contents: Bytes,
        config: &OperationConfig,
    ) -> FilesystemResult<()> {
        let stream: ByteStream = Box::pin(futures::stream::once(async move { Ok(contents) }));
        self.write_stream(path, stream, config).await
    }

    /// Write from a stream, replacing any existing file.
    async fn write_stream(
        &self,
        path: &str,
        contents: ByteStream,
        config: &OperationConfig,
    ) -> FilesystemResult<()>;

    /// Read a whole file into memory.
    async fn read(&self, path: &str) -> FilesystemResult<Bytes> {
        let mut stream = self.read_stream(path).await?;
        let mut buffer = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| FilesystemError::from_io(FailureKind::UnableToReadFile, path, e))?;
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer.freeze())
    }

    async fn read_stream(&self, path: &str) -> FilesystemResult<ByteStream>;

    /// Delete a file. Deleting a missing file is not an error.
    async fn delete(&self, path: &str) -> FilesystemResult<()>;

    async fn delete_directory(&self, path: &str) -> FilesystemResult<()>;

    async fn create_directory(&self, path: &str, config: &OperationConfig)
        -> FilesystemResult<()>;

    async fn set_visibility(&self, path: &str, _visibility: Visibility) -> FilesystemResult<()> {
        Err(FilesystemError::new(
            FailureKind::UnableToSetVisibility,
            path,
            "backend does not support visibility",
        ))
    }

    async fn visibility(&self, path: &str) -> FilesystemResult<Visibility> {
        Err(FilesystemError::new(
            FailureKind::UnableToRetrieveMetadata,
            path,
            "backend does not support visibility",
        ))
    }

    async fn mime_type(&self, path: &str) -> FilesystemResult<String>;

    /// Last modification time as a Unix timestamp in seconds.
    async fn last_modified(&self, path: &str) -> FilesystemResult<i64>;

    async fn file_size(&self, path: &str) -> FilesystemResult<u64>;

    /// List entries below `path`; recurse into subdirectories when `deep`.
    async fn list_contents(&self, path: &str, deep: bool) -> FilesystemResult<ListingStream>;

    async fn move_file(
        &self,
        source: &str,
        destination: &str,
        config: &OperationConfig,
    ) -> FilesystemResult<()>;

    async fn copy(
        &self,
        source: &str,
        destination: &str,
        config: &OperationConfig,
    ) -> FilesystemResult<()>;
}
