//! Client-facing filesystem operator
//!
//! [`Filesystem`] is what the HTTP layer talks to. It normalizes every
//! location before handing it to the wrapped adapter and unwraps metadata
//! into plain values.

use crate::error::FilesystemResult;
use crate::normalizer::normalize;
use crate::traits::{ByteStream, FilesystemAdapter, ListingStream, OperationConfig};
use bytes::Bytes;
use std::sync::Arc;
use storegate_core::Visibility;

#[derive(Clone)]
pub struct Filesystem {
    adapter: Arc<dyn FilesystemAdapter>,
}

impl Filesystem {
    pub fn new(adapter: Arc<dyn FilesystemAdapter>) -> Self {
        Self { adapter }
    }

    pub async fn file_exists(&self, location: &str) -> FilesystemResult<bool> {
        self.adapter.file_exists(&normalize(location)?).await
    }

    pub async fn directory_exists(&self, location: &str) -> FilesystemResult<bool> {
        self.adapter.directory_exists(&normalize(location)?).await
    }

    pub async fn write(
        &self,
        location: &str,
        contents: Bytes,
        config: &OperationConfig,
    ) -> FilesystemResult<()> {
        self.adapter
            .write(&normalize(location)?, contents, config)
            .await
    }

    pub async fn write_stream(
        &self,
        location: &str,
        contents: ByteStream,
        config: &OperationConfig,
    ) -> FilesystemResult<()> {
        self.adapter
            .write_stream(&normalize(location)?, contents, config)
            .await
    }

    pub async fn read(&self, location: &str) -> FilesystemResult<Bytes> {
        self.adapter.read(&normalize(location)?).await
    }

    pub async fn read_stream(&self, location: &str) -> FilesystemResult<ByteStream> {
        self.adapter.read_stream(&normalize(location)?).await
    }

    pub async fn delete(&self, location: &str) -> FilesystemResult<()> {
        self.adapter.delete(&normalize(location)?).await
    }

    pub async fn delete_directory(&self, location: &str) -> FilesystemResult<()> {
        self.adapter.delete_directory(&normalize(location)?).await
    }

    pub async fn create_directory(
        &self,
        location: &str,
        config: &OperationConfig,
    ) -> FilesystemResult<()> {
        self.adapter
            .create_directory(&normalize(location)?, config)
            .await
    }

    pub async fn set_visibility(
        &self,
        location: &str,
        visibility: Visibility,
    ) -> FilesystemResult<()> {
        self.adapter
            .set_visibility(&normalize(location)?, visibility)
            .await
    }

    pub async fn visibility(&self, location: &str) -> FilesystemResult<Visibility> {
        self.adapter.visibility(&normalize(location)?).await
    }

    pub async fn mime_type(&self, location: &str) -> FilesystemResult<String> {
        self.adapter.mime_type(&normalize(location)?).await
    }

    pub async fn last_modified(&self, location: &str) -> FilesystemResult<i64> {
        self.adapter.last_modified(&normalize(location)?).await
    }

    pub async fn file_size(&self, location: &str) -> FilesystemResult<u64> {
        self.adapter.file_size(&normalize(location)?).await
    }

    pub async fn list_contents(
        &self,
        location: &str,
        deep: bool,
    ) -> FilesystemResult<ListingStream> {
        self.adapter.list_contents(&normalize(location)?, deep).await
    }

    pub async fn move_file(
        &self,
        source: &str,
        destination: &str,
        config: &OperationConfig,
    ) -> FilesystemResult<()> {
        let source = normalize(source)?;
        let destination = normalize(destination)?;
        if source == destination {
            return Ok(());
        }
        self.adapter.move_file(&source, &destination, config).await
    }

    pub async fn copy(
        &self,
        source: &str,
        destination: &str,
        config: &OperationConfig,
    ) -> FilesystemResult<()> {
        let source = normalize(source)?;
        let destination = normalize(destination)?;
        if source == destination {
            return Ok(());
        }
        self.adapter.copy(&source, &destination, config).await
    }
}
