use crate::attributes::{DirectoryAttributes, FileAttributes, StorageAttributes};
use crate::error::{FailureKind, FilesystemError, FilesystemResult};
use crate::locator::LocatorError;
use crate::traits::{ByteStream, FilesystemAdapter, ListingStream, OperationConfig};
use async_trait::async_trait;
use base64::Engine;
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, TryStreamExt};
use http::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use object_store::http::HttpBuilder;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    ClientOptions, ObjectMeta, ObjectStore, ObjectStoreExt, PutPayload, Result as ObjectResult,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

/// Zero-byte object standing in for an otherwise empty directory.
const DIRECTORY_MARKER: &str = ".keep";

/// Adapter over any `object_store` backend
///
/// Directories do not exist as such in an object store: they are key prefixes.
/// `create_directory` writes a [`DIRECTORY_MARKER`] object so that an empty
/// directory survives, and listings hide those markers.
#[derive(Clone)]
pub struct ObjectStoreAdapter {
    store: Arc<dyn ObjectStore>,
    backend: &'static str,
}

impl ObjectStoreAdapter {
    pub fn new(store: Arc<dyn ObjectStore>, backend: &'static str) -> Self {
        Self { store, backend }
    }

    /// An ephemeral in-process store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "memory")
    }

    /// A remote WebDAV collection
    ///
    /// # Arguments
    /// * `base_url` - Collection URL, e.g. "https://dav.example.com/remote.php/files"
    /// * `credentials` - Optional basic-auth user name and password
    pub fn webdav(
        base_url: &str,
        credentials: Option<(&str, &str)>,
    ) -> Result<Self, LocatorError> {
        let mut options = ClientOptions::new().with_allow_http(base_url.starts_with("http://"));

        if let Some((user, password)) = credentials {
            let token = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", user, password));
            let mut value = HeaderValue::from_str(&format!("Basic {}", token)).map_err(|e| {
                LocatorError::InvalidEndpoint {
                    endpoint: base_url.to_string(),
                    reason: format!("invalid credentials: {}", e),
                }
            })?;
            value.set_sensitive(true);
            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, value);
            options = options.with_default_headers(headers);
        }

        let store = HttpBuilder::new()
            .with_url(base_url)
            .with_client_options(options)
            .build()
            .map_err(|e| LocatorError::InvalidEndpoint {
                endpoint: base_url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self::new(Arc::new(store), "webdav"))
    }

    fn object_path(location: &str) -> Path {
        Path::from(location)
    }

    fn prefix_path(location: &str) -> Option<Path> {
        if location.is_empty() {
            None
        } else {
            Some(Path::from(location))
        }
    }

    fn failure(
        &self,
        kind: FailureKind,
        location: &str,
        err: ObjectStoreError,
    ) -> FilesystemError {
        FilesystemError::new(kind, location, err.to_string()).with_source(err)
    }

    fn is_marker(path: &Path) -> bool {
        path.filename() == Some(DIRECTORY_MARKER)
    }

    /// Every object below `location`, markers included.
    async fn objects_under(
        &self,
        location: &str,
        kind: FailureKind,
    ) -> FilesystemResult<Vec<ObjectMeta>> {
        let prefix = Self::prefix_path(location);
        self.store
            .list(prefix.as_ref())
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| self.failure(kind, location, e))
    }

    fn file_entry(meta: &ObjectMeta) -> StorageAttributes {
        let location = meta.location.to_string();
        let mut attributes = FileAttributes::new(location.clone());
        attributes.file_size = Some(meta.size);
        attributes.last_modified = Some(meta.last_modified.timestamp());
        attributes.mime_type = mime_guess::from_path(&location)
            .first()
            .map(|m| m.essence_str().to_string());
        if let Some(etag) = &meta.e_tag {
            attributes
                .extra_metadata
                .insert("etag".to_string(), serde_json::Value::String(etag.clone()));
        }
        StorageAttributes::File(attributes)
    }

    async fn head(&self, location: &str) -> FilesystemResult<ObjectMeta> {
        let result: ObjectResult<_> = self.store.head(&Self::object_path(location)).await;
        result.map_err(|e| self.failure(FailureKind::UnableToRetrieveMetadata, location, e))
    }

    /// Copy one object or every object under a prefix.
    async fn copy_tree(
        &self,
        source: &str,
        destination: &str,
        kind: FailureKind,
    ) -> FilesystemResult<Vec<Path>> {
        if self.file_exists(source).await? {
            let from = Self::object_path(source);
            let to = Self::object_path(destination);
            let result: ObjectResult<_> = self.store.copy(&from, &to).await;
            result.map_err(|e| self.failure(kind, source, e))?;
            return Ok(vec![from]);
        }

        let objects = self.objects_under(source, kind).await?;
        if objects.is_empty() {
            return Err(FilesystemError::new(kind, source, "source does not exist"));
        }

        let source_prefix = format!("{}/", source);
        let mut copied = Vec::with_capacity(objects.len());
        for meta in objects {
            let key = meta.location.to_string();
            let relative = key.strip_prefix(&source_prefix).unwrap_or(&key);
            let to = Self::object_path(&format!("{}/{}", destination, relative));
            let result: ObjectResult<_> = self.store.copy(&meta.location, &to).await;
            result.map_err(|e| self.failure(kind, &key, e))?;
            copied.push(meta.location);
        }
        Ok(copied)
    }
}

#[async_trait]
impl FilesystemAdapter for ObjectStoreAdapter {
    async fn file_exists(&self, location: &str) -> FilesystemResult<bool> {
        if location.is_empty() {
            return Ok(false);
        }
        match self.store.head(&Self::object_path(location)).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(self.failure(FailureKind::UnableToCheckExistence, location, e)),
        }
    }

    async fn directory_exists(&self, location: &str) -> FilesystemResult<bool> {
        if location.is_empty() {
            return Ok(true);
        }
        let prefix = Self::object_path(location);
        let result: ObjectResult<_> = self.store.list_with_delimiter(Some(&prefix)).await;
        match result {
            Ok(listing) => Ok(!listing.objects.is_empty() || !listing.common_prefixes.is_empty()),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(self.failure(FailureKind::UnableToCheckExistence, location, e)),
        }
    }

    async fn write_stream(
        &self,
        location: &str,
        mut contents: ByteStream,
        _config: &OperationConfig,
    ) -> FilesystemResult<()> {
        let start = Instant::now();

        // object_store takes a complete payload; buffer the body before the put.
        let mut buffer = BytesMut::new();
        while let Some(chunk) = contents.next().await {
            let chunk = chunk.map_err(|e| {
                FilesystemError::from_io(FailureKind::UnableToWriteFile, location, e)
            })?;
            buffer.extend_from_slice(&chunk);
        }

        let size = buffer.len() as u64;
        let result: ObjectResult<_> = self
            .store
            .put(&Self::object_path(location), PutPayload::from(buffer.freeze()))
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                backend = self.backend,
                location = %location,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Object store write failed"
            );
            self.failure(FailureKind::UnableToWriteFile, location, e)
        })?;

        tracing::info!(
            backend = self.backend,
            location = %location,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store write successful"
        );

        Ok(())
    }

    async fn read_stream(&self, location: &str) -> FilesystemResult<ByteStream> {
        let start = Instant::now();
        let result: ObjectResult<_> = self.store.get(&Self::object_path(location)).await;
        let result = result.map_err(|e| self.failure(FailureKind::UnableToReadFile, location, e))?;

        let backend = self.backend;
        let key = location.to_string();
        let stream = result.into_stream().map(move |res| match res {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    backend = backend,
                    location = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object store stream read error"
                );
                Err(std::io::Error::other(e))
            }
        });

        Ok(Box::pin(stream))
    }

    async fn delete(&self, location: &str) -> FilesystemResult<()> {
        let result: ObjectResult<_> = self.store.delete(&Self::object_path(location)).await;
        match result {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(self.failure(FailureKind::UnableToDeleteFile, location, e)),
        }
    }

    async fn delete_directory(&self, location: &str) -> FilesystemResult<()> {
        let objects = self
            .objects_under(location, FailureKind::UnableToDeleteDirectory)
            .await?;
        let count = objects.len();
        for meta in objects {
            let result: ObjectResult<_> = self.store.delete(&meta.location).await;
            match result {
                Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
                Err(e) => {
                    return Err(self.failure(FailureKind::UnableToDeleteDirectory, location, e))
                }
            }
        }

        tracing::info!(
            backend = self.backend,
            location = %location,
            objects = count,
            "Object store directory deleted"
        );
        Ok(())
    }

    async fn create_directory(
        &self,
        location: &str,
        _config: &OperationConfig,
    ) -> FilesystemResult<()> {
        if location.is_empty() {
            return Ok(());
        }
        let marker = Self::object_path(&format!("{}/{}", location, DIRECTORY_MARKER));
        let result: ObjectResult<_> = self
            .store
            .put(&marker, PutPayload::from(Bytes::new()))
            .await;
        result
            .map(drop)
            .map_err(|e| self.failure(FailureKind::UnableToCreateDirectory, location, e))
    }

    async fn mime_type(&self, location: &str) -> FilesystemResult<String> {
        self.head(location).await?;
        mime_guess::from_path(location)
            .first()
            .map(|mime| mime.essence_str().to_string())
            .ok_or_else(|| {
                FilesystemError::new(
                    FailureKind::UnableToRetrieveMetadata,
                    location,
                    "unable to detect mime type",
                )
            })
    }

    async fn last_modified(&self, location: &str) -> FilesystemResult<i64> {
        Ok(self.head(location).await?.last_modified.timestamp())
    }

    async fn file_size(&self, location: &str) -> FilesystemResult<u64> {
        Ok(self.head(location).await?.size)
    }

    async fn list_contents(&self, location: &str, deep: bool) -> FilesystemResult<ListingStream> {
        let mut entries = Vec::new();

        if deep {
            let objects = self
                .objects_under(location, FailureKind::UnableToListContents)
                .await?;
            // Intermediate prefixes become directory entries.
            let mut directories = BTreeSet::new();
            for meta in &objects {
                let key = meta.location.to_string();
                let relative = if location.is_empty() {
                    key.as_str()
                } else {
                    key.strip_prefix(location)
                        .map(|rest| rest.trim_start_matches('/'))
                        .unwrap_or(key.as_str())
                };
                let mut segments: Vec<&str> = relative.split('/').collect();
                segments.pop();
                let mut current = location.to_string();
                for segment in segments {
                    if !current.is_empty() {
                        current.push('/');
                    }
                    current.push_str(segment);
                    directories.insert(current.clone());
                }
            }
            entries.extend(
                directories
                    .into_iter()
                    .map(|d| StorageAttributes::Directory(DirectoryAttributes::new(d))),
            );
            entries.extend(
                objects
                    .iter()
                    .filter(|meta| !Self::is_marker(&meta.location))
                    .map(Self::file_entry),
            );
        } else {
            let prefix = Self::prefix_path(location);
            let result: ObjectResult<_> = self.store.list_with_delimiter(prefix.as_ref()).await;
            let listing = match result {
                Ok(listing) => listing,
                Err(ObjectStoreError::NotFound { .. }) => {
                    return Ok(Box::pin(futures::stream::empty()))
                }
                Err(e) => return Err(self.failure(FailureKind::UnableToListContents, location, e)),
            };
            entries.extend(listing.common_prefixes.iter().map(|p| {
                StorageAttributes::Directory(DirectoryAttributes::new(p.to_string()))
            }));
            entries.extend(
                listing
                    .objects
                    .iter()
                    .filter(|meta| !Self::is_marker(&meta.location))
                    .map(Self::file_entry),
            );
        }

        Ok(Box::pin(futures::stream::iter(entries.into_iter().map(Ok))))
    }

    async fn move_file(
        &self,
        source: &str,
        destination: &str,
        _config: &OperationConfig,
    ) -> FilesystemResult<()> {
        let start = Instant::now();
        let copied = self
            .copy_tree(source, destination, FailureKind::UnableToMoveFile)
            .await?;
        for path in &copied {
            let result: ObjectResult<_> = self.store.delete(path).await;
            match result {
                Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
                Err(e) => return Err(self.failure(FailureKind::UnableToMoveFile, source, e)),
            }
        }

        tracing::info!(
            backend = self.backend,
            source = %source,
            destination = %destination,
            objects = copied.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store move successful"
        );
        Ok(())
    }

    async fn copy(
        &self,
        source: &str,
        destination: &str,
        _config: &OperationConfig,
    ) -> FilesystemResult<()> {
        let start = Instant::now();
        let copied = self
            .copy_tree(source, destination, FailureKind::UnableToCopyFile)
            .await?;

        tracing::info!(
            backend = self.backend,
            source = %source,
            destination = %destination,
            objects = copied.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store copy successful"
        );
        Ok(())
    }
}
