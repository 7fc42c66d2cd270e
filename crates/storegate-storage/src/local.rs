use crate::attributes::{DirectoryAttributes, FileAttributes, StorageAttributes};
use crate::error::{FailureKind, FilesystemError, FilesystemResult};
use crate::traits::{ByteStream, FilesystemAdapter, ListingStream, OperationConfig};
use async_trait::async_trait;
use futures::StreamExt;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::{Instant, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem adapter rooted at a directory
#[derive(Clone)]
pub struct LocalAdapter {
    root: PathBuf,
}

impl LocalAdapter {
    /// Create a new adapter, creating the root directory if needed
    ///
    /// # Arguments
    /// * `root` - Root directory for file storage (e.g., "/srv/storegate/files")
    pub async fn new(root: impl Into<PathBuf>) -> FilesystemResult<Self> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| {
            FilesystemError::from_io(
                FailureKind::UnableToCreateDirectory,
                root.display().to_string(),
                e,
            )
        })?;

        Ok(LocalAdapter { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a normalized location onto the root directory.
    ///
    /// Locations are expected to be normalized already; anything still carrying
    /// a parent segment or an absolute prefix is refused.
    fn location_to_path(&self, location: &str) -> FilesystemResult<PathBuf> {
        if location.split('/').any(|segment| segment == "..") || location.starts_with('/') {
            return Err(FilesystemError::new(
                FailureKind::PathTraversalDetected,
                location,
                "location resolves outside the storage root",
            ));
        }
        if location.is_empty() {
            return Ok(self.root.clone());
        }
        Ok(self.root.join(location))
    }

    async fn ensure_parent_dir(
        &self,
        path: &Path,
        location: &str,
        kind: FailureKind,
    ) -> FilesystemResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| FilesystemError::from_io(kind, location, e))?;
        }
        Ok(())
    }

    async fn file_metadata(&self, location: &str) -> FilesystemResult<Metadata> {
        let path = self.location_to_path(location)?;
        let meta = fs::metadata(&path).await.map_err(|e| {
            FilesystemError::from_io(FailureKind::UnableToRetrieveMetadata, location, e)
        })?;
        if !meta.is_file() {
            return Err(FilesystemError::new(
                FailureKind::UnableToRetrieveMetadata,
                location,
                "location is not a file",
            ));
        }
        Ok(meta)
    }

    fn relative_location(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}

async fn copy_stream(
    mut file: fs::File,
    contents: &mut ByteStream,
    location: &str,
) -> FilesystemResult<u64> {
    let mut size: u64 = 0;
    while let Some(chunk) = contents.next().await {
        let chunk = chunk
            .map_err(|e| FilesystemError::from_io(FailureKind::UnableToWriteFile, location, e))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| FilesystemError::from_io(FailureKind::UnableToWriteFile, location, e))?;
        size += chunk.len() as u64;
    }
    file.sync_all()
        .await
        .map_err(|e| FilesystemError::from_io(FailureKind::UnableToWriteFile, location, e))?;
    Ok(size)
}

fn modified_timestamp(meta: &Metadata) -> Option<i64> {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
}

#[async_trait]
impl FilesystemAdapter for LocalAdapter {
    async fn file_exists(&self, location: &str) -> FilesystemResult<bool> {
        let path = self.location_to_path(location)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FilesystemError::from_io(
                FailureKind::UnableToCheckExistence,
                location,
                e,
            )),
        }
    }

    async fn directory_exists(&self, location: &str) -> FilesystemResult<bool> {
        let path = self.location_to_path(location)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FilesystemError::from_io(
                FailureKind::UnableToCheckExistence,
                location,
                e,
            )),
        }
    }

    async fn write_stream(
        &self,
        location: &str,
        mut contents: ByteStream,
        _config: &OperationConfig,
    ) -> FilesystemResult<()> {
        let path = self.location_to_path(location)?;
        let start = Instant::now();

        self.ensure_parent_dir(&path, location, FailureKind::UnableToWriteFile)
            .await?;

        let file = fs::File::create(&path)
            .await
            .map_err(|e| FilesystemError::from_io(FailureKind::UnableToWriteFile, location, e))?;

        let size = match copy_stream(file, &mut contents, location).await {
            Ok(size) => size,
            Err(e) => {
                // Leave no truncated file behind.
                if let Err(remove_err) = fs::remove_file(&path).await {
                    tracing::warn!(
                        path = %path.display(),
                        error = %remove_err,
                        "Failed to remove partial file"
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(
            path = %path.display(),
            location = %location,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local write successful"
        );

        Ok(())
    }

    async fn read_stream(&self, location: &str) -> FilesystemResult<ByteStream> {
        let path = self.location_to_path(location)?;
        let start = Instant::now();

        let file = fs::File::open(&path)
            .await
            .map_err(|e| FilesystemError::from_io(FailureKind::UnableToReadFile, location, e))?;

        let reader = tokio_util::io::ReaderStream::new(file);

        let key = location.to_string();
        let path_display = path.display().to_string();
        let logged_stream = reader.map(move |item| {
            if let Err(e) = &item {
                tracing::error!(
                    error = %e,
                    path = %path_display,
                    location = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local stream read error"
                );
            }
            item
        });

        Ok(Box::pin(logged_stream))
    }

    async fn delete(&self, location: &str) -> FilesystemResult<()> {
        let path = self.location_to_path(location)?;
        let start = Instant::now();

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(FilesystemError::from_io(
                    FailureKind::UnableToDeleteFile,
                    location,
                    e,
                ))
            }
        }

        tracing::info!(
            path = %path.display(),
            location = %location,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local delete successful"
        );

        Ok(())
    }

    async fn delete_directory(&self, location: &str) -> FilesystemResult<()> {
        let path = self.location_to_path(location)?;
        if location.is_empty() {
            return Err(FilesystemError::new(
                FailureKind::UnableToDeleteDirectory,
                location,
                "refusing to delete the storage root",
            ));
        }

        match fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FilesystemError::from_io(
                FailureKind::UnableToDeleteDirectory,
                location,
                e,
            )),
        }
    }

    async fn create_directory(
        &self,
        location: &str,
        _config: &OperationConfig,
    ) -> FilesystemResult<()> {
        let path = self.location_to_path(location)?;
        fs::create_dir_all(&path).await.map_err(|e| {
            FilesystemError::from_io(FailureKind::UnableToCreateDirectory, location, e)
        })
    }

    async fn mime_type(&self, location: &str) -> FilesystemResult<String> {
        self.file_metadata(location).await?;
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
        let meta = self.file_metadata(location).await?;
        modified_timestamp(&meta).ok_or_else(|| {
            FilesystemError::new(
                FailureKind::UnableToRetrieveMetadata,
                location,
                "modification time unavailable",
            )
        })
    }

    async fn file_size(&self, location: &str) -> FilesystemResult<u64> {
        Ok(self.file_metadata(location).await?.len())
    }

    async fn list_contents(&self, location: &str, deep: bool) -> FilesystemResult<ListingStream> {
        let base = self.location_to_path(location)?;
        let mut entries = Vec::new();

        match fs::metadata(&base).await {
            Ok(meta) if meta.is_dir() => {}
            // Listing something that is not a directory yields nothing.
            Ok(_) => return Ok(Box::pin(futures::stream::empty())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Box::pin(futures::stream::empty()))
            }
            Err(e) => {
                return Err(FilesystemError::from_io(
                    FailureKind::UnableToListContents,
                    location,
                    e,
                ))
            }
        }

        let mut pending = vec![base];
        while let Some(dir) = pending.pop() {
            let mut reader = fs::read_dir(&dir).await.map_err(|e| {
                FilesystemError::from_io(FailureKind::UnableToListContents, location, e)
            })?;

            while let Some(entry) = reader.next_entry().await.map_err(|e| {
                FilesystemError::from_io(FailureKind::UnableToListContents, location, e)
            })? {
                let meta = entry.metadata().await.map_err(|e| {
                    FilesystemError::from_io(FailureKind::UnableToListContents, location, e)
                })?;
                let entry_location = self.relative_location(&entry.path());

                if meta.is_dir() {
                    let mut attributes = DirectoryAttributes::new(entry_location);
                    attributes.last_modified = modified_timestamp(&meta);
                    entries.push(StorageAttributes::Directory(attributes));
                    if deep {
                        pending.push(entry.path());
                    }
                } else {
                    let mut attributes = FileAttributes::new(entry_location);
                    attributes.file_size = Some(meta.len());
                    attributes.last_modified = modified_timestamp(&meta);
                    entries.push(StorageAttributes::File(attributes));
                }
            }
        }

        Ok(Box::pin(futures::stream::iter(entries.into_iter().map(Ok))))
    }

    async fn move_file(
        &self,
        source: &str,
        destination: &str,
        _config: &OperationConfig,
    ) -> FilesystemResult<()> {
        let from_path = self.location_to_path(source)?;
        let to_path = self.location_to_path(destination)?;

        self.ensure_parent_dir(&to_path, destination, FailureKind::UnableToMoveFile)
            .await?;

        fs::rename(&from_path, &to_path)
            .await
            .map_err(|e| FilesystemError::from_io(FailureKind::UnableToMoveFile, source, e))?;

        tracing::info!(
            source = %source,
            destination = %destination,
            "Local move successful"
        );

        Ok(())
    }

    async fn copy(
        &self,
        source: &str,
        destination: &str,
        _config: &OperationConfig,
    ) -> FilesystemResult<()> {
        let from_path = self.location_to_path(source)?;
        let to_path = self.location_to_path(destination)?;

        self.ensure_parent_dir(&to_path, destination, FailureKind::UnableToCopyFile)
            .await?;

        fs::copy(&from_path, &to_path)
            .await
            .map_err(|e| FilesystemError::from_io(FailureKind::UnableToCopyFile, source, e))?;

        tracing::info!(
            source = %source,
            destination = %destination,
            from_path = %from_path.display(),
            to_path = %to_path.display(),
            "Local copy successful"
        );

        Ok(())
    }
}
