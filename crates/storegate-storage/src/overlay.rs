//! Visibility overlay
//!
//! Wraps another [`FilesystemAdapter`] and keeps a public/private flag per path
//! in the `private` table, independent of what the wrapped backend supports.
//! Reads and structural calls are forwarded unchanged; writes, directory
//! creation, moves and copies record the requested visibility once the backend
//! call has succeeded.
//!
//! The backend mutation and the visibility update are not atomic: if recording
//! the flag fails, the object has already been written and the caller sees an
//! `UnableToSetVisibility` failure for an operation that partially succeeded.

use crate::error::{FailureKind, FilesystemError, FilesystemResult};
use crate::normalizer::visibility_key;
use crate::traits::{ByteStream, FilesystemAdapter, ListingStream, OperationConfig};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use storegate_core::Visibility;
use storegate_db::{DatabaseError, PrivatePathRepository};

pub struct VisibilityOverlay {
    inner: Arc<dyn FilesystemAdapter>,
    repository: PrivatePathRepository,
    project: String,
}

impl VisibilityOverlay {
    pub fn new(
        inner: Arc<dyn FilesystemAdapter>,
        repository: PrivatePathRepository,
        project: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            repository,
            project: project.into(),
        }
    }

    /// The project every visibility record of this overlay is filed under.
    pub fn project(&self) -> &str {
        &self.project
    }

    fn visibility_failure(path: &str, err: DatabaseError) -> FilesystemError {
        FilesystemError::new(FailureKind::UnableToSetVisibility, path, err.to_string())
            .with_source(err)
    }

    async fn record_visibility(
        &self,
        key: &str,
        visibility: Visibility,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.repository.database().begin().await?;
        let result = match visibility {
            Visibility::Public => {
                self.repository
                    .mark_public(&mut tx, key, &self.project)
                    .await
            }
            Visibility::Private => {
                self.repository
                    .mark_private(&mut tx, key, &self.project)
                    .await
            }
        };

        if let Err(e) = result {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(
                    error = %rollback_err,
                    path = %key,
                    "Failed to roll back visibility update"
                );
            }
            return Err(e);
        }

        tx.commit().await
    }

    /// Visibility of the destination of a move or copy.
    async fn destination_visibility(
        &self,
        destination: &str,
        config: &OperationConfig,
    ) -> FilesystemResult<Visibility> {
        if self.inner.directory_exists(destination).await? {
            Ok(config.dir_visibility())
        } else {
            Ok(config.file_visibility())
        }
    }
}

#[async_trait]
impl FilesystemAdapter for VisibilityOverlay {
    async fn file_exists(&self, path: &str) -> FilesystemResult<bool> {
        self.inner.file_exists(path).await
    }

    async fn directory_exists(&self, path: &str) -> FilesystemResult<bool> {
        self.inner.directory_exists(path).await
    }

    async fn write(
        &self,
        path: &str,
        contents: Bytes,
        config: &OperationConfig,
    ) -> FilesystemResult<()> {
        self.inner.write(path, contents, config).await?;
        self.set_visibility(path, config.file_visibility()).await
    }

    async fn write_stream(
        &self,
        path: &str,
        contents: ByteStream,
        config: &OperationConfig,
    ) -> FilesystemResult<()> {
        self.inner.write_stream(path, contents, config).await?;
        self.set_visibility(path, config.file_visibility()).await
    }

    async fn read(&self, path: &str) -> FilesystemResult<Bytes> {
        self.inner.read(path).await
    }

    async fn read_stream(&self, path: &str) -> FilesystemResult<ByteStream> {
        self.inner.read_stream(path).await
    }

    async fn delete(&self, path: &str) -> FilesystemResult<()> {
        self.inner.delete(path).await
    }

    async fn delete_directory(&self, path: &str) -> FilesystemResult<()> {
        self.inner.delete_directory(path).await
    }

    async fn create_directory(&self, path: &str, config: &OperationConfig) -> FilesystemResult<()> {
        self.inner.create_directory(path, config).await?;
        self.set_visibility(path, config.dir_visibility()).await
    }

    #[tracing::instrument(skip(self), fields(project = %self.project))]
    async fn set_visibility(&self, path: &str, visibility: Visibility) -> FilesystemResult<()> {
        let key = visibility_key(path);
        self.record_visibility(&key, visibility).await.map_err(|e| {
            tracing::error!(error = %e, path = %key, "Visibility update failed");
            Self::visibility_failure(&key, e)
        })
    }

    async fn visibility(&self, path: &str) -> FilesystemResult<Visibility> {
        let key = visibility_key(path);
        let private = self
            .repository
            .is_private(&key, &self.project)
            .await
            .map_err(|e| {
                FilesystemError::new(FailureKind::UnableToRetrieveMetadata, &key, e.to_string())
                    .with_source(e)
            })?;
        Ok(if private {
            Visibility::Private
        } else {
            Visibility::Public
        })
    }

    async fn mime_type(&self, path: &str) -> FilesystemResult<String> {
        self.inner.mime_type(path).await
    }

    async fn last_modified(&self, path: &str) -> FilesystemResult<i64> {
        self.inner.last_modified(path).await
    }

    async fn file_size(&self, path: &str) -> FilesystemResult<u64> {
        self.inner.file_size(path).await
    }

    /// Forward the listing, stamping each entry with its recorded visibility.
    async fn list_contents(&self, path: &str, deep: bool) -> FilesystemResult<ListingStream> {
        let listing_failure = |e: DatabaseError| {
            FilesystemError::new(FailureKind::UnableToListContents, path, e.to_string())
                .with_source(e)
        };

        // Drained before touching the backend so the connection is not held
        // across backend I/O.
        let private: HashSet<String> = self
            .repository
            .private_paths_under(&self.project, &visibility_key(path))
            .await
            .map_err(listing_failure)?
            .try_collect()
            .await
            .map_err(listing_failure)?;

        let entries = self.inner.list_contents(path, deep).await?;
        let stamped = entries.map(move |entry| {
            entry.map(|attributes| {
                let visibility = if private.contains(&visibility_key(attributes.path())) {
                    Visibility::Private
                } else {
                    Visibility::Public
                };
                attributes.with_visibility(visibility)
            })
        });

        Ok(Box::pin(stamped))
    }

    async fn move_file(
        &self,
        source: &str,
        destination: &str,
        config: &OperationConfig,
    ) -> FilesystemResult<()> {
        self.inner.move_file(source, destination, config).await?;
        let visibility = self.destination_visibility(destination, config).await?;
        // The vacated source must not keep hiding whatever is written there next.
        self.set_visibility(source, Visibility::Public).await?;
        self.set_visibility(destination, visibility).await
    }

    async fn copy(
        &self,
        source: &str,
        destination: &str,
        config: &OperationConfig,
    ) -> FilesystemResult<()> {
        self.inner.copy(source, destination, config).await?;
        let visibility = self.destination_visibility(destination, config).await?;
        self.set_visibility(destination, visibility).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::StorageAttributes;
    use crate::object::ObjectStoreAdapter;
    use std::time::Duration;
    use storegate_db::Database;

    async fn overlay(project: &str) -> (tempfile::TempDir, VisibilityOverlay) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("visibility.sqlite").display()
        );
        let db = Database::new(url, Duration::from_secs(10));
        db.migrate().await.unwrap();
        let overlay = VisibilityOverlay::new(
            Arc::new(ObjectStoreAdapter::in_memory()),
            PrivatePathRepository::new(db),
            project,
        );
        (dir, overlay)
    }

    fn public() -> OperationConfig {
        OperationConfig::default().with_visibility(Visibility::Public)
    }

    #[tokio::test]
    async fn test_set_visibility_roundtrip_and_idempotent() {
        let (_dir, fs) = overlay("p1").await;

        for _ in 0..2 {
            fs.set_visibility("a/b.txt", Visibility::Private).await.unwrap();
            assert_eq!(fs.visibility("a/b.txt").await.unwrap(), Visibility::Private);
        }
        for _ in 0..2 {
            fs.set_visibility("a/b.txt", Visibility::Public).await.unwrap();
            assert_eq!(fs.visibility("a/b.txt").await.unwrap(), Visibility::Public);
        }
    }

    #[tokio::test]
    async fn test_unmarked_path_is_public() {
        let (_dir, fs) = overlay("p1").await;
        assert_eq!(fs.visibility("never/seen").await.unwrap(), Visibility::Public);
    }

    #[tokio::test]
    async fn test_keys_are_normalized() {
        let (_dir, fs) = overlay("p1").await;
        fs.set_visibility("/dir/", Visibility::Private).await.unwrap();
        assert_eq!(fs.visibility("dir").await.unwrap(), Visibility::Private);
        assert!(fs.repository.is_private("/dir", "p1").await.unwrap());
    }

    #[tokio::test]
    async fn test_write_defaults_to_private() {
        let (_dir, fs) = overlay("p1").await;
        fs.write("a.txt", Bytes::from_static(b"x"), &OperationConfig::default())
            .await
            .unwrap();
        assert_eq!(fs.visibility("a.txt").await.unwrap(), Visibility::Private);

        fs.write("b.txt", Bytes::from_static(b"x"), &public())
            .await
            .unwrap();
        assert_eq!(fs.visibility("b.txt").await.unwrap(), Visibility::Public);
    }

    #[tokio::test]
    async fn test_create_directory_prefers_directory_visibility() {
        let (_dir, fs) = overlay("p1").await;
        let config = public().with_directory_visibility(Visibility::Private);
        fs.create_directory("d", &config).await.unwrap();
        assert_eq!(fs.visibility("d").await.unwrap(), Visibility::Private);

        fs.create_directory("e", &public()).await.unwrap();
        assert_eq!(fs.visibility("e").await.unwrap(), Visibility::Public);
    }

    #[tokio::test]
    async fn test_move_resets_source_marker() {
        let (_dir, fs) = overlay("p1").await;
        fs.write("a.txt", Bytes::from_static(b"x"), &OperationConfig::default())
            .await
            .unwrap();
        assert_eq!(fs.visibility("a.txt").await.unwrap(), Visibility::Private);

        fs.move_file("a.txt", "b.txt", &public()).await.unwrap();

        assert_eq!(fs.visibility("b.txt").await.unwrap(), Visibility::Public);
        assert_eq!(fs.visibility("a.txt").await.unwrap(), Visibility::Public);
        assert!(!fs.file_exists("a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_copy_keeps_source_visibility() {
        let (_dir, fs) = overlay("p1").await;
        fs.write("a.txt", Bytes::from_static(b"x"), &OperationConfig::default())
            .await
            .unwrap();

        fs.copy("a.txt", "b.txt", &public()).await.unwrap();

        assert_eq!(fs.visibility("a.txt").await.unwrap(), Visibility::Private);
        assert_eq!(fs.visibility("b.txt").await.unwrap(), Visibility::Public);
    }

    #[tokio::test]
    async fn test_listing_reports_computed_visibility() {
        let (_dir, fs) = overlay("p1").await;
        fs.write("docs/readme.txt", Bytes::from_static(b"hi"), &public())
            .await
            .unwrap();
        fs.create_directory("docs/secret", &OperationConfig::default())
            .await
            .unwrap();

        let entries: Vec<StorageAttributes> = fs
            .list_contents("docs", false)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(entries.len(), 2);
        for entry in &entries {
            match entry.path() {
                "docs/readme.txt" => assert_eq!(entry.visibility(), Some(Visibility::Public)),
                "docs/secret" => assert_eq!(entry.visibility(), Some(Visibility::Private)),
                other => panic!("unexpected entry {}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_projects_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("v.sqlite").display());
        let db = Database::new(url, Duration::from_secs(10));
        db.migrate().await.unwrap();
        let inner: Arc<dyn FilesystemAdapter> = Arc::new(ObjectStoreAdapter::in_memory());

        let first =
            VisibilityOverlay::new(inner.clone(), PrivatePathRepository::new(db.clone()), "p1");
        let second = VisibilityOverlay::new(inner, PrivatePathRepository::new(db), "p2");

        first.set_visibility("x", Visibility::Private).await.unwrap();
        assert_eq!(second.visibility("x").await.unwrap(), Visibility::Public);
    }

    #[tokio::test]
    async fn test_database_failure_surfaces_as_set_visibility_error() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("v.sqlite").display());
        // No migration: the `private` table does not exist.
        let db = Database::new(url, Duration::from_secs(10));
        let fs = VisibilityOverlay::new(
            Arc::new(ObjectStoreAdapter::in_memory()),
            PrivatePathRepository::new(db),
            "p1",
        );

        let err = fs
            .write("a.txt", Bytes::from_static(b"x"), &OperationConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::UnableToSetVisibility);
        assert_eq!(err.location(), "/a.txt");
        // The object itself was written.
        assert!(fs.file_exists("a.txt").await.unwrap());
    }
}
