//! Private path repository: reads and writes for the `private` table.
//!
//! A row `(path, project)` means the path is private within the project; the
//! absence of a row means public. Paths are stored as given by the caller.

use crate::connection::Database;
use crate::error::DatabaseResult;
use crate::transaction::TransactionGuard;
use futures::stream::{BoxStream, StreamExt};
use sqlx::Row;

/// Repository for the `private` table.
#[derive(Clone)]
pub struct PrivatePathRepository {
    db: Database,
}

impl PrivatePathRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    #[tracing::instrument(skip(self), fields(db.table = "private"))]
    pub async fn is_private(&self, path: &str, project: &str) -> DatabaseResult<bool> {
        let row = self
            .db
            .fetch_one(
                "SELECT 1 FROM private WHERE path = ? AND project = ? LIMIT 1",
                &[path.into(), project.into()],
            )
            .await?;
        Ok(row.is_some())
    }

    /// Record `path` as private. Marking an already private path is a no-op.
    #[tracing::instrument(skip(self, tx), fields(db.table = "private"))]
    pub async fn mark_private(
        &self,
        tx: &mut TransactionGuard,
        path: &str,
        project: &str,
    ) -> DatabaseResult<()> {
        tx.execute(
            "INSERT INTO private (path, project) VALUES (?, ?) ON CONFLICT (path, project) DO NOTHING",
            &[path.into(), project.into()],
        )
        .await?;
        Ok(())
    }

    /// Remove the private marker of `path`, if any.
    #[tracing::instrument(skip(self, tx), fields(db.table = "private"))]
    pub async fn mark_public(
        &self,
        tx: &mut TransactionGuard,
        path: &str,
        project: &str,
    ) -> DatabaseResult<()> {
        tx.execute(
            "DELETE FROM private WHERE path = ? AND project = ?",
            &[path.into(), project.into()],
        )
        .await?;
        Ok(())
    }

    /// Stream every private path of `project` at or below `prefix`.
    ///
    /// An empty prefix or `/` selects the whole project.
    pub async fn private_paths_under(
        &self,
        project: &str,
        prefix: &str,
    ) -> DatabaseResult<BoxStream<'static, DatabaseResult<String>>> {
        let prefix = prefix.trim_end_matches('/');
        let rows = if prefix.is_empty() {
            self.db
                .fetch_all(
                    "SELECT path FROM private WHERE project = ?",
                    vec![project.into()],
                )
                .await?
        } else {
            self.db
                .fetch_all(
                    "SELECT path FROM private WHERE project = ? AND (path = ? OR path LIKE ? ESCAPE '\\')",
                    vec![
                        project.into(),
                        prefix.into(),
                        format!("{}/%", escape_like(prefix)).into(),
                    ],
                )
                .await?
        };

        Ok(rows
            .map(|row| row.and_then(|r| r.try_get::<String, _>("path").map_err(Into::into)))
            .boxed())
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
