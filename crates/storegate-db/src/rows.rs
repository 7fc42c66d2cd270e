//! Lazy row sequences.

use crate::error::DatabaseError;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use sqlx::sqlite::SqliteRow;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Rows from a single query, produced on demand.
///
/// The stream is finite and cannot be restarted. While it is alive the producing
/// task holds the connection, so drop it (or drain it) before issuing other
/// queries from the same task.
pub struct RowStream {
    inner: BoxStream<'static, Result<SqliteRow, DatabaseError>>,
}

impl RowStream {
    pub(crate) fn from_receiver(rx: mpsc::Receiver<Result<SqliteRow, DatabaseError>>) -> Self {
        let inner = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed();
        Self { inner }
    }
}

impl Stream for RowStream {
    type Item = Result<SqliteRow, DatabaseError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}
