//! Database transaction utilities
//!
//! A [`TransactionGuard`] holds the connection lock from `BEGIN` until it is
//! committed, rolled back or dropped. Statements issued through it re-validate
//! the connection, but a failed probe is reported instead of reconnecting.

use crate::connection::ConnectionSlot;
use crate::error::{DatabaseError, DatabaseResult};
use crate::params::Param;
use sqlx::sqlite::SqliteRow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;

/// An open transaction on the shared connection
///
/// # Example
///
/// ```ignore
/// let mut tx = db.begin().await?;
/// tx.execute("DELETE FROM private WHERE path = ?", &[path.into()]).await?;
/// tx.commit().await?;
/// ```
pub struct TransactionGuard {
    slot: Option<OwnedMutexGuard<ConnectionSlot>>,
    url: Arc<str>,
    ping_interval: Duration,
}

impl TransactionGuard {
    pub(crate) fn new(
        slot: OwnedMutexGuard<ConnectionSlot>,
        url: Arc<str>,
        ping_interval: Duration,
    ) -> Self {
        Self {
            slot: Some(slot),
            url,
            ping_interval,
        }
    }

    async fn live_slot(&mut self) -> DatabaseResult<&mut ConnectionSlot> {
        let slot = self
            .slot
            .as_deref_mut()
            .ok_or(DatabaseError::TransactionFinished)?;
        slot.ensure_live(&self.url, self.ping_interval, true).await?;
        Ok(slot)
    }

    pub async fn execute(&mut self, query: &str, params: &[Param]) -> DatabaseResult<u64> {
        self.live_slot().await?.execute(query, params).await
    }

    pub async fn fetch_one(
        &mut self,
        query: &str,
        params: &[Param],
    ) -> DatabaseResult<Option<SqliteRow>> {
        self.live_slot().await?.fetch_one(query, params).await
    }

    /// Commit the transaction
    ///
    /// If the commit fails the transaction is left to be rolled back before the
    /// connection's next use.
    pub async fn commit(mut self) -> DatabaseResult<()> {
        let Some(mut slot) = self.slot.take() else {
            return Err(DatabaseError::TransactionFinished);
        };
        if let Err(e) = slot.execute("COMMIT", &[]).await {
            slot.pending_rollback = true;
            return Err(e);
        }
        Ok(())
    }

    /// Roll the transaction back
    pub async fn rollback(mut self) -> DatabaseResult<()> {
        let Some(mut slot) = self.slot.take() else {
            return Err(DatabaseError::TransactionFinished);
        };
        if let Err(e) = slot.execute("ROLLBACK", &[]).await {
            slot.pending_rollback = true;
            return Err(e);
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn force_probe_failure(&mut self) {
        if let Some(slot) = self.slot.as_deref_mut() {
            slot.force_probe_failure();
        }
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        // Rollback is async, so it is deferred to the connection's next use.
        if let Some(mut slot) = self.slot.take() {
            tracing::warn!(
                "Transaction was dropped without explicit commit or rollback - rolling back"
            );
            slot.pending_rollback = true;
        }
    }
}
