//! Resilient SQLite connection manager
//!
//! One connection per process, created on first use. Before every operation the
//! connection is validated: if the last successful probe is older than the ping
//! interval a trivial statement is run, and on failure the connection is replaced
//! by a fresh one instead of failing the call. Access is serialized through an
//! async mutex; a [`TransactionGuard`] keeps the lock for its whole lifetime so
//! no other caller can interleave statements inside a transaction.

use crate::error::{DatabaseError, DatabaseResult};
use crate::params::{bind_params, Param};
use crate::rows::RowStream;
use crate::transaction::TransactionGuard;
use futures::StreamExt;
use sqlx::sqlite::SqliteRow;
use sqlx::{Connection, SqliteConnection};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};

const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(10);
const ROW_BUFFER: usize = 64;

/// Shared handle to the process-wide database connection.
#[derive(Clone)]
pub struct Database {
    slot: Arc<Mutex<ConnectionSlot>>,
    url: Arc<str>,
    ping_interval: Duration,
}

/// The live connection and its bookkeeping. Only reachable through the mutex.
pub(crate) struct ConnectionSlot {
    conn: Option<SqliteConnection>,
    last_ping: Option<Instant>,
    /// Set when a transaction guard was dropped without commit or rollback.
    pub(crate) pending_rollback: bool,
    #[cfg(test)]
    fail_next_probe: bool,
}

impl Database {
    /// Create a manager for `url`. Nothing is opened until the first call.
    pub fn new(url: impl Into<String>, ping_interval: Duration) -> Self {
        let url: String = url.into();
        Self {
            slot: Arc::new(Mutex::new(ConnectionSlot {
                conn: None,
                last_ping: None,
                pending_rollback: false,
                #[cfg(test)]
                fail_next_probe: false,
            })),
            url: Arc::from(url),
            ping_interval,
        }
    }

    pub fn with_default_interval(url: impl Into<String>) -> Self {
        Self::new(url, DEFAULT_PING_INTERVAL)
    }

    pub fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    /// Lock the connection and make sure it is alive.
    async fn acquire(&self) -> DatabaseResult<OwnedMutexGuard<ConnectionSlot>> {
        let mut slot = self.slot.clone().lock_owned().await;
        slot.ensure_live(&self.url, self.ping_interval, false).await?;
        Ok(slot)
    }

    /// Run a statement and return the number of affected rows.
    pub async fn execute(&self, query: &str, params: &[Param]) -> DatabaseResult<u64> {
        let mut slot = self.acquire().await?;
        slot.execute(query, params).await
    }

    /// Fetch at most one row.
    pub async fn fetch_one(
        &self,
        query: &str,
        params: &[Param],
    ) -> DatabaseResult<Option<SqliteRow>> {
        let mut slot = self.acquire().await?;
        slot.fetch_one(query, params).await
    }

    /// Fetch rows lazily.
    ///
    /// Connection problems surface here; per-row failures surface as stream items.
    /// The connection stays locked until the stream is exhausted or dropped.
    pub async fn fetch_all(
        &self,
        query: impl Into<String>,
        params: Vec<Param>,
    ) -> DatabaseResult<RowStream> {
        let mut slot = self.acquire().await?;
        let query = query.into();
        let (tx, rx) = mpsc::channel(ROW_BUFFER);

        tokio::spawn(async move {
            let conn = match slot.connection() {
                Ok(conn) => conn,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            let mut rows = bind_params(sqlx::query(&query), &params).fetch(conn);
            while let Some(row) = rows.next().await {
                let failed = row.is_err();
                if tx.send(row.map_err(DatabaseError::Query)).await.is_err() || failed {
                    break;
                }
            }
        });

        Ok(RowStream::from_receiver(rx))
    }

    /// Start a transaction. The returned guard owns the connection until it
    /// is committed, rolled back or dropped.
    pub async fn begin(&self) -> DatabaseResult<TransactionGuard> {
        let mut slot = self.acquire().await?;
        slot.execute("BEGIN", &[]).await?;
        Ok(TransactionGuard::new(
            slot,
            self.url.clone(),
            self.ping_interval,
        ))
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> DatabaseResult<()> {
        let mut slot = self.acquire().await?;
        let conn = slot.connection()?;
        sqlx::migrate!("../../migrations").run(conn).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// Close the live connection, if any. The next call reconnects lazily.
    pub async fn disconnect(&self) {
        let mut slot = self.slot.lock().await;
        slot.last_ping = None;
        if let Some(conn) = slot.conn.take() {
            if let Err(e) = conn.close().await {
                tracing::warn!(error = %e, "Error while closing database connection");
            }
            tracing::info!("Database connection closed");
        }
    }

    #[cfg(test)]
    pub(crate) async fn force_probe_failure(&self) {
        self.slot.lock().await.force_probe_failure();
    }
}

impl ConnectionSlot {
    pub(crate) fn connection(&mut self) -> DatabaseResult<&mut SqliteConnection> {
        self.conn.as_mut().ok_or(DatabaseError::NotConnected)
    }

    #[cfg(test)]
    pub(crate) fn force_probe_failure(&mut self) {
        self.last_ping = None;
        self.fail_next_probe = true;
    }

    /// Establish or re-validate the connection.
    ///
    /// Inside a transaction a failed probe (or a missing connection) is an error:
    /// reconnecting would lose the transaction without anyone noticing.
    pub(crate) async fn ensure_live(
        &mut self,
        url: &str,
        ping_interval: Duration,
        in_transaction: bool,
    ) -> DatabaseResult<()> {
        if self.pending_rollback && !in_transaction {
            self.pending_rollback = false;
            if let Some(conn) = self.conn.as_mut() {
                if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    tracing::debug!(error = %e, "Deferred rollback had nothing to undo");
                }
            }
        }

        if self.conn.is_none() {
            if in_transaction {
                return Err(DatabaseError::ConnectionLostInTransaction { source: None });
            }
            return self.connect(url).await;
        }

        let fresh = self
            .last_ping
            .map(|at| at.elapsed() <= ping_interval)
            .unwrap_or(false);
        if fresh {
            return Ok(());
        }

        match self.probe().await {
            Ok(()) => {
                self.last_ping = Some(Instant::now());
                Ok(())
            }
            Err(e) if in_transaction => {
                tracing::error!(error = %e, "Database probe failed inside a transaction");
                Err(DatabaseError::ConnectionLostInTransaction { source: Some(e) })
            }
            Err(e) => {
                tracing::warn!(error = %e, "Database probe failed, reconnecting");
                self.connect(url).await
            }
        }
    }

    async fn probe(&mut self) -> Result<(), sqlx::Error> {
        #[cfg(test)]
        if std::mem::take(&mut self.fail_next_probe) {
            return Err(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "simulated dropped connection",
            )));
        }
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| sqlx::Error::Protocol("no connection".to_string()))?;
        sqlx::query("SELECT 1").execute(conn).await.map(drop)
    }

    async fn connect(&mut self, url: &str) -> DatabaseResult<()> {
        // A replaced connection is simply dropped; closing a broken one can hang.
        self.conn = None;
        self.last_ping = None;

        let start = Instant::now();
        let mut conn = SqliteConnection::connect(url)
            .await
            .map_err(DatabaseError::Connect)?;
        sqlx::query("PRAGMA journal_mode = WAL;")
            .execute(&mut conn)
            .await
            .map_err(DatabaseError::Connect)?;
        sqlx::query("PRAGMA foreign_keys = ON;")
            .execute(&mut conn)
            .await
            .map_err(DatabaseError::Connect)?;

        self.conn = Some(conn);
        self.last_ping = Some(Instant::now());

        tracing::info!(
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Database connection established"
        );
        Ok(())
    }

    pub(crate) async fn execute(&mut self, query: &str, params: &[Param]) -> DatabaseResult<u64> {
        let conn = self.connection()?;
        let result = bind_params(sqlx::query(query), params)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }

    pub(crate) async fn fetch_one(
        &mut self,
        query: &str,
        params: &[Param],
    ) -> DatabaseResult<Option<SqliteRow>> {
        let conn = self.connection()?;
        let row = bind_params(sqlx::query(query), params)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use sqlx::Row;
    use tempfile::TempDir;

    fn temp_database(interval: Duration) -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("test.sqlite").display()
        );
        (dir, Database::new(url, interval))
    }

    async fn create_table(db: &Database) {
        db.execute(
            "CREATE TABLE items (name TEXT PRIMARY KEY, size INTEGER)",
            &[],
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_lazy_connect_and_execute() {
        let (_dir, db) = temp_database(Duration::from_secs(10));
        create_table(&db).await;

        let affected = db
            .execute(
                "INSERT INTO items (name, size) VALUES (?, ?)",
                &[Param::from("a"), Param::from(1_i64)],
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let row = db
            .fetch_one("SELECT size FROM items WHERE name = ?", &["a".into()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.get::<i64, _>("size"), 1);

        let missing = db
            .fetch_one("SELECT size FROM items WHERE name = ?", &["b".into()])
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_wal_mode_is_enabled() {
        let (_dir, db) = temp_database(Duration::from_secs(10));
        let row = db
            .fetch_one("PRAGMA journal_mode", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.get::<String, _>(0).to_lowercase(), "wal");
    }

    #[tokio::test]
    async fn test_fetch_all_streams_rows() {
        let (_dir, db) = temp_database(Duration::from_secs(10));
        create_table(&db).await;
        for i in 0..100_i64 {
            db.execute(
                "INSERT INTO items (name, size) VALUES (?, ?)",
                &[Param::from(format!("item-{:03}", i)), Param::from(i)],
            )
            .await
            .unwrap();
        }

        let rows: Vec<SqliteRow> = db
            .fetch_all("SELECT name FROM items ORDER BY name", vec![])
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(rows.len(), 100);
        assert_eq!(rows[0].get::<String, _>("name"), "item-000");

        // Dropping a partially consumed stream releases the connection.
        let mut stream = db
            .fetch_all("SELECT name FROM items ORDER BY name", vec![])
            .await
            .unwrap();
        let first = stream.try_next().await.unwrap();
        assert!(first.is_some());
        drop(stream);
        assert_eq!(
            db.execute("DELETE FROM items WHERE size >= ?", &[50_i64.into()])
                .await
                .unwrap(),
            50
        );
    }

    #[tokio::test]
    async fn test_reconnects_after_failed_probe() {
        let (_dir, db) = temp_database(Duration::from_secs(10));
        create_table(&db).await;

        db.force_probe_failure().await;

        let affected = db
            .execute(
                "INSERT INTO items (name, size) VALUES (?, ?)",
                &["after-reconnect".into(), 1_i64.into()],
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);
    }

    #[tokio::test]
    async fn test_reconnects_after_disconnect() {
        let (_dir, db) = temp_database(Duration::from_secs(10));
        create_table(&db).await;
        db.disconnect().await;

        let row = db
            .fetch_one("SELECT COUNT(*) AS n FROM items", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.get::<i64, _>("n"), 0);
    }

    #[tokio::test]
    async fn test_probe_failure_inside_transaction_is_an_error() {
        let (_dir, db) = temp_database(Duration::from_secs(10));
        create_table(&db).await;

        let mut tx = db.begin().await.unwrap();
        tx.execute("INSERT INTO items (name) VALUES (?)", &["x".into()])
            .await
            .unwrap();
        tx.force_probe_failure();
        let err = tx
            .execute("INSERT INTO items (name) VALUES (?)", &["y".into()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::ConnectionLostInTransaction { .. }
        ));
        tx.rollback().await.unwrap();

        let row = db
            .fetch_one("SELECT COUNT(*) AS n FROM items", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.get::<i64, _>("n"), 0);
    }

    #[tokio::test]
    async fn test_migrate_creates_private_table() {
        let (_dir, db) = temp_database(Duration::from_secs(10));
        db.migrate().await.unwrap();
        db.execute(
            "INSERT INTO private (path, project) VALUES (?, ?)",
            &["/a".into(), "p".into()],
        )
        .await
        .unwrap();
        // Running again is a no-op.
        db.migrate().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_failure_propagates() {
        let db = Database::with_default_interval("sqlite:///nonexistent-dir/for/sure/db.sqlite");
        let err = db.execute("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Connect(_)));
    }
}
