use thiserror::Error;

/// Database operation errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("Query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// The liveness probe failed while a transaction was open. Reconnecting here
    /// would silently drop the transaction, so the caller has to see it.
    #[error("Database connection lost during an open transaction")]
    ConnectionLostInTransaction {
        #[source]
        source: Option<sqlx::Error>,
    },

    #[error("No live database connection")]
    NotConnected,

    #[error("Transaction already committed or rolled back")]
    TransactionFinished,

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;
