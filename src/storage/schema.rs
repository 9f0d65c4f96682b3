use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::StorageError;

// ============================================================================
// Database
// ============================================================================

/// SQLite-backed seen-state store.
///
/// Cloning is cheap: all clones share one connection pool.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// Pass `":memory:"` for a throwaway store (tests, dry runs).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InstanceLocked` if another run holds the
    /// database lock, `StorageError::Migration` if the schema cannot be
    /// created, and `StorageError::Other` for everything else.
    pub async fn open(path: &str) -> Result<Self, StorageError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // Pre-create the file user-only so it never exists with umask permissions
        #[cfg(unix)]
        if path != ":memory:" {
            use std::os::unix::fs::OpenOptionsExt;
            let db_path = std::path::Path::new(path);
            if !db_path.exists() {
                if let Some(parent) = db_path.parent() {
                    if parent.exists() {
                        let _file = std::fs::OpenOptions::new()
                            .write(true)
                            .create_new(true)
                            .mode(0o600)
                            .open(db_path)
                            .ok(); // SQLite reports the real error at connect_with.
                    }
                }
            }
        }

        // busy_timeout=5000: wait up to 5 seconds for a concurrent run's lock.
        // synchronous=FULL: a committed record survives a crash right after the run.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(StorageError::from_sqlx)?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .pragma("busy_timeout", "5000");
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(StorageError::from_sqlx)?;
        let db = Self { pool };
        db.migrate().await.map_err(|e| match StorageError::from_sqlx(e) {
            StorageError::Other(e) => StorageError::Migration(e.to_string()),
            locked => locked,
        })?;
        tracing::debug!(path = %path, "Opened seen-state database");
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All statements use `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS seen (
                identifier TEXT PRIMARY KEY NOT NULL,
                recorded_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_seen_recorded ON seen(recorded_at)")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }
}
