use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Seen-state storage errors with user-friendly messages
#[derive(Debug, Error)]
pub enum StorageError {
    /// Another instance of the application has locked the database
    #[error("Another instance of rss2push appears to be running. Please wait for it to finish.")]
    InstanceLocked,

    /// Migration failed
    #[error("Seen-state migration failed: {0}")]
    Migration(String),

    /// The backing medium cannot be reached (used by non-SQL backends)
    #[error("Seen-state store unavailable: {0}")]
    Unavailable(String),

    /// Generic database error
    #[error("Seen-state database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl StorageError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
        {
            return StorageError::InstanceLocked;
        }

        StorageError::Other(err)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// One persisted seen-state row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SeenRecord {
    pub identifier: String,
    /// Unix timestamp of the successful dispatch. Informational only.
    pub recorded_at: i64,
}

/// Outcome of [`SeenLedger::claim`](super::SeenLedger::claim).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The identifier was recorded by an earlier dispatch.
    Seen,
    /// Another worker holds the identifier and is dispatching it right now.
    InFlight,
    /// The caller now owns the identifier and must `complete` or `release` it.
    Claimed,
}
