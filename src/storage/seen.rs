use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use super::schema::Database;
use super::types::{Claim, SeenRecord, StorageError};

/// Identifier-keyed record of entries that have already been dispatched.
///
/// Implementations only need point lookup and point insert. Nothing is ever
/// deleted: a recorded identifier stays recorded for the life of the store.
#[async_trait]
pub trait SeenStore: Send + Sync {
    /// Returns `Ok(false)` for identifiers that were never recorded.
    async fn contains(&self, identifier: &str) -> Result<bool, StorageError>;

    /// Marks `identifier` as dispatched. Recording twice is a no-op.
    async fn record(&self, identifier: &str) -> Result<(), StorageError>;

    /// Makes every completed `record` durable.
    async fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

// ============================================================================
// SQLite backend
// ============================================================================

#[async_trait]
impl SeenStore for Database {
    async fn contains(&self, identifier: &str) -> Result<bool, StorageError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM seen WHERE identifier = ?")
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    async fn record(&self, identifier: &str) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO seen (identifier, recorded_at)
            VALUES (?, ?)
            ON CONFLICT(identifier) DO NOTHING
        "#,
        )
        .bind(identifier)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Folds the WAL back into the main database file.
    async fn flush(&self) -> Result<(), StorageError> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

impl Database {
    /// All recorded identifiers, oldest first.
    pub async fn records(&self) -> Result<Vec<SeenRecord>, StorageError> {
        let rows: Vec<SeenRecord> = sqlx::query_as(
            "SELECT identifier, recorded_at FROM seen ORDER BY recorded_at, identifier",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Number of recorded identifiers.
    pub async fn count(&self) -> Result<i64, StorageError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM seen")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Process-local store. Used by tests and by runs that must not touch disk.
#[derive(Debug, Default)]
pub struct MemorySeenStore {
    identifiers: Mutex<HashSet<String>>,
}

impl MemorySeenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identifiers<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identifiers: Mutex::new(identifiers.into_iter().map(Into::into).collect()),
        }
    }

    /// Sorted snapshot of the recorded identifiers.
    pub fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = match self.identifiers.lock() {
            Ok(set) => set.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        };
        ids.sort();
        ids
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashSet<String>>, StorageError> {
        self.identifiers
            .lock()
            .map_err(|_| StorageError::Unavailable("in-memory store lock poisoned".into()))
    }
}

#[async_trait]
impl SeenStore for MemorySeenStore {
    async fn contains(&self, identifier: &str) -> Result<bool, StorageError> {
        Ok(self.lock()?.contains(identifier))
    }

    async fn record(&self, identifier: &str) -> Result<(), StorageError> {
        self.lock()?.insert(identifier.to_owned());
        Ok(())
    }
}

// ============================================================================
// Ledger: atomic check-and-claim across workers
// ============================================================================

/// Wraps a [`SeenStore`] with an in-flight set so that concurrent workers
/// never both dispatch the same identifier.
///
/// An identifier goes `claim -> complete` (dispatched, recorded) or
/// `claim -> release` (dispatch failed, stays re-notifiable). While claimed
/// it reports [`Claim::InFlight`] to every other caller.
pub struct SeenLedger {
    store: Arc<dyn SeenStore>,
    in_flight: tokio::sync::Mutex<HashSet<String>>,
}

impl SeenLedger {
    pub fn new(store: Arc<dyn SeenStore>) -> Self {
        Self {
            store,
            in_flight: tokio::sync::Mutex::new(HashSet::new()),
        }
    }

    /// Checks the store and the in-flight set under one lock.
    pub async fn claim(&self, identifier: &str) -> Result<Claim, StorageError> {
        let mut in_flight = self.in_flight.lock().await;
        if in_flight.contains(identifier) {
            return Ok(Claim::InFlight);
        }
        if self.store.contains(identifier).await? {
            return Ok(Claim::Seen);
        }
        in_flight.insert(identifier.to_owned());
        Ok(Claim::Claimed)
    }

    /// Records a claimed identifier and drops the claim.
    ///
    /// The claim is dropped even when recording fails, so a later run can
    /// retry the entry.
    pub async fn complete(&self, identifier: &str) -> Result<(), StorageError> {
        let result = self.store.record(identifier).await;
        self.in_flight.lock().await.remove(identifier);
        result
    }

    /// Drops a claim without recording.
    pub async fn release(&self, identifier: &str) {
        self.in_flight.lock().await.remove(identifier);
    }

    pub async fn flush(&self) -> Result<(), StorageError> {
        self.store.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_contains_unknown_identifier() {
        let db = test_db().await;
        assert!(!db.contains("never-seen").await.unwrap());
    }

    #[tokio::test]
    async fn test_record_then_contains() {
        let db = test_db().await;
        db.record("https://example.com/post/1").await.unwrap();
        assert!(db.contains("https://example.com/post/1").await.unwrap());
        assert!(!db.contains("https://example.com/post/2").await.unwrap());
    }

    #[tokio::test]
    async fn test_record_is_idempotent() {
        let db = test_db().await;
        db.record("a").await.unwrap();
        db.record("a").await.unwrap();
        assert_eq!(db.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_records_lists_identifiers() {
        let db = test_db().await;
        db.record("b").await.unwrap();
        db.record("a").await.unwrap();
        let mut ids: Vec<String> = db
            .records()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.identifier)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_flush_succeeds_on_memory_database() {
        let db = test_db().await;
        db.record("a").await.unwrap();
        db.flush().await.unwrap();
        assert!(db.contains("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = std::env::temp_dir().join(format!("rss2push_seen_reopen_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("seen.db");
        let path_str = path.to_str().unwrap();

        {
            let db = Database::open(path_str).await.unwrap();
            db.record("guid-1").await.unwrap();
            db.flush().await.unwrap();
            db.pool.close().await;
        }

        let db = Database::open(path_str).await.unwrap();
        assert!(db.contains("guid-1").await.unwrap());
        db.pool.close().await;

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_memory_store_contract() {
        let store = MemorySeenStore::with_identifiers(["x"]);
        assert!(store.contains("x").await.unwrap());
        assert!(!store.contains("y").await.unwrap());
        store.record("y").await.unwrap();
        store.record("y").await.unwrap();
        assert_eq!(store.identifiers(), vec!["x".to_string(), "y".to_string()]);
    }

    #[tokio::test]
    async fn test_ledger_claim_lifecycle() {
        let store = Arc::new(MemorySeenStore::new());
        let ledger = SeenLedger::new(store.clone());

        assert_eq!(ledger.claim("a").await.unwrap(), Claim::Claimed);
        assert_eq!(ledger.claim("a").await.unwrap(), Claim::InFlight);
        ledger.complete("a").await.unwrap();
        assert_eq!(ledger.claim("a").await.unwrap(), Claim::Seen);
        assert_eq!(store.identifiers(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_ledger_release_keeps_entry_renotifiable() {
        let store = Arc::new(MemorySeenStore::new());
        let ledger = SeenLedger::new(store.clone());

        assert_eq!(ledger.claim("a").await.unwrap(), Claim::Claimed);
        ledger.release("a").await;
        assert_eq!(ledger.claim("a").await.unwrap(), Claim::Claimed);
        assert!(store.identifiers().is_empty());
    }

    #[tokio::test]
    async fn test_ledger_concurrent_claims_single_winner() {
        let ledger = Arc::new(SeenLedger::new(Arc::new(test_db().await)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move { ledger.claim("shared").await.unwrap() })
            })
            .collect();

        let mut claimed = 0;
        for handle in handles {
            if handle.await.unwrap() == Claim::Claimed {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);
    }
}
