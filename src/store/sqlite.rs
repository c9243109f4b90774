//! SQLite-backed artifact store
//!
//! Layout:
//! ```text
//! artifacts(
//!     artifact_key  TEXT PRIMARY KEY,
//!     payload       TEXT NOT NULL,
//!     expires_at_ms INTEGER NOT NULL
//! )
//! ```
//!
//! Every call opens its own connection on the blocking pool and runs a
//! single statement, so no transaction spans calls. WAL mode lets readers
//! proceed while a writer commits; `busy_timeout` makes concurrent writers
//! queue instead of failing with `SQLITE_BUSY`.

use super::clock::{duration_millis, Clock};
use super::{new_key, ArtifactStore};
use crate::config::StoreBackend;
use crate::error::{Error, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
    PRAGMA journal_mode = WAL;
    CREATE TABLE IF NOT EXISTS artifacts (
        artifact_key  TEXT PRIMARY KEY,
        payload       TEXT NOT NULL,
        expires_at_ms INTEGER NOT NULL
    );
";

/// Durable store; entries survive restart until their expiry
pub struct SqliteStore {
    path: Arc<PathBuf>,
    clock: Arc<dyn Clock>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and ensure the table.
    pub fn open(path: &Path, clock: Arc<dyn Clock>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = connect(path)?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(path = %path.display(), "SQLite artifact table ready");

        Ok(Self {
            path: Arc::new(path.to_path_buf()),
            clock,
        })
    }

    /// Run `f` against a fresh connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = connect(&path)?;
            f(&conn)
        })
        .await?
    }
}

fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .map_err(|e| Error::Storage(format!("cannot open {}: {}", path.display(), e)))?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

#[async_trait]
impl ArtifactStore for SqliteStore {
    async fn put(&self, payload: String, ttl: Duration) -> Result<String> {
        let key = new_key();
        let expires_at_ms = self
            .clock
            .now_millis()
            .saturating_add(duration_millis(ttl));

        let row_key = key.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO artifacts (artifact_key, payload, expires_at_ms)
                 VALUES (?1, ?2, ?3)",
                params![row_key, payload, expires_at_ms],
            )?;
            Ok(())
        })
        .await?;

        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now_millis();
        let key = key.to_string();

        self.with_conn(move |conn| {
            let row: Option<(String, i64)> = conn
                .query_row(
                    "SELECT payload, expires_at_ms FROM artifacts WHERE artifact_key = ?1",
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            match row {
                Some((payload, expires_at_ms)) if expires_at_ms >= now => Ok(Some(payload)),
                Some(_) => {
                    // Guard on expiry so a concurrent replace is left alone
                    conn.execute(
                        "DELETE FROM artifacts WHERE artifact_key = ?1 AND expires_at_ms < ?2",
                        params![key, now],
                    )?;
                    tracing::debug!(key = %key, "Dropped expired artifact on read");
                    Ok(None)
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = self.clock.now_millis();
        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM artifacts WHERE expires_at_ms < ?1",
                params![now],
            )?;
            Ok(removed)
        })
        .await
    }

    async fn stored_count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM artifacts", [], |row| row.get(0))?;
            Ok(usize::try_from(count).unwrap_or_default())
        })
        .await
    }

    fn backend(&self) -> StoreBackend {
        StoreBackend::Sqlite
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::clock::ManualClock;
    use crate::store::contract;
    use tempfile::TempDir;

    fn make_store() -> (SqliteStore, Arc<ManualClock>, TempDir) {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let store = SqliteStore::open(&dir.path().join("artifacts.db"), clock.clone()).unwrap();
        (store, clock, dir)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (store, _clock, _dir) = make_store();
        contract::put_then_get(&store).await;
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let (store, _clock, _dir) = make_store();
        contract::unknown_key(&store).await;
    }

    #[tokio::test]
    async fn test_expired_entry_is_gone() {
        let (store, clock, _dir) = make_store();
        contract::expiry(&store, &clock).await;
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (store, clock, _dir) = make_store();
        contract::purge(&store, &clock).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_puts_get_distinct_keys() {
        let (store, _clock, _dir) = make_store();
        contract::concurrent_puts(Arc::new(store)).await;
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("artifacts.db");
        let clock = Arc::new(ManualClock::new(0));

        let key = {
            let store = SqliteStore::open(&path, clock.clone()).unwrap();
            store
                .put("a,b\n1,2\n".into(), Duration::from_secs(60))
                .await
                .unwrap()
        };

        let reopened = SqliteStore::open(&path, clock.clone()).unwrap();
        assert_eq!(
            reopened.get(&key).await.unwrap().as_deref(),
            Some("a,b\n1,2\n")
        );

        // Expiry still applies after restart
        clock.advance(Duration::from_secs(61));
        assert_eq!(reopened.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unicode_and_quotes_preserved() {
        let (store, _clock, _dir) = make_store();
        let payload = "name,note\nZoë,\"say \"\"hi\"\"\"\n";
        let key = store.put(payload.into(), Duration::from_secs(5)).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some(payload));
    }

    #[tokio::test]
    async fn test_failed_write_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("artifacts.db");
        let store = SqliteStore::open(&path, Arc::new(ManualClock::new(0))).unwrap();

        Connection::open(&path)
            .unwrap()
            .execute_batch("DROP TABLE artifacts")
            .unwrap();

        let err = store
            .put("a\n1\n".into(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(err.code(), "STORAGE_ERROR");
        assert!(matches!(store.get("any").await, Err(Error::Storage(_))));
    }

    #[tokio::test]
    async fn test_unwritable_path_is_storage_error() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be opened as a database file
        let result = SqliteStore::open(dir.path(), Arc::new(ManualClock::new(0)));
        assert!(matches!(result, Err(Error::Storage(_))));
    }
}
