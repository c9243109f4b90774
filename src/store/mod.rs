//! Time-limited artifact storage
//!
//! Two interchangeable backends sit behind [`ArtifactStore`]:
//!
//! - [`MemoryStore`]: a process-local map, lost on restart
//! - [`SqliteStore`]: a single SQLite table, survives restart
//!
//! Both mint a fresh UUID v4 key per `put`, stamp `expiry = now + ttl`
//! from an injected [`Clock`], and treat an entry whose expiry has passed
//! as absent even before the [`sweeper`] physically removes it.

pub mod clock;
pub mod memory;
pub mod sqlite;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use sweeper::spawn_sweeper;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A stored payload and when it stops being retrievable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    pub key: String,
    pub payload: String,
    /// Unix epoch milliseconds
    pub expires_at_ms: i64,
}

impl StoreEntry {
    /// An entry is logically gone once `now` passes its expiry
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms < now_ms
    }
}

/// Keyed payload storage with per-entry expiry.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `payload` under a newly generated key, retrievable for `ttl`.
    ///
    /// Returns only once the backend has accepted the write.
    async fn put(&self, payload: String, ttl: Duration) -> Result<String>;

    /// Fetch a live payload. Unknown and expired keys both yield `None`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Physically remove every expired entry, returning how many went.
    async fn purge_expired(&self) -> Result<usize>;

    /// Entries physically held, including expired ones not yet purged.
    async fn stored_count(&self) -> Result<usize>;

    /// Which backend this is
    fn backend(&self) -> StoreBackend;
}

/// Generate a fresh artifact key.
pub fn new_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Build the configured backend.
///
/// For SQLite this creates the database file and table if missing.
pub fn open_store(config: &StoreConfig, clock: Arc<dyn Clock>) -> Result<Arc<dyn ArtifactStore>> {
    let store: Arc<dyn ArtifactStore> = match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new(clock)),
        StoreBackend::Sqlite => Arc::new(SqliteStore::open(&config.sqlite_path, clock)?),
    };
    tracing::info!(backend = %config.backend, ttl_secs = config.ttl_secs, "Artifact store ready");
    Ok(store)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_uuid_v4() {
        let key = new_key();
        let parsed = uuid::Uuid::parse_str(&key).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(key, key.to_lowercase());
        assert_ne!(new_key(), key);
    }

    #[test]
    fn test_entry_expiry_boundary() {
        let entry = StoreEntry {
            key: new_key(),
            payload: String::new(),
            expires_at_ms: 1_000,
        };
        assert!(!entry.is_expired(999));
        assert!(!entry.is_expired(1_000));
        assert!(entry.is_expired(1_001));
    }

    #[tokio::test]
    async fn test_open_store_selects_backend() {
        let dir = tempfile::tempdir().unwrap();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let memory = open_store(&StoreConfig::default(), clock.clone()).unwrap();
        assert_eq!(memory.backend(), StoreBackend::Memory);

        let config = StoreConfig {
            backend: StoreBackend::Sqlite,
            sqlite_path: dir.path().join("nested").join("artifacts.db"),
            ..StoreConfig::default()
        };
        let sqlite = open_store(&config, clock).unwrap();
        assert_eq!(sqlite.backend(), StoreBackend::Sqlite);
        assert!(config.sqlite_path.exists());
    }

    #[tokio::test]
    async fn test_backends_are_interchangeable() {
        let dir = tempfile::tempdir().unwrap();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        let stores: Vec<Arc<dyn ArtifactStore>> = vec![
            Arc::new(MemoryStore::new(clock.clone())),
            Arc::new(SqliteStore::open(&dir.path().join("a.db"), clock).unwrap()),
        ];

        let payload = "id,note\n1,\"x, y\"\n";
        for store in stores {
            let key = store.put(payload.into(), Duration::from_secs(5)).await.unwrap();
            assert_eq!(key.len(), 36);
            assert_eq!(store.get(&key).await.unwrap().as_deref(), Some(payload));
            assert_eq!(store.get("missing").await.unwrap(), None);
        }
    }
}
