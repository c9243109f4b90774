//! In-memory artifact store
//!
//! Entries live in a `HashMap` behind a `tokio::sync::RwLock`. Reads share
//! the lock; only writes, and a read that finds its entry expired, take it
//! exclusively.

use super::clock::{duration_millis, Clock};
use super::{new_key, ArtifactStore, StoreEntry};
use crate::config::StoreBackend;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Volatile store; contents vanish with the process
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, StoreEntry>>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Insert or wholesale replace an entry
    async fn insert(&self, entry: StoreEntry) {
        self.entries.write().await.insert(entry.key.clone(), entry);
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn put(&self, payload: String, ttl: Duration) -> Result<String> {
        let key = new_key();
        let expires_at_ms = self
            .clock
            .now_millis()
            .saturating_add(duration_millis(ttl));
        self.insert(StoreEntry {
            key: key.clone(),
            payload,
            expires_at_ms,
        })
        .await;
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now_millis();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.payload.clone())),
                Some(_) => {}
            }
        }

        // Re-check under the write lock: a put may have replaced it meanwhile
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
            tracing::debug!(key = %key, "Dropped expired artifact on read");
        }
        Ok(None)
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before - entries.len())
    }

    async fn stored_count(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }

    fn backend(&self) -> StoreBackend {
        StoreBackend::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::clock::ManualClock;
    use crate::store::contract;

    fn make_store() -> (MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        (MemoryStore::new(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (store, _clock) = make_store();
        contract::put_then_get(&store).await;
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let (store, _clock) = make_store();
        contract::unknown_key(&store).await;
    }

    #[tokio::test]
    async fn test_expired_entry_is_gone() {
        let (store, clock) = make_store();
        contract::expiry(&store, &clock).await;
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (store, clock) = make_store();
        contract::purge(&store, &clock).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_puts_get_distinct_keys() {
        let (store, _clock) = make_store();
        contract::concurrent_puts(Arc::new(store)).await;
    }

    #[tokio::test]
    async fn test_insert_replaces_wholesale() {
        let (store, clock) = make_store();
        let key = store.put("first".into(), Duration::from_secs(1)).await.unwrap();

        store
            .insert(StoreEntry {
                key: key.clone(),
                payload: "second".into(),
                expires_at_ms: clock.now_millis() + 60_000,
            })
            .await;

        clock.advance(Duration::from_secs(30));
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("second"));
        assert_eq!(store.stored_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stores_are_isolated() {
        let (a, _) = make_store();
        let (b, _) = make_store();
        let key = a.put("only in a".into(), Duration::from_secs(5)).await.unwrap();
        assert!(b.get(&key).await.unwrap().is_none());
    }
}
