//! Periodic expiry sweep
//!
//! Lazy deletion on `get` only touches keys that someone asks for; the
//! sweeper removes the rest so expired payloads do not pile up.

use super::ArtifactStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawn a background task purging expired entries every `every`.
///
/// Runs until `shutdown` is cancelled. A failed sweep is logged and retried
/// on the next tick.
pub fn spawn_sweeper(
    store: Arc<dyn ArtifactStore>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Artifact sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match store.purge_expired().await {
                        Ok(0) => {}
                        Ok(removed) => {
                            tracing::info!(removed, backend = %store.backend(), "Purged expired artifacts");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Artifact sweep failed");
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ManualClock, MemoryStore};

    #[tokio::test]
    async fn test_sweeper_purges_and_stops() {
        let clock = Arc::new(ManualClock::new(0));
        let store: Arc<dyn ArtifactStore> = Arc::new(MemoryStore::new(clock.clone()));
        store.put("x".into(), Duration::from_secs(1)).await.unwrap();
        store.put("y".into(), Duration::from_secs(1)).await.unwrap();
        clock.advance(Duration::from_secs(2));

        let shutdown = CancellationToken::new();
        let handle = spawn_sweeper(store.clone(), Duration::from_millis(10), shutdown.clone());

        let mut remaining = usize::MAX;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            remaining = store.stored_count().await.unwrap();
            if remaining == 0 {
                break;
            }
        }
        assert_eq!(remaining, 0);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweeper_keeps_live_entries() {
        let clock = Arc::new(ManualClock::new(0));
        let store: Arc<dyn ArtifactStore> = Arc::new(MemoryStore::new(clock.clone()));
        let key = store.put("live".into(), Duration::from_secs(300)).await.unwrap();

        let shutdown = CancellationToken::new();
        let handle = spawn_sweeper(store.clone(), Duration::from_millis(5), shutdown.clone());
        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("live"));
    }
}
