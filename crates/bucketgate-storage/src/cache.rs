//! Session-keyed cache of signing clients.
//!
//! An entry maps an upload session key to a signing client and the decrypted bucket
//! config it was built from. Callers choose the key; the upload coordinator scopes it to
//! the owning bucket. Entries expire a fixed time after
//! creation. Expired entries are treated as absent on access and are removed by
//! [`ClientCache::sweep_expired`], which [`ClientCache::spawn_sweeper`] runs
//! periodically.
//!
//! Concurrent `get_or_create` calls for the same absent key share one load: the first
//! caller runs the loader and the rest await its result.

use crate::SigningClient;
use bucketgate_core::models::ResolvedBucket;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Signing client plus the decrypted config it was built from
#[derive(Clone)]
pub struct CachedClient {
    pub client: Arc<dyn SigningClient>,
    pub bucket: Arc<ResolvedBucket>,
}

impl std::fmt::Debug for CachedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedClient")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

pub type SigningClientCache = ClientCache<CachedClient>;

struct Slot<V> {
    cell: OnceCell<(V, Instant)>,
}

impl<V> Slot<V> {
    fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    fn ready(value: V) -> Self {
        Self {
            cell: OnceCell::new_with(Some((value, Instant::now()))),
        }
    }

    /// A slot still loading has no creation time yet and is never expired.
    fn is_expired(&self, ttl: Duration) -> bool {
        self.cell
            .get()
            .is_some_and(|(_, created_at)| created_at.elapsed() >= ttl)
    }
}

pub struct ClientCache<V> {
    entries: Mutex<HashMap<String, Arc<Slot<V>>>>,
    ttl: Duration,
}

impl<V> ClientCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Return the live entry for `key`, running `loader` only if there is none.
    ///
    /// A failed load stores nothing; the next call runs the loader again.
    pub async fn get_or_create<F, Fut, E>(&self, key: &str, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = {
            let mut entries = self.entries.lock().await;
            match entries.get(key) {
                Some(slot) if !slot.is_expired(self.ttl) => {
                    tracing::debug!(session = %key, "Client cache hit");
                    slot.clone()
                }
                _ => {
                    tracing::debug!(session = %key, "Client cache miss");
                    let slot = Arc::new(Slot::new());
                    entries.insert(key.to_string(), slot.clone());
                    slot
                }
            }
        };

        let loaded = slot
            .cell
            .get_or_try_init(|| async move {
                loader().await.map(|value| (value, Instant::now()))
            })
            .await;

        match loaded {
            Ok((value, _)) => Ok(value.clone()),
            Err(err) => {
                let mut entries = self.entries.lock().await;
                if entries
                    .get(key)
                    .is_some_and(|current| Arc::ptr_eq(current, &slot))
                {
                    entries.remove(key);
                }
                Err(err)
            }
        }
    }

    /// Seed an entry with an already-built value, replacing any existing one.
    pub async fn insert(&self, key: &str, value: V) {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), Arc::new(Slot::ready(value)));
        tracing::debug!(session = %key, "Client cache entry inserted");
    }

    /// Remove the entry for `key`. Evicting an absent key is a no-op.
    pub async fn evict(&self, key: &str) -> bool {
        let removed = self.entries.lock().await.remove(key).is_some();
        if removed {
            tracing::debug!(session = %key, "Client cache entry evicted");
        }
        removed
    }

    /// Drop every expired entry and return how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, slot| !slot.is_expired(self.ttl));
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = entries.len(), "Client cache swept");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Run `sweep_expired` every `interval` until the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    tracing::debug!("Client cache dropped, stopping sweeper");
                    break;
                };
                cache.sweep_expired().await;
            }
        })
    }
}
