use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::clock::Clock;

/// Key under which the catalog caches its full active-opportunity list.
pub const ALL_OPPORTUNITIES_KEY: &str = "all_opportunities";

struct CacheEntry<V> {
    value: V,
    stored_at: DateTime<Utc>,
}

/// Time-to-live cache for discovery results.
///
/// Values are replaced whole under the write lock, so a reader sees either
/// the previous value or the new one, never a partially built entry.
pub struct TtlCache<K, V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached value if it is younger than the TTL.
    pub async fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| now - e.stored_at < self.ttl)
            .map(|e| e.value.clone())
    }

    /// Store `value` under `key`. Expired entries are evicted on the way in,
    /// so the map never holds more than one TTL window of keys.
    pub async fn insert(&self, key: K, value: V) {
        let stored_at = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| stored_at - e.stored_at < self.ttl);
        let evicted = before - entries.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Expired cache entries evicted");
        }
        entries.insert(key, CacheEntry { value, stored_at });
    }

    pub async fn invalidate(&self, key: &K) {
        self.entries.write().await.remove(key);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
