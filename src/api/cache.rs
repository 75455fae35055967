use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::pricefeed::INTERVAL_MIN5;
use super::types::Chain;

/// TTL of a window that is still running.
pub const LIVE_TTL_SECS: i64 = INTERVAL_MIN5;
/// TTL of a window that has fully elapsed; its result never changes.
pub const HISTORICAL_TTL_SECS: i64 = 365 * 24 * 3600;

/// Unix-seconds time source, swappable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// The window end is deliberately not part of the key: `to` is clamped to now
/// anyway, so requests differing only in end time share a slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub query: &'static str,
    pub from: i64,
    pub chain: Chain,
}

pub struct CacheEntry<V> {
    pub value: Arc<V>,
    pub stored_at: i64,
    pub ttl: i64,
}

impl<V> Clone for CacheEntry<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            stored_at: self.stored_at,
            ttl: self.ttl,
        }
    }
}

impl<V> CacheEntry<V> {
    pub fn is_expired(&self, now: i64) -> bool {
        now - self.stored_at >= self.ttl
    }
}

pub fn ttl_for_window(to: i64, now: i64) -> i64 {
    if to > now { LIVE_TTL_SECS } else { HISTORICAL_TTL_SECS }
}

/// Memoized query results. Concurrent misses on the same key are not merged;
/// the last writer wins.
pub struct ResultCache<V> {
    entries: RwLock<HashMap<CacheKey, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
}

impl<V> ResultCache<V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry<V>> {
        self.entries.read().await.get(key).cloned()
    }

    /// Returns the entry only while it is still fresh.
    pub async fn get_fresh(&self, key: &CacheKey) -> Option<Arc<V>> {
        let now = self.now();
        self.get(key)
            .await
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value)
    }

    /// Stores `value` under `key` and drops every other entry that has expired.
    pub async fn put(&self, key: CacheKey, value: Arc<V>, ttl: i64) {
        let now = self.now();
        let entry = CacheEntry {
            value,
            stored_at: now,
            ttl,
        };

        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        let evicted = before - entries.len();
        if evicted > 0 {
            tracing::debug!("Evicted {evicted} expired cache entries");
        }
        entries.insert(key, entry);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
