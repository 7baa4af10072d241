/// Generic in-memory cache with per-entry TTL and LRU eviction
///
/// Thread-safe, generic over key/value types. Values are cloned on the
/// way in and out, so callers can never mutate cached state through a
/// returned reference. Tracks counters for monitoring.
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::CacheConfig;

const MIN_TTL: Duration = Duration::from_secs(1);

/// Cache entry with its absolute expiry
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Counters kept under the cache lock
#[derive(Debug, Clone, Copy, Default)]
struct CacheCounters {
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
    inserts: u64,
}

/// Snapshot of cache state for monitoring endpoints
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub inserts: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheInner<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    access_order: VecDeque<K>, // front = least recently used
    counters: CacheCounters,
}

/// Thread-safe TTL/LRU cache
///
/// A single mutex guards the entry map, the recency order and the
/// counters; nothing does I/O while holding it.
pub struct ReportCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    config: CacheConfig,
    inner: Mutex<CacheInner<K, V>>,
}

impl<K, V> ReportCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                access_order: VecDeque::new(),
                counters: CacheCounters::default(),
            }),
        }
    }

    /// Get a value and its expiry (None if missing or expired)
    ///
    /// Expiry is lazy: an entry past its TTL is removed here, on
    /// access, rather than by a background sweeper. A hit refreshes
    /// the key's recency.
    pub fn get(&self, key: &K) -> Option<(V, Instant)> {
        let now = Instant::now();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let expired = match inner.entries.get(key) {
            Some(entry) => entry.expires_at <= now,
            None => {
                inner.counters.misses += 1;
                return None;
            }
        };

        if expired {
            inner.entries.remove(key);
            inner.access_order.retain(|k| k != key);
            inner.counters.misses += 1;
            inner.counters.expirations += 1;
            return None;
        }

        let (value, expires_at) = match inner.entries.get(key) {
            Some(entry) => (entry.value.clone(), entry.expires_at),
            None => return None,
        };

        inner.access_order.retain(|k| k != key);
        inner.access_order.push_back(key.clone());
        inner.counters.hits += 1;

        Some((value, expires_at))
    }

    /// Store a value, returning its absolute expiry
    ///
    /// A missing TTL falls back to the configured default; anything
    /// below one second clamps to one second. Setting an existing key
    /// refreshes its recency instead of double-booking it in the
    /// eviction order. Evicts least-recently-used keys until the store
    /// is back within its size bound.
    pub fn set(&self, key: K, value: V, ttl: Option<Duration>) -> Instant {
        let ttl = ttl.unwrap_or(self.config.default_ttl).max(MIN_TTL);
        let expires_at = Instant::now() + ttl;

        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        inner.entries.insert(key.clone(), CacheEntry { value, expires_at });
        inner.access_order.retain(|k| k != &key);
        inner.access_order.push_back(key);
        inner.counters.inserts += 1;

        let max_entries = self.config.max_entries.max(1);
        while inner.entries.len() > max_entries {
            match inner.access_order.pop_front() {
                Some(lru_key) => {
                    inner.entries.remove(&lru_key);
                    inner.counters.evictions += 1;
                }
                None => break,
            }
        }

        expires_at
    }

    /// Atomically empty the store
    pub fn clear(&self) {
        let mut guard = self.inner.lock();
        guard.entries.clear();
        guard.access_order.clear();
    }

    /// Current number of stored keys (introspection only; does not
    /// trigger expiry or eviction)
    pub fn size(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Counter snapshot (introspection only)
    pub fn stats(&self) -> CacheStats {
        let guard = self.inner.lock();
        CacheStats {
            entries: guard.entries.len(),
            max_entries: self.config.max_entries,
            hits: guard.counters.hits,
            misses: guard.counters.misses,
            evictions: guard.counters.evictions,
            expirations: guard.counters.expirations,
            inserts: guard.counters.inserts,
        }
    }
}
