use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::EngineSettings;
#[allow(unused_imports)]
use crate::config::DEBUG_FLAGS;
use crate::domain::Timeframe;
use crate::models::{AnalysisParams, LevelAnalysis};

// --- The cache key struct ---
/// Symbol, timeframe and the parameter signature of a request.
#[derive(Clone, Debug)]
pub struct CacheKey {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub min_strength: f64,
    pub max_levels: usize,
    pub project_future: bool,
    pub projection_periods: usize,
    pub lookback_days: u32,
}

impl CacheKey {
    pub fn new(symbol: &str, params: &AnalysisParams) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe: params.timeframe,
            min_strength: params.min_strength,
            max_levels: params.max_levels,
            project_future: params.project_future,
            projection_periods: params.projection_periods,
            lookback_days: params.effective_lookback_days(),
        }
    }
}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.symbol.hash(state);
        self.timeframe.hash(state);
        self.min_strength.to_bits().hash(state);
        self.max_levels.hash(state);
        self.project_future.hash(state);
        self.projection_periods.hash(state);
        self.lookback_days.hash(state);
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol
            && self.timeframe == other.timeframe
            && self.min_strength.to_bits() == other.min_strength.to_bits()
            && self.max_levels == other.max_levels
            && self.project_future == other.project_future
            && self.projection_periods == other.projection_periods
            && self.lookback_days == other.lookback_days
    }
}

impl Eq for CacheKey {}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} @ {} [min {:.1}, max {}, {}d{}]",
            self.symbol,
            self.timeframe,
            self.min_strength,
            self.max_levels,
            self.lookback_days,
            if self.project_future {
                format!(", +{} periods", self.projection_periods)
            } else {
                String::new()
            }
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries removed for capacity, expiry or explicit eviction
    pub evictions: u64,
}

struct CacheEntry {
    value: Arc<LevelAnalysis>,
    created_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    stats: CacheStats,
}

/// Bounded TTL cache of analysis results.
///
/// Clones share the same storage. On capacity the least recently populated entry
/// is evicted. Per-key async locks let the engine keep one computation in flight
/// per key.
pub struct LevelCache {
    ttl: Duration,
    capacity: usize,
    state: Arc<Mutex<CacheState>>,
    key_locks: Arc<Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>>,
}

impl Clone for LevelCache {
    fn clone(&self) -> Self {
        Self {
            ttl: self.ttl,
            capacity: self.capacity,
            // Clone the Arc, not the HashMap - this shares the cache!
            state: Arc::clone(&self.state),
            key_locks: Arc::clone(&self.key_locks),
        }
    }
}

impl Default for LevelCache {
    fn default() -> Self {
        Self::from_settings(&crate::config::ANALYSIS.engine)
    }
}

impl LevelCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            state: Arc::new(Mutex::new(CacheState::default())),
            key_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(settings.cache_ttl(), settings.cache_capacity)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fresh entry for `key`. Expired entries are removed and count as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<LevelAnalysis>> {
        let mut guard = self.state.lock().ok()?;
        let state = &mut *guard;

        let expired = match state.entries.get(key) {
            Some(entry) if entry.created_at.elapsed() < self.ttl => {
                let value = Arc::clone(&entry.value);
                state.stats.hits += 1;
                #[cfg(debug_assertions)]
                if DEBUG_FLAGS.print_cache_events {
                    log::info!("Level cache HIT for {}", key);
                }
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            state.entries.remove(key);
            state.stats.evictions += 1;
        }
        state.stats.misses += 1;
        #[cfg(debug_assertions)]
        if DEBUG_FLAGS.print_cache_events {
            log::info!(
                "Level cache MISS for {}{}",
                key,
                if expired { " (expired)" } else { "" }
            );
        }
        None
    }

    pub fn insert(&self, key: CacheKey, value: Arc<LevelAnalysis>) {
        if let Ok(mut state) = self.state.lock() {
            if !state.entries.contains_key(&key) && state.entries.len() >= self.capacity {
                let oldest = state
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.created_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    state.entries.remove(&oldest);
                    state.stats.evictions += 1;
                    #[cfg(debug_assertions)]
                    if DEBUG_FLAGS.print_cache_events {
                        log::info!("Level cache full ({}): evicted {}", self.capacity, oldest);
                    }
                }
            }
            state.entries.insert(
                key,
                CacheEntry {
                    value,
                    created_at: Instant::now(),
                },
            );
        }
    }

    /// Remove one entry. Returns whether it was present.
    pub fn evict(&self, key: &CacheKey) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        let removed = state.entries.remove(key).is_some();
        if removed {
            state.stats.evictions += 1;
        }
        removed
    }

    /// Drop all expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let removed = match self.state.lock() {
            Ok(mut state) => {
                let before = state.entries.len();
                let ttl = self.ttl;
                state.entries.retain(|_, entry| entry.created_at.elapsed() < ttl);
                let removed = before - state.entries.len();
                state.stats.evictions += removed as u64;
                removed
            }
            Err(_) => 0,
        };
        self.prune_idle_locks();
        removed
    }

    // Clears the entire cache e.g. if source data was replaced while running
    pub fn clear(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.entries.clear();
        }
        self.prune_idle_locks();
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.state.lock().map(|s| s.stats).unwrap_or_default()
    }

    /// Async lock serialising computations for one key.
    pub fn key_lock(&self, key: &CacheKey) -> Arc<tokio::sync::Mutex<()>> {
        match self.key_locks.lock() {
            Ok(mut locks) => Arc::clone(locks.entry(key.clone()).or_default()),
            // A poisoned registry still must not allow concurrent work to go unserialised
            Err(poisoned) => Arc::clone(poisoned.into_inner().entry(key.clone()).or_default()),
        }
    }

    /// Hand back a lock taken with `key_lock`. The registry entry is removed once no
    /// other caller holds or waits on it. Drop any guard on `lock` first.
    pub fn release_key_lock(&self, key: &CacheKey, lock: Arc<tokio::sync::Mutex<()>>) {
        if let Ok(mut locks) = self.key_locks.lock() {
            let idle = locks
                .get(key)
                .is_some_and(|held| Arc::ptr_eq(held, &lock) && Arc::strong_count(held) == 2);
            if idle {
                locks.remove(key);
            }
        }
    }

    /// Keys with a registered computation lock.
    pub fn key_lock_count(&self) -> usize {
        self.key_locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    fn prune_idle_locks(&self) {
        if let Ok(mut locks) = self.key_locks.lock() {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnalysisMetadata;

    fn analysis(symbol: &str) -> Arc<LevelAnalysis> {
        Arc::new(LevelAnalysis::empty(symbol, 100.0, AnalysisMetadata::default()))
    }

    fn key(symbol: &str) -> CacheKey {
        CacheKey::new(symbol, &AnalysisParams::default())
    }

    #[test]
    fn test_key_includes_parameter_signature() {
        let base = AnalysisParams::default();
        let mut stricter = base.clone();
        stricter.min_strength = 60.0;
        assert_eq!(CacheKey::new("BTC", &base), CacheKey::new("BTC", &base.clone()));
        assert_ne!(CacheKey::new("BTC", &base), CacheKey::new("BTC", &stricter));
        assert_ne!(CacheKey::new("BTC", &base), CacheKey::new("ETH", &base));
        assert_ne!(
            CacheKey::new("BTC", &base),
            CacheKey::new("BTC", &base.clone().with_projection(20))
        );
    }

    #[test]
    fn test_hit_returns_same_arc() {
        let cache = LevelCache::new(Duration::from_secs(60), 4);
        let value = analysis("BTC");
        cache.insert(key("BTC"), Arc::clone(&value));

        let hit = cache.get(&key("BTC")).unwrap();
        assert!(Arc::ptr_eq(&hit, &value));
        assert!(cache.get(&key("ETH")).is_none());
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                evictions: 0
            }
        );
    }

    #[test]
    fn test_expired_entries_are_misses() {
        let cache = LevelCache::new(Duration::from_millis(20), 4);
        cache.insert(key("BTC"), analysis("BTC"));
        std::thread::sleep(Duration::from_millis(40));

        assert!(cache.get(&key("BTC")).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_capacity_evicts_least_recently_populated() {
        let cache = LevelCache::new(Duration::from_secs(60), 2);
        cache.insert(key("A"), analysis("A"));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(key("B"), analysis("B"));
        std::thread::sleep(Duration::from_millis(2));
        // Reading A does not refresh its population time
        assert!(cache.get(&key("A")).is_some());
        cache.insert(key("C"), analysis("C"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("A")).is_none());
        assert!(cache.get(&key("B")).is_some());
        assert!(cache.get(&key("C")).is_some());
    }

    #[test]
    fn test_evict_purge_and_clear() {
        let cache = LevelCache::new(Duration::from_millis(30), 8);
        cache.insert(key("A"), analysis("A"));
        assert!(cache.evict(&key("A")));
        assert!(!cache.evict(&key("A")));

        cache.insert(key("B"), analysis("B"));
        std::thread::sleep(Duration::from_millis(50));
        cache.insert(key("C"), analysis("C"));
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);

        let shared = cache.clone();
        shared.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_key_lock_is_shared_per_key() {
        let cache = LevelCache::default();
        let first = cache.key_lock(&key("BTC"));
        let second = cache.key_lock(&key("BTC"));
        assert!(Arc::ptr_eq(&first, &second));

        let _guard = first.lock().await;
        assert!(second.try_lock().is_err());
        assert!(cache.key_lock(&key("ETH")).try_lock().is_ok());
    }

    #[test]
    fn test_released_lock_leaves_registry_when_idle() {
        let cache = LevelCache::default();
        let first = cache.key_lock(&key("BTC"));
        let waiter = cache.key_lock(&key("BTC"));

        // Another caller still holds the lock, so it stays registered
        cache.release_key_lock(&key("BTC"), first);
        assert_eq!(cache.key_lock_count(), 1);

        cache.release_key_lock(&key("BTC"), waiter);
        assert_eq!(cache.key_lock_count(), 0);
    }
}
