//! In-memory cache for storing key-value pairs.
//!
//! Uses moka's high-performance concurrent cache implementation.

use moka::sync::Cache;

/// Thread-safe in-memory cache with configurable capacity.
///
/// Used for storing:
/// - Per contact/channel traversal locks (`MemCache<String, Arc<Mutex<()>>>`)
/// - Loaded flow graphs keyed by flow id and version (`MemCache<String, Arc<FlowGraph>>`)
///
/// The cache is backed by moka, which provides:
/// - Thread-safe concurrent access
/// - LRU eviction when capacity is exceeded
#[derive(Clone)]
pub struct MemCache<K, V> {
    entries: Cache<K, V>,
}

impl<K, V> MemCache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Allocate a new [`MemCache`].
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Cache::new(capacity as u64),
        }
    }

    /// Insert a value.
    pub fn set(
        &self,
        key: K,
        value: V,
    ) {
        self.entries.insert(key, value);
    }

    /// Get a value through key `&K`.
    pub fn get(
        &self,
        key: &K,
    ) -> Option<V> {
        self.entries.get(key)
    }

    /// Get the value for `key`, inserting the one produced by `init` if absent.
    ///
    /// Concurrent callers for the same key observe the same inserted value.
    pub fn get_with(
        &self,
        key: K,
        init: impl FnOnce() -> V,
    ) -> V {
        self.entries.get_with(key, init)
    }

}
