//! Result cache: TTL expiry + LRU eviction
//!
//! Generalizes the sibling example's `LLMCache`
//! (`ProdByBuddha-rust_agency/src/agent/cache.rs`, an
//! `Arc<RwLock<HashMap<CacheKey, String>>>`) into a keyed cache with TTL
//! expiry and capacity-bounded LRU eviction: "TTL 5
//! min; LRU eviction at 1,000 entries; hit counter per entry; aggressive
//! cleanup removes the lowest-hit 30%". Locking uses `parking_lot`,
//! matching this corpus's lock crate of choice (`euanmacinnes-clarium`).

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    last_hit: Instant,
    hits: u64,
}

/// A process-wide, TTL + LRU cache keyed by `K`.
pub struct TtlLruCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
    ttl: Duration,
    capacity: usize,
}

impl<K, V> TtlLruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            capacity,
        }
    }

    /// Fetch `key`, returning `None` on a miss or an expired entry. A hit
    /// bumps `last_hit` and the per-entry hit counter.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries.write();
        match entries.get_mut(key) {
            Some(entry) if now.duration_since(entry.inserted_at) <= self.ttl => {
                entry.last_hit = now;
                entry.hits += 1;
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert or overwrite `key`, evicting the least-recently-used entry
    /// first if this insert would exceed `capacity`.
    pub fn insert(&self, key: K, value: V) {
        let now = Instant::now();
        let mut entries = self.entries.write();
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            if let Some(lru_key) = entries
                .iter()
                .min_by_key(|(_, e)| e.last_hit)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&lru_key);
            }
        }
        entries.insert(
            key,
            Entry {
                value,
                inserted_at: now,
                last_hit: now,
                hits: 0,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Remove expired entries. Returns the number removed.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| now.duration_since(e.inserted_at) <= self.ttl);
        before - entries.len()
    }

    /// Aggressive cleanup under memory pressure: drop the lowest-hit 30%
    /// of entries. Returns the number evicted.
    pub fn aggressive_cleanup(&self) -> usize {
        let mut entries = self.entries.write();
        let drop_count = (entries.len() as f64 * 0.3).ceil() as usize;
        if drop_count == 0 {
            return 0;
        }
        let mut by_hits: Vec<(K, u64)> = entries.iter().map(|(k, e)| (k.clone(), e.hits)).collect();
        by_hits.sort_by_key(|(_, hits)| *hits);
        for (key, _) in by_hits.into_iter().take(drop_count) {
            entries.remove(&key);
        }
        drop_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get_hits() {
        let cache = TtlLruCache::new(Duration::from_secs(60), 10);
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let cache: TtlLruCache<&str, i32> = TtlLruCache::new(Duration::from_millis(0), 10);
        cache.insert("a", 1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = TtlLruCache::new(Duration::from_secs(60), 2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        // touch "a" so "b" becomes the LRU entry
        cache.get(&"a");
        cache.insert("c", 3);
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn aggressive_cleanup_drops_lowest_hit_entries() {
        let cache = TtlLruCache::new(Duration::from_secs(60), 100);
        for i in 0..10 {
            cache.insert(i, i);
        }
        // Give entries 5..10 extra hits so 0..5 are the "lowest-hit" group.
        for i in 5..10 {
            cache.get(&i);
        }
        let evicted = cache.aggressive_cleanup();
        assert_eq!(evicted, 3); // ceil(10 * 0.3)
        assert_eq!(cache.len(), 7);
    }
}
