//! Bulk batching queue
//!
//! Coalesces externally submitted requests per key, flushing at a batch
//! size (default 100) or a max-wait (default 1s). Follows the same per-key
//! `parking_lot::Mutex` discipline as `perf::cache` and `perf::breaker`
//! rather than a single process-wide lock, so unrelated keys never
//! contend.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

struct Pending<T> {
    items: Vec<T>,
    opened_at: Instant,
}

/// A per-key coalescing queue. `submit` returns the accumulated batch once
/// either bound is crossed, `None` otherwise — the caller is responsible
/// for actually dispatching a returned batch.
pub struct BatchQueue<K, T> {
    pending: Mutex<HashMap<K, Pending<T>>>,
    max_batch_size: usize,
    max_wait: Duration,
}

impl<K, T> BatchQueue<K, T>
where
    K: Eq + Hash + Clone,
{
    pub fn new(max_batch_size: usize, max_wait: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            max_batch_size,
            max_wait,
        }
    }

    pub fn default_bounds() -> Self {
        Self::new(100, Duration::from_secs(1))
    }

    /// Submit one item under `key`. Returns `Some(batch)` if this submission
    /// crossed the size bound, or if an earlier-opened batch under `key` has
    /// exceeded `max_wait` (checked at submission time, not on a timer).
    pub fn submit(&self, key: K, item: T) -> Option<Vec<T>> {
        let mut pending = self.pending.lock();
        let entry = pending.entry(key.clone()).or_insert_with(|| Pending {
            items: Vec::new(),
            opened_at: Instant::now(),
        });
        entry.items.push(item);

        let size_exceeded = entry.items.len() >= self.max_batch_size;
        let time_exceeded = entry.opened_at.elapsed() >= self.max_wait;

        if size_exceeded || time_exceeded {
            let flushed = pending.remove(&key).expect("entry just inserted above");
            Some(flushed.items)
        } else {
            None
        }
    }

    /// Force-flush `key` regardless of bounds (used for shutdown / explicit
    /// drains). Returns `None` if nothing is pending.
    pub fn flush(&self, key: &K) -> Option<Vec<T>> {
        self.pending.lock().remove(key).map(|p| p.items)
    }

    pub fn pending_len(&self, key: &K) -> usize {
        self.pending.lock().get(key).map(|p| p.items.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flushes_at_batch_size() {
        let queue: BatchQueue<&str, i32> = BatchQueue::new(3, Duration::from_secs(60));
        assert_eq!(queue.submit("k", 1), None);
        assert_eq!(queue.submit("k", 2), None);
        assert_eq!(queue.submit("k", 3), Some(vec![1, 2, 3]));
        assert_eq!(queue.pending_len(&"k"), 0);
    }

    #[test]
    fn flushes_at_max_wait() {
        let queue: BatchQueue<&str, i32> = BatchQueue::new(100, Duration::from_millis(1));
        assert_eq!(queue.submit("k", 1), None);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(queue.submit("k", 2), Some(vec![1, 2]));
    }

    #[test]
    fn keys_are_independent() {
        let queue: BatchQueue<&str, i32> = BatchQueue::new(2, Duration::from_secs(60));
        assert_eq!(queue.submit("a", 1), None);
        assert_eq!(queue.submit("b", 1), None);
        assert_eq!(queue.pending_len(&"a"), 1);
        assert_eq!(queue.pending_len(&"b"), 1);
    }
}
