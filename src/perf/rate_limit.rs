//! Per-identifier token-bucket rate limiter
//!
//! Generalizes a token-bucket rate limiter design from a fixed set of named
//! tool buckets to a keyed map of buckets — one per external
//! collection-membership query identifier — defaulting to 100/minute.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct TokenBucket {
    tokens: u32,
    max_tokens: u32,
    last_refill: Instant,
    refill_period: Duration,
}

impl TokenBucket {
    fn new(max_tokens: u32, refill_period: Duration) -> Self {
        Self {
            tokens: max_tokens,
            max_tokens,
            last_refill: Instant::now(),
            refill_period,
        }
    }

    fn try_consume(&mut self) -> bool {
        self.refill();
        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let elapsed = self.last_refill.elapsed();
        let refills = (elapsed.as_secs_f64() / self.refill_period.as_secs_f64()) as u32;
        if refills > 0 {
            self.tokens = (self.tokens + refills).min(self.max_tokens);
            self.last_refill = Instant::now();
        }
    }
}

/// Token-bucket rate limiter keyed per identifier (e.g. per collection
/// oracle or per tenant), default 100 requests/minute.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    max_tokens: u32,
    refill_period: Duration,
}

impl RateLimiter {
    pub fn new(max_tokens: u32, refill_period: Duration) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            max_tokens,
            refill_period,
        }
    }

    pub fn default_per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Returns `true` if a request under `identifier` is allowed now.
    pub fn try_acquire(&self, identifier: &str) -> bool {
        let mut buckets = self.buckets.lock();
        buckets
            .entry(identifier.to_string())
            .or_insert_with(|| TokenBucket::new(self.max_tokens, self.refill_period))
            .try_consume()
    }
}
