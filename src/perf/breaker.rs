//! Per-operation circuit breaker
//!
//! Adapted from the sibling example's `TokenBucket`
//! (`ProdByBuddha-rust_agency/src/safety/rate_limiter.rs`, an
//! `Instant`-keyed refill bookkeeping struct) from "refill tokens over
//! time" to "count consecutive failures, then time out before allowing a
//! retry": `{closed, open, half_open}`, opens after N
//! consecutive failures (default 5), reopens an attempt after a timeout
//! (default 30s), closes on the first post-reopen success.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Breaker {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    threshold: u32,
    timeout: Duration,
}

impl Breaker {
    fn new(threshold: u32, timeout: Duration) -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            threshold,
            timeout,
        }
    }

    fn poll_state(&mut self) -> BreakerState {
        if self.state == BreakerState::Open {
            if let Some(opened_at) = self.opened_at {
                if opened_at.elapsed() >= self.timeout {
                    self.state = BreakerState::HalfOpen;
                }
            }
        }
        self.state
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.state = BreakerState::Closed;
        self.opened_at = None;
    }

    fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.state == BreakerState::HalfOpen || self.consecutive_failures >= self.threshold {
            self.state = BreakerState::Open;
            self.opened_at = Some(Instant::now());
        }
    }
}

/// Registry of per-operation breakers, keyed by an operation id string.
pub struct CircuitBreakerRegistry {
    breakers: Mutex<HashMap<String, Breaker>>,
    threshold: u32,
    timeout: Duration,
}

impl CircuitBreakerRegistry {
    pub fn new(threshold: u32, timeout: Duration) -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            threshold,
            timeout,
        }
    }

    /// Current state for `operation`, advancing `open -> half_open` if the
    /// timeout has elapsed.
    pub fn state(&self, operation: &str) -> BreakerState {
        let mut breakers = self.breakers.lock();
        let breaker = breakers
            .entry(operation.to_string())
            .or_insert_with(|| Breaker::new(self.threshold, self.timeout));
        breaker.poll_state()
    }

    /// Returns `true` if `operation` may proceed (i.e. is not `Open`).
    pub fn allow(&self, operation: &str) -> bool {
        self.state(operation) != BreakerState::Open
    }

    pub fn record_success(&self, operation: &str) {
        let mut breakers = self.breakers.lock();
        breakers
            .entry(operation.to_string())
            .or_insert_with(|| Breaker::new(self.threshold, self.timeout))
            .record_success();
    }

    pub fn record_failure(&self, operation: &str) {
        let mut breakers = self.breakers.lock();
        breakers
            .entry(operation.to_string())
            .or_insert_with(|| Breaker::new(self.threshold, self.timeout))
            .record_failure();
    }
}
