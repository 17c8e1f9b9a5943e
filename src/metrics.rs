//! Process-wide metrics surfaced through `metrics()`

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time snapshot returned by `Engine::metrics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub discover_calls: u64,
    pub mutation_calls: u64,
    pub cycles_discovered_total: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub circuit_breaker_trips: u64,
    pub dead_letter_count: u64,
}

/// Atomic counters backing `MetricsSnapshot`; cheap to update from any
/// thread without a lock, read into a consistent-enough snapshot for
/// observability (not a transactional read).
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    discover_calls: AtomicU64,
    mutation_calls: AtomicU64,
    cycles_discovered_total: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    circuit_breaker_trips: AtomicU64,
    dead_letter_count: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_discover_call(&self) {
        self.discover_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mutation_call(&self) {
        self.mutation_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cycles_discovered(&self, count: u64) {
        self.cycles_discovered_total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_circuit_breaker_trip(&self) {
        self.circuit_breaker_trips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dead_letter(&self) {
        self.dead_letter_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            discover_calls: self.discover_calls.load(Ordering::Relaxed),
            mutation_calls: self.mutation_calls.load(Ordering::Relaxed),
            cycles_discovered_total: self.cycles_discovered_total.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            circuit_breaker_trips: self.circuit_breaker_trips.load(Ordering::Relaxed),
            dead_letter_count: self.dead_letter_count.load(Ordering::Relaxed),
        }
    }
}
