//! Engine settings
//!
//! Tunable engine settings, with documented defaults. `configure` performs
//! a bounded hot-reload: only the fields present in a
//! `PartialEngineSettings` are overwritten.

use serde::{Deserialize, Serialize};

/// Full settings accepted by `discover_trades` / `configure`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Hard upper bound on cycle length `k`.
    pub max_depth: usize,
    /// Wall-clock budget per discovery call, in milliseconds.
    pub timeout_ms: u64,
    /// Cap on canonical cycles materialized per enumerated group.
    pub max_cycles_per_group: usize,
    /// Cycles below this efficiency (`1/k`) are dropped.
    pub min_efficiency: f64,
    /// Whether collection wants are expanded into concrete edges.
    pub enable_collection_expansion: bool,
    /// Whether community partitioning bounds the search inside large SCCs.
    pub enable_community_partition: bool,
    /// Collections at or under this size are materialized in full.
    pub max_collection_size: usize,
    /// Whether oversized collections fall back to sampling instead of
    /// being skipped outright.
    pub fallback_to_sampling: bool,
    /// Global cap on expanded `(wanter, item)` pairs per build.
    pub max_expansion_per_request: usize,
    /// Result-cache entry lifetime, in milliseconds.
    pub cache_ttl_ms: u64,
    /// Circuit breaker: consecutive failures before an operation opens.
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker: time before an open breaker allows a retry attempt.
    pub circuit_breaker_timeout_ms: u64,
    /// Cap on the overall result count returned to the caller after
    /// merging and deduplicating all groups.
    pub max_cycles: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_depth: 10,
            timeout_ms: 30_000,
            max_cycles_per_group: 100,
            min_efficiency: 0.6,
            enable_collection_expansion: true,
            enable_community_partition: true,
            max_collection_size: 1_000,
            fallback_to_sampling: true,
            max_expansion_per_request: 5_000,
            cache_ttl_ms: 300_000,
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout_ms: 30_000,
            max_cycles: 500,
        }
    }
}

/// Partial settings update for `configure`/hot-reload: every field left
/// `None` keeps the engine's current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialEngineSettings {
    pub max_depth: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub max_cycles_per_group: Option<usize>,
    pub min_efficiency: Option<f64>,
    pub enable_collection_expansion: Option<bool>,
    pub enable_community_partition: Option<bool>,
    pub max_collection_size: Option<usize>,
    pub fallback_to_sampling: Option<bool>,
    pub max_expansion_per_request: Option<usize>,
    pub cache_ttl_ms: Option<u64>,
    pub circuit_breaker_threshold: Option<u32>,
    pub circuit_breaker_timeout_ms: Option<u64>,
    pub max_cycles: Option<usize>,
}

impl EngineSettings {
    /// Apply a partial update in place, overwriting only fields that are
    /// `Some` in `partial`.
    pub fn merge(&mut self, partial: PartialEngineSettings) {
        if let Some(v) = partial.max_depth {
            self.max_depth = v;
        }
        if let Some(v) = partial.timeout_ms {
            self.timeout_ms = v;
        }
        if let Some(v) = partial.max_cycles_per_group {
            self.max_cycles_per_group = v;
        }
        if let Some(v) = partial.min_efficiency {
            self.min_efficiency = v;
        }
        if let Some(v) = partial.enable_collection_expansion {
            self.enable_collection_expansion = v;
        }
        if let Some(v) = partial.enable_community_partition {
            self.enable_community_partition = v;
        }
        if let Some(v) = partial.max_collection_size {
            self.max_collection_size = v;
        }
        if let Some(v) = partial.fallback_to_sampling {
            self.fallback_to_sampling = v;
        }
        if let Some(v) = partial.max_expansion_per_request {
            self.max_expansion_per_request = v;
        }
        if let Some(v) = partial.cache_ttl_ms {
            self.cache_ttl_ms = v;
        }
        if let Some(v) = partial.circuit_breaker_threshold {
            self.circuit_breaker_threshold = v;
        }
        if let Some(v) = partial.circuit_breaker_timeout_ms {
            self.circuit_breaker_timeout_ms = v;
        }
        if let Some(v) = partial.max_cycles {
            self.max_cycles = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let s = EngineSettings::default();
        assert_eq!(s.max_depth, 10);
        assert_eq!(s.timeout_ms, 30_000);
        assert_eq!(s.max_cycles_per_group, 100);
        assert!((s.min_efficiency - 0.6).abs() < f64::EPSILON);
        assert_eq!(s.max_collection_size, 1_000);
        assert_eq!(s.max_expansion_per_request, 5_000);
    }

    #[test]
    fn merge_overwrites_only_present_fields() {
        let mut s = EngineSettings::default();
        s.merge(PartialEngineSettings {
            max_depth: Some(4),
            ..Default::default()
        });
        assert_eq!(s.max_depth, 4);
        assert_eq!(s.timeout_ms, 30_000);
    }
}
