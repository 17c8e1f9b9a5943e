//! Collection want expansion
//!
//! Turns "wallet W wants any item from collection C" into concrete
//! `(W wants item)` edges. Runs as bounded-concurrency async work over the
//! `CollectionOracle` collaborator, matching this crate's async
//! collaborator discipline (`src/oracles.rs`).

use crate::error::{EngineError, EngineResult};
use crate::graph::types::Provenance;
use crate::oracles::{CollectionOracle, OwnershipOracle, Rejections, RejectionStore, SamplingStrategy};
use crate::perf::RateLimiter;
use crate::rng::DeterministicRng;
use futures_util::stream::{self, StreamExt};
use std::collections::BTreeMap;

/// Configuration for collection expansion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionExpansionConfig {
    pub max_collection_size: usize,
    pub fallback_to_sampling: bool,
    pub max_total_expansion_per_request: usize,
    /// Bounded concurrency for oracle calls within one expansion pass.
    pub max_concurrent_lookups: usize,
}

impl Default for CollectionExpansionConfig {
    fn default() -> Self {
        Self {
            max_collection_size: 1_000,
            fallback_to_sampling: true,
            max_total_expansion_per_request: 5_000,
            max_concurrent_lookups: 16,
        }
    }
}

/// One expanded `(wanter, item)` pair with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedWant {
    pub wanter: String,
    pub item: String,
    pub provenance: Provenance,
}

/// Outcome of one expansion pass: the pairs materialized plus any
/// recoverable signals (`ExpansionBudgetExceeded` is
/// recoverable, `CollectionUnavailable` is per-pair and does not abort the
/// rest of the pass).
#[derive(Debug, Clone, Default)]
pub struct ExpansionOutcome {
    pub pairs: Vec<ExpandedWant>,
    pub budget_exceeded: bool,
    pub unavailable_collections: Vec<String>,
}

/// Sampled-subset size formula: for very large collections, grow
/// sub-linearly (`floor(log10(|C|) * 100)`); otherwise take a flat 10%
/// slice. Always capped at `max_collection_size`.
fn sample_size(collection_size: usize, max_collection_size: usize) -> usize {
    let formula_size = if collection_size > 10_000 {
        ((collection_size as f64).log10() * 100.0).floor() as usize
    } else {
        (0.1 * collection_size as f64).floor() as usize
    };
    formula_size.min(max_collection_size).max(1).min(collection_size)
}

/// Expand every `(participant, collection)` want in `wants` into concrete
/// edges, respecting rejections and the global expansion budget.
pub async fn expand_collection_wants(
    wants: &BTreeMap<String, Vec<String>>,
    ownership: &dyn OwnershipOracle,
    rejections: &dyn RejectionStore,
    collections: &dyn CollectionOracle,
    rate_limiter: &RateLimiter,
    config: CollectionExpansionConfig,
) -> ExpansionOutcome {
    let mut requests: Vec<(String, String)> = Vec::new();
    for (participant, collection_ids) in wants {
        for collection in collection_ids {
            requests.push((participant.clone(), collection.clone()));
        }
    }

    let results: Vec<EngineResult<(String, String, Vec<String>)>> = stream::iter(requests)
        .map(|(participant, collection)| async move {
            expand_one(
                &participant,
                &collection,
                ownership,
                rejections,
                collections,
                rate_limiter,
                config,
            )
            .await
            .map(|items| (participant, collection, items))
        })
        .buffer_unordered(config.max_concurrent_lookups.max(1))
        .collect()
        .await;

    let mut outcome = ExpansionOutcome::default();
    let mut total = 0usize;
    for result in results {
        match result {
            Ok((participant, collection, items)) => {
                for item in items {
                    if total >= config.max_total_expansion_per_request {
                        outcome.budget_exceeded = true;
                        break;
                    }
                    outcome.pairs.push(ExpandedWant {
                        wanter: participant.clone(),
                        item,
                        provenance: Provenance {
                            source_collection: collection.clone(),
                            expanded_from: participant.clone(),
                        },
                    });
                    total += 1;
                }
            }
            Err(EngineError::CollectionUnavailable { collection, .. }) => {
                outcome.unavailable_collections.push(collection);
            }
            Err(_) => {}
        }
        if outcome.budget_exceeded {
            break;
        }
    }
    outcome
}

async fn expand_one(
    participant: &str,
    collection: &str,
    ownership: &dyn OwnershipOracle,
    rejections: &dyn RejectionStore,
    collections: &dyn CollectionOracle,
    rate_limiter: &RateLimiter,
    config: CollectionExpansionConfig,
) -> EngineResult<Vec<String>> {
    if !rate_limiter.try_acquire(collection) {
        return Err(EngineError::CollectionUnavailable {
            collection: collection.to_string(),
            source: "rate limited".to_string(),
        });
    }

    let size = collections
        .size(collection)
        .await
        .map_err(|source| EngineError::CollectionUnavailable {
            collection: collection.to_string(),
            source,
        })?;

    if size == 0 {
        return Ok(Vec::new());
    }

    let rejection_set: Rejections = rejections.rejections(participant);

    let items = if size <= config.max_collection_size {
        collections
            .members(collection, size, SamplingStrategy::Arbitrary)
            .await
            .map_err(|source| EngineError::CollectionUnavailable {
                collection: collection.to_string(),
                source,
            })?
    } else if config.fallback_to_sampling {
        let want = sample_size(size, config.max_collection_size);
        let seed = DeterministicRng::seed_from_pair(participant, collection);
        tracing::debug!(collection, size, want, "collection oversized, falling back to sampling");
        let candidates = collections
            .members(
                collection,
                want,
                SamplingStrategy::ReachabilityBiased { hops: 2 },
            )
            .await
            .map_err(|source| EngineError::CollectionUnavailable {
                collection: collection.to_string(),
                source,
            })?;
        // The oracle may hand back more than `want` (its own notion of a
        // "reachability-biased" batch needn't match our cap exactly); take
        // the final cut deterministically rather than trusting oracle order.
        DeterministicRng::new(seed).sample_subset(candidates, want)
    } else {
        return Ok(Vec::new());
    };

    let filtered = items
        .into_iter()
        .filter(|item| {
            let owned_by_other = ownership.owner(item).map(|o| o != participant).unwrap_or(false);
            owned_by_other
                && !rejection_set.rejected_items.contains(item)
                && ownership
                    .owner(item)
                    .map(|o| !rejection_set.rejected_participants.contains(&o))
                    .unwrap_or(true)
        })
        .collect();

    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracles::memory::{InMemoryCollections, InMemoryOwnership, InMemoryRejections};

    #[tokio::test]
    async fn small_collection_materializes_fully_minus_owner() {
        let collections = InMemoryCollections {
            members_of: [(
                "C".to_string(),
                vec!["n1".to_string(), "n2".to_string(), "n3".to_string()],
            )]
            .into_iter()
            .collect(),
        };
        let ownership = InMemoryOwnership {
            owner_of: [
                ("n1".to_string(), "alice".to_string()),
                ("n2".to_string(), "bob".to_string()),
                ("n3".to_string(), "alice".to_string()),
            ]
            .into_iter()
            .collect(),
        };
        let rejections = InMemoryRejections::default();
        let mut wants = BTreeMap::new();
        wants.insert("alice".to_string(), vec!["C".to_string()]);

        let rate_limiter = RateLimiter::default_per_minute(100);
        let outcome = expand_collection_wants(
            &wants,
            &ownership,
            &rejections,
            &collections,
            &rate_limiter,
            CollectionExpansionConfig::default(),
        )
        .await;

        // n1, n3 are owned by alice herself and excluded; only n2 remains.
        assert_eq!(outcome.pairs.len(), 1);
        assert_eq!(outcome.pairs[0].item, "n2");
        assert!(!outcome.budget_exceeded);
    }

    #[test]
    fn sample_size_respects_cap_and_large_collection_formula() {
        assert_eq!(sample_size(100_000, 1_000), 500); // floor(log10(100000)*100) = 500
        assert_eq!(sample_size(200, 1_000), 20); // floor(0.1*200)
        assert_eq!(sample_size(50_000_000, 1_000), 1_000); // capped
    }

    #[tokio::test]
    async fn global_budget_stops_expansion() {
        let collections = InMemoryCollections {
            members_of: [("C".to_string(), (0..50).map(|i| format!("n{i}")).collect())]
                .into_iter()
                .collect(),
        };
        let ownership = InMemoryOwnership {
            owner_of: (0..50).map(|i| (format!("n{i}"), "bob".to_string())).collect(),
        };
        let rejections = InMemoryRejections::default();
        let mut wants = BTreeMap::new();
        wants.insert("alice".to_string(), vec!["C".to_string()]);

        let config = CollectionExpansionConfig {
            max_total_expansion_per_request: 5,
            ..Default::default()
        };
        let rate_limiter = RateLimiter::default_per_minute(100);
        let outcome = expand_collection_wants(
            &wants,
            &ownership,
            &rejections,
            &collections,
            &rate_limiter,
            config,
        )
        .await;
        assert_eq!(outcome.pairs.len(), 5);
        assert!(outcome.budget_exceeded);
    }

    #[tokio::test]
    async fn exhausted_rate_limit_marks_collection_unavailable() {
        let collections = InMemoryCollections {
            members_of: [("C".to_string(), vec!["n1".to_string()])].into_iter().collect(),
        };
        let ownership = InMemoryOwnership {
            owner_of: [("n1".to_string(), "bob".to_string())].into_iter().collect(),
        };
        let rejections = InMemoryRejections::default();
        let mut wants = BTreeMap::new();
        wants.insert("alice".to_string(), vec!["C".to_string()]);

        let rate_limiter = RateLimiter::default_per_minute(0);
        let outcome = expand_collection_wants(
            &wants,
            &ownership,
            &rejections,
            &collections,
            &rate_limiter,
            CollectionExpansionConfig::default(),
        )
        .await;
        assert!(outcome.pairs.is_empty());
        assert_eq!(outcome.unavailable_collections, vec!["C".to_string()]);
    }
}
