//! Collaborator interfaces
//!
//! Narrow traits the engine consumes but never implements itself —
//! ownership, collection membership, pricing, and rejection state all live
//! in a host's persistence layer. Keeping them as traits (rather than the
//! source's global singletons, per design note "Singleton process-wide
//! services") lets tests substitute trivial in-memory implementations.

use async_trait::async_trait;
use std::collections::BTreeSet;

/// Resolves which participant currently owns an item.
pub trait OwnershipOracle: Send + Sync {
    fn owner(&self, item: &str) -> Option<String>;
}

/// A lazily-iterated, size-known collection membership source.
///
/// `members` returns at most `limit` item ids chosen according to
/// `strategy`; the oracle — not the engine — decides how to pick them when
/// asked for fewer than the full membership (the engine only requests a
/// bounded `limit` once it has already decided to sample).
#[async_trait]
pub trait CollectionOracle: Send + Sync {
    async fn size(&self, collection: &str) -> Result<usize, String>;

    async fn members(
        &self,
        collection: &str,
        limit: usize,
        strategy: SamplingStrategy,
    ) -> Result<Vec<String>, String>;
}

/// Bias applied when a collection oracle is asked for fewer items than its
/// full membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingStrategy {
    /// No bias; oracle may return any valid subset.
    Arbitrary,
    /// Bias toward items whose owners are reachable from a participant in
    /// at most `hops` hops.
    ReachabilityBiased { hops: u32 },
    /// Bias toward items with recent trade activity.
    RecentActivityBiased,
}

/// Optional pricing collaborator used to weight `quality_score`.
#[async_trait]
pub trait PricingOracle: Send + Sync {
    async fn price(&self, item: &str) -> Result<f64, String>;
}

/// Per-participant rejection preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rejections {
    pub rejected_items: BTreeSet<String>,
    pub rejected_participants: BTreeSet<String>,
}

pub trait RejectionStore: Send + Sync {
    fn rejections(&self, participant: &str) -> Rejections;
}

/// Trivial in-memory oracles for tests and small embeddings.
pub mod memory {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, Default)]
    pub struct InMemoryOwnership {
        pub owner_of: BTreeMap<String, String>,
    }

    impl OwnershipOracle for InMemoryOwnership {
        fn owner(&self, item: &str) -> Option<String> {
            self.owner_of.get(item).cloned()
        }
    }

    #[derive(Debug, Clone, Default)]
    pub struct InMemoryCollections {
        pub members_of: BTreeMap<String, Vec<String>>,
    }

    #[async_trait]
    impl CollectionOracle for InMemoryCollections {
        async fn size(&self, collection: &str) -> Result<usize, String> {
            Ok(self.members_of.get(collection).map(|v| v.len()).unwrap_or(0))
        }

        async fn members(
            &self,
            collection: &str,
            limit: usize,
            _strategy: SamplingStrategy,
        ) -> Result<Vec<String>, String> {
            Ok(self
                .members_of
                .get(collection)
                .map(|v| v.iter().take(limit).cloned().collect())
                .unwrap_or_default())
        }
    }

    #[derive(Debug, Clone, Default)]
    pub struct InMemoryRejections {
        pub rejections_of: BTreeMap<String, Rejections>,
    }

    impl RejectionStore for InMemoryRejections {
        fn rejections(&self, participant: &str) -> Rejections {
            self.rejections_of.get(participant).cloned().unwrap_or_default()
        }
    }
}
