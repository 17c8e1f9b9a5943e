//! The trade graph: a read-only, immutable snapshot once built
//!
//! Generalizes the `AggregatedGraph` style used elsewhere in this codebase
//! for settlement netting — which interns agent ids to stable indices and
//! stores a `BTreeMap`-backed adjacency for deterministic sorted iteration —
//! from a single scalar edge weight (summed payment amount) to the richer
//! per-edge `EdgeData`, and from one edge per `(sender, receiver)` pair to
//! possibly many (one per wanted item, for parallel want relationships
//! between the same two participants).
//!
//! Mutation is exclusive to `GraphBuilder`; every method
//! here takes `&self`.

use super::types::{EdgeData, GraphStats, ItemId, ParticipantId};
use std::collections::BTreeMap;

/// An immutable, built trade graph.
///
/// # Invariants (enforced by the builder, relied on here)
/// - Every edge's item has a current owner equal to the edge's source.
/// - No self-edges (`owner == wanter` never produces an edge).
/// - Neighbor lists are sorted by `ParticipantId` and, within a neighbor,
///   edges are sorted by `ItemId` — required for the enumerator's
///   deterministic iteration order.
#[derive(Debug, Clone)]
pub struct TradeGraph {
    pub(crate) participant_names: Vec<String>,
    pub(crate) participant_ids: BTreeMap<String, ParticipantId>,
    pub(crate) item_names: Vec<String>,
    pub(crate) item_ids: BTreeMap<String, ItemId>,
    /// ItemId -> owning ParticipantId, a total function over known items.
    pub(crate) item_owner: Vec<Option<ParticipantId>>,
    /// ParticipantId -> sorted adjacency: neighbor ParticipantId -> edges
    /// (sorted by item), generalizing `AggregatedGraph::adj`.
    pub(crate) adjacency: Vec<BTreeMap<ParticipantId, Vec<EdgeData>>>,
    /// ItemId -> set of wanter ParticipantIds, for `wanters()`.
    pub(crate) item_wanters: Vec<Vec<ParticipantId>>,
    pub(crate) has_collection_support: bool,
}

impl TradeGraph {
    /// All participant ids that appear in the graph, in the order assigned
    /// at build time (ascending lexicographic by construction, mirroring
    /// `AggregatedGraph`'s "assign indices in lexicographic order").
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.participant_names.iter().map(String::as_str)
    }

    pub fn participant_count(&self) -> usize {
        self.participant_names.len()
    }

    pub(crate) fn participant_id(&self, name: &str) -> Option<ParticipantId> {
        self.participant_ids.get(name).copied()
    }

    pub(crate) fn participant_name(&self, id: ParticipantId) -> &str {
        &self.participant_names[id.0 as usize]
    }

    pub(crate) fn item_id(&self, item: &str) -> Option<ItemId> {
        self.item_ids.get(item).copied()
    }

    /// Outgoing edges from `participant`, keyed by wanter, sorted by
    /// wanter id and then, within a wanter, by item id.
    pub fn out_edges(&self, participant: &str) -> Vec<(String, Vec<EdgeData>)> {
        let Some(id) = self.participant_id(participant) else {
            return Vec::new();
        };
        self.adjacency[id.0 as usize]
            .iter()
            .map(|(wanter, edges)| (self.participant_name(*wanter).to_string(), edges.clone()))
            .collect()
    }

    pub(crate) fn out_edges_by_id(&self, id: ParticipantId) -> &BTreeMap<ParticipantId, Vec<EdgeData>> {
        &self.adjacency[id.0 as usize]
    }

    /// All participants wanting `item`, i.e. all `w` such that an edge
    /// `owner(item) -> w` carrying `item` exists.
    pub fn wanters(&self, item: &str) -> Vec<String> {
        let Some(id) = self.item_id(item) else {
            return Vec::new();
        };
        self.item_wanters[id.0 as usize]
            .iter()
            .map(|p| self.participant_name(*p).to_string())
            .collect()
    }

    /// Current owner of `item`, if the item is known to this graph.
    pub fn owner(&self, item: &str) -> Option<String> {
        let id = self.item_id(item)?;
        self.item_owner[id.0 as usize].map(|p| self.participant_name(p).to_string())
    }

    /// The first edge (lowest item id) from `from` to `to`, if any. Use
    /// `edges` for the full parallel-edge set.
    pub fn edge(&self, from: &str, to: &str) -> Option<EdgeData> {
        self.edges(from, to).into_iter().next()
    }

    /// All edges from `from` to `to` (one per distinct wanted item), sorted
    /// by item id.
    pub fn edges(&self, from: &str, to: &str) -> Vec<EdgeData> {
        let (Some(from_id), Some(to_id)) = (self.participant_id(from), self.participant_id(to)) else {
            return Vec::new();
        };
        self.adjacency[from_id.0 as usize]
            .get(&to_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn stats(&self) -> GraphStats {
        let edge_count: usize = self
            .adjacency
            .iter()
            .flat_map(|m| m.values())
            .map(|edges| edges.len())
            .sum();
        let collection_derived_edge_count = self
            .adjacency
            .iter()
            .flat_map(|m| m.values())
            .flatten()
            .filter(|e| e.is_collection_derived)
            .count();
        GraphStats {
            participant_count: self.participant_names.len(),
            item_count: self.item_names.len(),
            edge_count,
            collection_derived_edge_count,
        }
    }

    pub fn has_collection_support(&self) -> bool {
        self.has_collection_support
    }
}

#[cfg(test)]
mod tests {
    use super::super::builder::GraphBuilder;
    use super::super::collections::CollectionExpansionConfig;
    use crate::oracles::memory::{InMemoryCollections, InMemoryOwnership, InMemoryRejections};
    use std::collections::BTreeMap;

    async fn two_cycle_graph() -> super::TradeGraph {
        let ownership = InMemoryOwnership {
            owner_of: [("x".to_string(), "A".to_string()), ("y".to_string(), "B".to_string())]
                .into_iter()
                .collect(),
        };
        let mut specific_wants = BTreeMap::new();
        specific_wants.insert("x".to_string(), vec!["B".to_string()]);
        specific_wants.insert("y".to_string(), vec!["A".to_string()]);

        let builder = GraphBuilder::new(CollectionExpansionConfig::default());
        builder
            .build(
                vec!["A".to_string(), "B".to_string()],
                &ownership,
                &specific_wants,
                &BTreeMap::new(),
                &InMemoryRejections::default(),
                &InMemoryCollections::default(),
            )
            .await
            .unwrap()
            .graph
    }

    #[tokio::test]
    async fn out_edges_and_owner_round_trip() {
        let graph = two_cycle_graph().await;
        assert_eq!(graph.owner("x").as_deref(), Some("A"));
        let edges = graph.out_edges("A");
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].0, "B");
        assert_eq!(edges[0].1[0].item, "x");
    }

    #[tokio::test]
    async fn unknown_item_has_no_owner_or_wanters() {
        let graph = two_cycle_graph().await;
        assert_eq!(graph.owner("ghost"), None);
        assert!(graph.wanters("ghost").is_empty());
    }

    #[tokio::test]
    async fn stats_report_expected_counts() {
        let graph = two_cycle_graph().await;
        let stats = graph.stats();
        assert_eq!(stats.participant_count, 2);
        assert_eq!(stats.edge_count, 2);
        assert_eq!(stats.collection_derived_edge_count, 0);
    }
}
