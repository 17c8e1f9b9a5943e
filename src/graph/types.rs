//! Core graph data types
//!
//! Participants and items are interned to small integer handles inside a
//! built graph, generalizing the `agent_to_index` / `index_to_agent` pair
//! `AggregatedGraph` uses elsewhere in this codebase from "agents in one
//! aggregated payment graph" to "participants and items in one want-graph"
//! — an arena of handles instead of cyclic `Rc`s.

use serde::{Deserialize, Serialize};

/// Stable handle for a participant inside one built graph. Not meaningful
/// across builds; never serialized to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticipantId(pub u32);

/// Stable handle for an item inside one built graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId(pub u32);

/// Provenance of a collection-derived edge's output
/// contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source_collection: String,
    pub expanded_from: String,
}

/// One `(owner -> wanter, item)` edge in the trade graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    pub item: String,
    pub is_collection_derived: bool,
    pub source_collection: Option<String>,
    pub weight: f64,
    pub provenance: Option<Provenance>,
}

impl EdgeData {
    pub fn direct(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            is_collection_derived: false,
            source_collection: None,
            weight: 1.0,
            provenance: None,
        }
    }

    pub fn collection_derived(item: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            item: item.into(),
            is_collection_derived: true,
            source_collection: Some(provenance.source_collection.clone()),
            weight: 0.9,
            provenance: Some(provenance),
        }
    }
}

/// Read-only aggregate statistics about a built graph, returned by
/// `TradeGraph::stats`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub participant_count: usize,
    pub item_count: usize,
    pub edge_count: usize,
    pub collection_derived_edge_count: usize,
}
