//! Delta Detector
//!
//! Computes the minimal affected sub-graph for a single mutation, so the
//! orchestrator can restrict re-enumeration to the union of affected SCCs
//! intersected with the seed-expanded node set instead of rebuilding and
//! re-enumerating the whole graph. This module has no counterpart in the
//! payment settlement pipeline this crate generalizes from, which always
//! re-ran its cycle search over the whole aggregated graph per tick; it
//! follows the weakly-connected-component bucketing style `graph::scc`
//! already establishes.

use crate::graph::model::TradeGraph;
use std::collections::{BTreeSet, VecDeque};

/// One mutation applied to the live graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    ItemAdded {
        item: String,
        owner: String,
        collection: Option<String>,
    },
    ItemRemoved {
        item: String,
    },
    WantAdded {
        wanter: String,
        item: String,
    },
    WantRemoved {
        wanter: String,
        item: String,
    },
    OwnershipTransferred {
        item: String,
        new_owner: String,
    },
}

/// Coarse complexity estimate keyed on affected-component size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityBucket {
    Low,
    Medium,
    High,
}

impl ComplexityBucket {
    fn for_component_size(size: usize) -> Self {
        if size <= 5 {
            ComplexityBucket::Low
        } else if size <= 20 {
            ComplexityBucket::Medium
        } else {
            ComplexityBucket::High
        }
    }
}

/// The minimal affected sub-graph for one mutation: an affected participant
/// set, item set, collection set, its weakly-connected-component partition,
/// and a complexity estimate per component.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubgraphDescriptor {
    pub affected_participants: BTreeSet<String>,
    pub affected_items: BTreeSet<String>,
    pub affected_collections: BTreeSet<String>,
    pub components: Vec<BTreeSet<String>>,
    pub complexity: Vec<ComplexityBucket>,
}

const EXPANSION_HOPS: u32 = 2;

/// Compute the sub-graph descriptor for `mutation` against `graph` (the
/// live graph snapshot *before* the mutation is applied, except for
/// `ItemRemoved`, where wanters of the removed item are looked up from
/// `graph` and any persisted cycle containing it is supplied via
/// `persisted_cycle_participants`).
pub fn affected_subgraph(
    graph: &TradeGraph,
    mutation: &Mutation,
    persisted_cycle_participants: &[BTreeSet<String>],
) -> SubgraphDescriptor {
    let seed = seed_set(graph, mutation, persisted_cycle_participants);
    let expanded = expand_hops(graph, &seed, EXPANSION_HOPS);

    let mut affected_items: BTreeSet<String> = BTreeSet::new();
    for participant in &expanded {
        for (_, edges) in graph.out_edges(participant) {
            for edge in edges {
                affected_items.insert(edge.item.clone());
            }
        }
    }
    if let Mutation::ItemAdded { item, .. } | Mutation::ItemRemoved { item } = mutation {
        affected_items.insert(item.clone());
    }
    if let Mutation::WantAdded { item, .. } | Mutation::WantRemoved { item, .. } = mutation {
        affected_items.insert(item.clone());
    }
    if let Mutation::OwnershipTransferred { item, .. } = mutation {
        affected_items.insert(item.clone());
    }

    let mut affected_collections: BTreeSet<String> = BTreeSet::new();
    if let Mutation::ItemAdded {
        collection: Some(collection),
        ..
    } = mutation
    {
        affected_collections.insert(collection.clone());
    }

    let components = weakly_connected_components(graph, &expanded);
    let complexity = components
        .iter()
        .map(|c| ComplexityBucket::for_component_size(c.len()))
        .collect();

    SubgraphDescriptor {
        affected_participants: expanded,
        affected_items,
        affected_collections,
        components,
        complexity,
    }
}

fn seed_set(
    graph: &TradeGraph,
    mutation: &Mutation,
    persisted_cycle_participants: &[BTreeSet<String>],
) -> BTreeSet<String> {
    match mutation {
        Mutation::ItemAdded { item, owner, .. } => {
            let mut seed = BTreeSet::new();
            seed.insert(owner.clone());
            seed.extend(graph.wanters(item));
            seed
        }
        Mutation::WantAdded { wanter, item } | Mutation::WantRemoved { wanter, item } => {
            let mut seed = BTreeSet::new();
            seed.insert(wanter.clone());
            if let Some(owner) = graph.owner(item) {
                seed.insert(owner);
            }
            seed
        }
        Mutation::ItemRemoved { item } => {
            let mut seed: BTreeSet<String> = graph.wanters(item).into_iter().collect();
            for cycle in persisted_cycle_participants {
                if cycle_contains_item_participant(graph, cycle, item) {
                    seed.extend(cycle.iter().cloned());
                }
            }
            seed
        }
        Mutation::OwnershipTransferred { item, new_owner } => {
            let mut seed = BTreeSet::new();
            seed.insert(new_owner.clone());
            seed.extend(graph.wanters(item));
            if let Some(previous_owner) = graph.owner(item) {
                seed.insert(previous_owner);
            }
            seed
        }
    }
}

/// Whether any participant in `cycle` currently owns `item` — used as a
/// conservative stand-in for "cycle contains item" when only the
/// participant set of a persisted cycle is available to the detector.
fn cycle_contains_item_participant(graph: &TradeGraph, cycle: &BTreeSet<String>, item: &str) -> bool {
    graph.owner(item).map(|o| cycle.contains(&o)).unwrap_or(false)
}

/// Expand `seed` outward by `hops` steps along both `owner -> wanter` and
/// `wanter -> owner-of-a-wanted-item` directions
fn expand_hops(graph: &TradeGraph, seed: &BTreeSet<String>, hops: u32) -> BTreeSet<String> {
    let mut frontier: BTreeSet<String> = seed.clone();
    let mut visited: BTreeSet<String> = seed.clone();

    for _ in 0..hops {
        let mut next_frontier = BTreeSet::new();
        for participant in &frontier {
            for (wanter, _) in graph.out_edges(participant) {
                if visited.insert(wanter.clone()) {
                    next_frontier.insert(wanter);
                }
            }
            for (_, edges) in graph.out_edges(participant) {
                for edge in edges {
                    if let Some(owner) = graph.owner(&edge.item) {
                        if visited.insert(owner.clone()) {
                            next_frontier.insert(owner);
                        }
                    }
                }
            }
        }
        if next_frontier.is_empty() {
            break;
        }
        frontier = next_frontier;
    }

    visited
}

/// Partition `nodes` into weakly-connected components within `graph`,
/// treating edges as undirected for connectivity purposes.
fn weakly_connected_components(graph: &TradeGraph, nodes: &BTreeSet<String>) -> Vec<BTreeSet<String>> {
    let mut unvisited: BTreeSet<String> = nodes.clone();
    let mut components = Vec::new();

    while let Some(start) = unvisited.iter().next().cloned() {
        unvisited.remove(&start);
        let mut component = BTreeSet::new();
        component.insert(start.clone());
        let mut queue = VecDeque::new();
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            // Undirected adjacency: any node sharing an edge with `current`
            // in either direction is a neighbor for connectivity purposes.
            let mut neighbors: BTreeSet<String> = graph
                .out_edges(&current)
                .into_iter()
                .map(|(wanter, _)| wanter)
                .collect();
            for candidate in nodes {
                if !graph.edges(candidate, &current).is_empty() {
                    neighbors.insert(candidate.clone());
                }
            }

            for neighbor in neighbors {
                if nodes.contains(&neighbor) && unvisited.remove(&neighbor) {
                    component.insert(neighbor.clone());
                    queue.push_back(neighbor);
                }
            }
        }
        components.push(component);
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::GraphBuilder;
    use crate::graph::collections::CollectionExpansionConfig;
    use crate::oracles::memory::{InMemoryCollections, InMemoryOwnership, InMemoryRejections};
    use std::collections::BTreeMap;

    async fn three_cycle_graph() -> TradeGraph {
        let ownership = InMemoryOwnership {
            owner_of: [
                ("n1".to_string(), "alice".to_string()),
                ("n2".to_string(), "bob".to_string()),
                ("n3".to_string(), "carol".to_string()),
            ]
            .into_iter()
            .collect(),
        };
        let mut wants = BTreeMap::new();
        wants.insert("n1".to_string(), vec!["bob".to_string()]);
        wants.insert("n2".to_string(), vec!["carol".to_string()]);
        wants.insert("n3".to_string(), vec!["alice".to_string()]);

        GraphBuilder::new(CollectionExpansionConfig::default())
            .build(
                vec!["alice".to_string(), "bob".to_string(), "carol".to_string()],
                &ownership,
                &wants,
                &BTreeMap::new(),
                &InMemoryRejections::default(),
                &InMemoryCollections::default(),
            )
            .await
            .unwrap()
            .graph
    }

    #[tokio::test]
    async fn want_removed_seeds_wanter_and_owner() {
        let graph = three_cycle_graph().await;
        let mutation = Mutation::WantRemoved {
            wanter: "alice".to_string(),
            item: "n3".to_string(),
        };
        let descriptor = affected_subgraph(&graph, &mutation, &[]);
        assert!(descriptor.affected_participants.contains("alice"));
        assert!(descriptor.affected_participants.contains("carol"));
    }

    #[tokio::test]
    async fn component_sizes_classify_as_low_for_small_graph() {
        let graph = three_cycle_graph().await;
        let mutation = Mutation::WantRemoved {
            wanter: "alice".to_string(),
            item: "n3".to_string(),
        };
        let descriptor = affected_subgraph(&graph, &mutation, &[]);
        assert!(descriptor.complexity.iter().all(|c| *c == ComplexityBucket::Low));
    }
}
