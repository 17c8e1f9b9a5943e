//! Community Partitioner
//!
//! Louvain-style modularity partitioning over an undirected projection of
//! the graph, used to bound the search space inside very large SCCs. The
//! local-moving phase below is hand-derived from the standard one-level
//! Louvain formulation rather than adapted from an existing routine. It
//! deliberately implements a single aggregation level (local moves only,
//! no recursive community contraction): enough to bound an oversized SCC's
//! search space without building out a full multi-resolution hierarchy
//! nothing here needs yet.
//!
//! Cached by the orchestrator under the same content-fingerprint discipline
//! as the graph itself: 5-minute TTL, invalidated on fingerprint change,
//! via `crate::perf::cache::TtlLruCache`.

use super::model::TradeGraph;
use super::types::ParticipantId;
use std::collections::{BTreeMap, BTreeSet};

/// Node-count / edge-count thresholds past which a scope is considered
/// "large enough" to bother partitioning.
pub const LARGE_SCOPE_NODE_THRESHOLD: usize = 50;
pub const LARGE_SCOPE_EDGE_THRESHOLD: usize = 500;

const SMALL_SCOPE_NODE_THRESHOLD: usize = 5;
const MAX_PASSES: usize = 20;
const RESOLUTION: f64 = 1.0;

/// A partition of a node scope into communities, each a sorted set of
/// participant ids.
pub type Partition = Vec<BTreeSet<ParticipantId>>;

/// Whether `scope` is large enough that partitioning is worth running,
/// against `LARGE_SCOPE_NODE_THRESHOLD` / `LARGE_SCOPE_EDGE_THRESHOLD`.
pub fn is_large_scope(graph: &TradeGraph, scope: &BTreeSet<ParticipantId>) -> bool {
    if scope.len() > LARGE_SCOPE_NODE_THRESHOLD {
        return true;
    }
    let edge_count: usize = scope
        .iter()
        .map(|&p| {
            graph
                .out_edges_by_id(p)
                .iter()
                .filter(|(neighbor, _)| scope.contains(neighbor))
                .map(|(_, edges)| edges.len())
                .sum::<usize>()
        })
        .sum();
    edge_count > LARGE_SCOPE_EDGE_THRESHOLD
}

/// Partition `scope` into communities. Falls back to one community
/// containing everything for scopes at or under
/// `SMALL_SCOPE_NODE_THRESHOLD`, and on any internal inconsistency (empty
/// projection with nonzero scope) — fail safe to one community rather than
/// panic or return an empty partition.
pub fn partition(graph: &TradeGraph, scope: &BTreeSet<ParticipantId>) -> Partition {
    if scope.len() <= SMALL_SCOPE_NODE_THRESHOLD {
        return vec![scope.clone()];
    }

    let projection = project_undirected(graph, scope);
    if projection.total_weight <= 0.0 {
        return vec![scope.clone()];
    }

    let mut community_of: BTreeMap<ParticipantId, ParticipantId> =
        scope.iter().map(|&p| (p, p)).collect();

    for _ in 0..MAX_PASSES {
        let mut moved = false;
        for &node in scope {
            let best = best_community_for(&projection, &community_of, node);
            if best != community_of[&node] {
                community_of.insert(node, best);
                moved = true;
            }
        }
        if !moved {
            break;
        }
    }

    let mut groups: BTreeMap<ParticipantId, BTreeSet<ParticipantId>> = BTreeMap::new();
    for (&node, &community) in &community_of {
        groups.entry(community).or_default().insert(node);
    }

    merge_small_communities(&projection, groups)
}

struct Projection {
    /// Undirected edge weight, stored once per unordered pair with the
    /// smaller id first.
    weights: BTreeMap<(ParticipantId, ParticipantId), f64>,
    /// Sum of incident edge weight per node (Louvain's `k_i`).
    degree: BTreeMap<ParticipantId, f64>,
    total_weight: f64,
}

impl Projection {
    fn weight_between(&self, a: ParticipantId, b: ParticipantId) -> f64 {
        if a == b {
            return 0.0;
        }
        let key = if a < b { (a, b) } else { (b, a) };
        self.weights.get(&key).copied().unwrap_or(0.0)
    }
}

/// Project the directed multigraph restricted to `scope` into an undirected
/// weighted graph: each directed edge (in either direction) between two
/// in-scope nodes contributes 1.0 to that unordered pair's weight.
fn project_undirected(graph: &TradeGraph, scope: &BTreeSet<ParticipantId>) -> Projection {
    let mut weights: BTreeMap<(ParticipantId, ParticipantId), f64> = BTreeMap::new();
    for &from in scope {
        for (&to, edges) in graph.out_edges_by_id(from) {
            if !scope.contains(&to) || to == from {
                continue;
            }
            let key = if from < to { (from, to) } else { (to, from) };
            *weights.entry(key).or_insert(0.0) += edges.len() as f64;
        }
    }

    let mut degree: BTreeMap<ParticipantId, f64> = scope.iter().map(|&p| (p, 0.0)).collect();
    let mut total_weight = 0.0;
    for (&(a, b), &w) in &weights {
        *degree.entry(a).or_insert(0.0) += w;
        *degree.entry(b).or_insert(0.0) += w;
        total_weight += w;
    }

    Projection {
        weights,
        degree,
        total_weight,
    }
}

/// Modularity gain of moving `node` into each candidate community reachable
/// via a current neighbor, returning the best (ties broken by smallest
/// community id for determinism). Never worse than staying put.
fn best_community_for(
    projection: &Projection,
    community_of: &BTreeMap<ParticipantId, ParticipantId>,
    node: ParticipantId,
) -> ParticipantId {
    let current = community_of[&node];
    let k_i = projection.degree.get(&node).copied().unwrap_or(0.0);
    let two_m = 2.0 * projection.total_weight;

    let mut candidate_communities: BTreeSet<ParticipantId> = BTreeSet::new();
    candidate_communities.insert(current);
    for (&other, &other_community) in community_of {
        if projection.weight_between(node, other) > 0.0 {
            candidate_communities.insert(other_community);
        }
    }

    let mut best_community = current;
    let mut best_gain = f64::NEG_INFINITY;
    for &candidate in &candidate_communities {
        let k_i_in: f64 = community_of
            .iter()
            .filter(|(_, &c)| c == candidate)
            .map(|(&member, _)| projection.weight_between(node, member))
            .sum();
        let sigma_tot: f64 = community_of
            .iter()
            .filter(|(&member, &c)| c == candidate && member != node)
            .map(|(&member, _)| projection.degree.get(&member).copied().unwrap_or(0.0))
            .sum();
        let gain = k_i_in - RESOLUTION * k_i * sigma_tot / two_m;
        if gain > best_gain {
            best_gain = gain;
            best_community = candidate;
        }
    }
    best_community
}

/// Merge communities smaller than 2 members into the neighboring community
/// with the greatest total edge weight
fn merge_small_communities(
    projection: &Projection,
    mut groups: BTreeMap<ParticipantId, BTreeSet<ParticipantId>>,
) -> Partition {
    let singleton_keys: Vec<ParticipantId> = groups
        .iter()
        .filter(|(_, members)| members.len() < 2)
        .map(|(&k, _)| k)
        .collect();

    for key in singleton_keys {
        let Some(singleton_members) = groups.get(&key).cloned() else {
            continue;
        };
        if singleton_members.len() >= 2 {
            continue;
        }
        let Some(&node) = singleton_members.iter().next() else {
            continue;
        };

        let mut best_target: Option<ParticipantId> = None;
        let mut best_weight = 0.0;
        for (&other_key, members) in &groups {
            if other_key == key {
                continue;
            }
            let weight: f64 = members.iter().map(|&m| projection.weight_between(node, m)).sum();
            if weight > best_weight {
                best_weight = weight;
                best_target = Some(other_key);
            }
        }

        if let Some(target) = best_target {
            groups.remove(&key);
            groups.entry(target).or_default().insert(node);
        }
    }

    groups.into_values().collect()
}
