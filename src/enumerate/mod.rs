//! Canonical Cycle Enumerator
//!
//! Depth-bounded DFS constrained to one group (an SCC, or an SCC ∩
//! community), emitting cycles only in canonical form. Generalizes the
//! `find_cycles_from_start` single-root DFS cycle search used elsewhere in
//! this codebase from an unbounded search over arbitrary roots to the
//! single-lexicographically-smallest-root-per-group discipline that
//! eliminates rotation duplicates at the source, plus canonical-key
//! deduplication for the remaining direction ambiguity and a
//! deadline/depth/count-bounded stop condition.
//!
//! The enumerator is fully synchronous over an already-built snapshot;
//! only the builder awaits.

pub mod canonical;

use crate::graph::model::TradeGraph;
use crate::graph::types::ParticipantId;
use std::collections::{BTreeSet, HashSet};
use std::time::Instant;

/// One step of a discovered cycle: `from` owns `item`, `to` wants it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CycleStep {
    pub from: String,
    pub to: String,
    pub item: String,
    pub is_collection_derived: bool,
}

/// A discovered, canonicalized trade cycle
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Cycle {
    pub canonical_id: String,
    pub participants: Vec<String>,
    pub items: Vec<String>,
    pub steps: Vec<CycleStep>,
}

impl Cycle {
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// `1/k`
    pub fn efficiency(&self) -> f64 {
        1.0 / self.len() as f64
    }
}

/// Bounds governing one group's enumeration, drawn from `EngineSettings`.
#[derive(Debug, Clone, Copy)]
pub struct EnumerationConfig {
    pub max_depth: usize,
    pub max_cycles_per_group: usize,
}

/// Outcome of enumerating a single group.
#[derive(Debug, Clone, Default)]
pub struct GroupEnumerationResult {
    pub cycles: Vec<Cycle>,
    pub permutations_eliminated: usize,
    pub timed_out: bool,
}

/// Enumerate all canonical cycles within `group`, using the
/// lexicographically smallest participant name in the group as the sole DFS
/// root. Returns early, with `timed_out = true`, if `deadline` passes
/// before DFS exhaustion.
pub fn enumerate_group(
    graph: &TradeGraph,
    group: &BTreeSet<ParticipantId>,
    config: EnumerationConfig,
    deadline: Instant,
) -> GroupEnumerationResult {
    let mut result = GroupEnumerationResult::default();
    if group.len() < 2 {
        return result;
    }

    let Some(root) = group
        .iter()
        .min_by_key(|&&p| graph.participant_name(p))
        .copied()
    else {
        return result;
    };

    let mut dfs = Dfs {
        graph,
        group,
        root,
        max_depth: config.max_depth,
        max_cycles_per_group: config.max_cycles_per_group,
        deadline,
        path: vec![root],
        path_set: {
            let mut set = HashSet::new();
            set.insert(root);
            set
        },
        path_items: Vec::new(),
        path_collection_derived: Vec::new(),
        canonical_seen: HashSet::new(),
        result: &mut result,
    };
    dfs.run(root);

    result
}

struct Dfs<'a> {
    graph: &'a TradeGraph,
    group: &'a BTreeSet<ParticipantId>,
    root: ParticipantId,
    max_depth: usize,
    max_cycles_per_group: usize,
    deadline: Instant,
    path: Vec<ParticipantId>,
    path_set: HashSet<ParticipantId>,
    path_items: Vec<String>,
    path_collection_derived: Vec<bool>,
    canonical_seen: HashSet<String>,
    result: &'a mut GroupEnumerationResult,
}

impl<'a> Dfs<'a> {
    fn run(&mut self, current: ParticipantId) {
        if self.result.timed_out {
            return;
        }
        if Instant::now() >= self.deadline {
            self.result.timed_out = true;
            return;
        }
        if self.canonical_seen.len() >= self.max_cycles_per_group {
            return;
        }

        for (&next, edges) in self.graph.out_edges_by_id(current) {
            if !self.group.contains(&next) {
                continue;
            }
            for edge in edges {
                if next == self.root && self.path.len() >= 2 {
                    self.emit_candidate(&edge.item, edge.is_collection_derived);
                    if self.canonical_seen.len() >= self.max_cycles_per_group {
                        return;
                    }
                    continue;
                }
                if self.path_set.contains(&next) {
                    continue;
                }
                if self.path.len() >= self.max_depth {
                    continue;
                }

                self.path.push(next);
                self.path_set.insert(next);
                self.path_items.push(edge.item.clone());
                self.path_collection_derived.push(edge.is_collection_derived);

                self.run(next);

                self.path.pop();
                self.path_set.remove(&next);
                self.path_items.pop();
                self.path_collection_derived.pop();

                if self.result.timed_out || self.canonical_seen.len() >= self.max_cycles_per_group {
                    return;
                }
            }
        }
    }

    fn emit_candidate(&mut self, closing_item: &str, closing_is_collection_derived: bool) {
        let participants: Vec<String> = self
            .path
            .iter()
            .map(|&p| self.graph.participant_name(p).to_string())
            .collect();
        let mut items = self.path_items.clone();
        items.push(closing_item.to_string());

        let key = canonical::canonical_key(&participants, &items);
        if !self.canonical_seen.insert(key) {
            self.result.permutations_eliminated += 1;
            return;
        }

        let canonical_id = canonical::canonical_id(&participants, &items);
        let k = participants.len();
        let mut collection_flags = self.path_collection_derived.clone();
        collection_flags.push(closing_is_collection_derived);

        let steps = (0..k)
            .map(|i| CycleStep {
                from: participants[i].clone(),
                to: participants[(i + 1) % k].clone(),
                item: items[i].clone(),
                is_collection_derived: collection_flags[i],
            })
            .collect();

        self.result.cycles.push(Cycle {
            canonical_id,
            participants,
            items,
            steps,
        });
    }
}
