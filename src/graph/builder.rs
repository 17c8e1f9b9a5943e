//! Graph Builder
//!
//! Assembles a `TradeGraph` from a participant snapshot, an ownership index,
//! specific wants, and collection wants. Generalizes the
//! `AggregatedGraph::from_ledger`-style "intern ids, then insert edges in
//! sorted order" construction used elsewhere in this codebase for
//! settlement netting, from one scalar edge to the richer `EdgeData`, and
//! adds a collection-expansion merge step that construction has no
//! counterpart for.

use super::collections::{expand_collection_wants, CollectionExpansionConfig};
use super::model::TradeGraph;
use super::types::{EdgeData, ParticipantId};
use crate::error::EngineResult;
use crate::fingerprint::GraphBuildKey;
use crate::oracles::{CollectionOracle, OwnershipOracle, RejectionStore};
use crate::perf::RateLimiter;
use std::collections::BTreeMap;

/// A freshly built graph plus the bookkeeping the orchestrator needs to
/// decide whether to cache it and what to report in discovery metadata.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub graph: TradeGraph,
    pub fingerprint: String,
    pub expansion_budget_exceeded: bool,
    pub unavailable_collections: Vec<String>,
}

/// Builds `TradeGraph` snapshots. Stateless aside from its expansion config;
/// callers own caching — the orchestrator wraps `build` in a 5-minute TTL
/// cache, the builder itself never caches.
pub struct GraphBuilder {
    expansion_config: CollectionExpansionConfig,
    collection_rate_limiter: RateLimiter,
}

impl GraphBuilder {
    pub fn new(expansion_config: CollectionExpansionConfig) -> Self {
        Self {
            expansion_config,
            collection_rate_limiter: RateLimiter::default_per_minute(100),
        }
    }

    /// Build a graph snapshot from a participant list, an ownership
    /// oracle, specific wants, and collection wants.
    ///
    /// `specific_wants` maps an item id to the participant ids that want it
    /// directly; `collection_wants` maps a participant id to the collection
    /// ids it wants any item from.
    pub async fn build(
        &self,
        mut participants: Vec<String>,
        ownership: &dyn OwnershipOracle,
        specific_wants: &BTreeMap<String, Vec<String>>,
        collection_wants: &BTreeMap<String, Vec<String>>,
        rejections: &dyn RejectionStore,
        collections: &dyn CollectionOracle,
    ) -> EngineResult<BuildOutcome> {
        participants.sort();
        participants.dedup();

        let mut participant_ids = BTreeMap::new();
        for (i, name) in participants.iter().enumerate() {
            participant_ids.insert(name.clone(), ParticipantId(i as u32));
        }
        let n = participants.len();
        let mut adjacency: Vec<BTreeMap<ParticipantId, Vec<EdgeData>>> =
            vec![BTreeMap::new(); n];

        let mut item_names: Vec<String> = Vec::new();
        let mut item_ids = BTreeMap::new();
        let mut item_owner: Vec<Option<ParticipantId>> = Vec::new();
        let mut item_wanters: Vec<Vec<ParticipantId>> = Vec::new();

        // Direct, specific wants: step 2.
        for (item, wanters) in specific_wants {
            let Some(owner_name) = ownership.owner(item) else {
                continue;
            };
            let Some(&owner_id) = participant_ids.get(&owner_name) else {
                continue;
            };
            let item_id = *item_ids.entry(item.clone()).or_insert_with(|| {
                item_names.push(item.clone());
                item_owner.push(None);
                item_wanters.push(Vec::new());
                super::types::ItemId((item_names.len() - 1) as u32)
            });
            item_owner[item_id.0 as usize] = Some(owner_id);

            let mut sorted_wanters = wanters.clone();
            sorted_wanters.sort();
            sorted_wanters.dedup();
            for wanter_name in &sorted_wanters {
                if wanter_name == &owner_name {
                    continue;
                }
                let Some(&wanter_id) = participant_ids.get(wanter_name) else {
                    continue;
                };
                if rejects(rejections, &owner_name, wanter_name, item) {
                    continue;
                }
                item_wanters[item_id.0 as usize].push(wanter_id);
                adjacency[owner_id.0 as usize]
                    .entry(wanter_id)
                    .or_default()
                    .push(EdgeData::direct(item.clone()));
            }
        }

        // Collection wants: step 3.
        let outcome = expand_collection_wants(
            collection_wants,
            ownership,
            rejections,
            collections,
            &self.collection_rate_limiter,
            self.expansion_config,
        )
        .await;
        let has_collection_support = !collection_wants.is_empty();

        for expanded in &outcome.pairs {
            let Some(owner_name) = ownership.owner(&expanded.item) else {
                continue;
            };
            let (Some(&owner_id), Some(&wanter_id)) = (
                participant_ids.get(&owner_name),
                participant_ids.get(&expanded.wanter),
            ) else {
                continue;
            };
            if owner_name == expanded.wanter {
                continue;
            }
            if rejects(rejections, &owner_name, &expanded.wanter, &expanded.item) {
                continue;
            }
            let item_id = *item_ids.entry(expanded.item.clone()).or_insert_with(|| {
                item_names.push(expanded.item.clone());
                item_owner.push(None);
                item_wanters.push(Vec::new());
                super::types::ItemId((item_names.len() - 1) as u32)
            });
            item_owner[item_id.0 as usize] = Some(owner_id);

            let neighbor_edges = adjacency[owner_id.0 as usize].entry(wanter_id).or_default();
            let already_direct = neighbor_edges
                .iter()
                .any(|e| e.item == expanded.item && !e.is_collection_derived);
            if already_direct {
                continue;
            }
            if neighbor_edges.iter().any(|e| e.item == expanded.item) {
                continue;
            }
            item_wanters[item_id.0 as usize].push(wanter_id);
            neighbor_edges.push(EdgeData::collection_derived(
                expanded.item.clone(),
                expanded.provenance.clone(),
            ));
        }

        for neighbors in adjacency.iter_mut() {
            for edges in neighbors.values_mut() {
                edges.sort_by(|a, b| a.item.cmp(&b.item));
            }
        }

        let build_key = GraphBuildKey {
            participants: participants.clone(),
            item_wants: sorted_item_wants(specific_wants),
            collection_wants: sorted_collection_wants(collection_wants),
        };

        let graph = TradeGraph {
            participant_names: participants,
            participant_ids,
            item_names,
            item_ids,
            item_owner,
            adjacency,
            item_wanters,
            has_collection_support,
        };

        Ok(BuildOutcome {
            graph,
            fingerprint: build_key.fingerprint(),
            expansion_budget_exceeded: outcome.budget_exceeded,
            unavailable_collections: outcome.unavailable_collections,
        })
    }
}

fn rejects(rejections: &dyn RejectionStore, owner: &str, wanter: &str, item: &str) -> bool {
    let owner_rejections = rejections.rejections(owner);
    let wanter_rejections = rejections.rejections(wanter);
    owner_rejections.rejected_participants.contains(wanter)
        || wanter_rejections.rejected_participants.contains(owner)
        || owner_rejections.rejected_items.contains(item)
        || wanter_rejections.rejected_items.contains(item)
}

fn sorted_item_wants(specific_wants: &BTreeMap<String, Vec<String>>) -> Vec<(String, Vec<String>)> {
    specific_wants
        .iter()
        .map(|(item, wanters)| {
            let mut sorted = wanters.clone();
            sorted.sort();
            sorted.dedup();
            (item.clone(), sorted)
        })
        .collect()
}

fn sorted_collection_wants(collection_wants: &BTreeMap<String, Vec<String>>) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = collection_wants
        .iter()
        .flat_map(|(participant, collections)| {
            collections.iter().map(move |c| (participant.clone(), c.clone()))
        })
        .collect();
    pairs.sort();
    pairs
}
