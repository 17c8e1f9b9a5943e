//! Discovery Orchestrator
//!
//! Public entry point tying the graph builder, SCC finder, community
//! partitioner, and canonical enumerator together.
//!
//! Generalizes the orchestrator style used elsewhere in this codebase for
//! driving a simulation engine — which owns references to its policy,
//! settlement, and event collaborators rather than reaching for globals —
//! from "advance one tick of a payment simulation" to "discover trade
//! cycles, full or incremental, against injected collaborators".

use crate::delta::{self, Mutation};
use crate::enumerate::{self, Cycle, CycleStep, EnumerationConfig};
use crate::error::{EngineError, EngineResult, FailureClass};
use crate::events::{
    ConfigUpdatedEvent, CyclesDiscoveredEvent, EngineObserver, MutationAppliedEvent, NullObserver,
};
use crate::fingerprint::{fingerprint, GraphBuildKey};
use crate::graph::builder::GraphBuilder;
use crate::graph::collections::CollectionExpansionConfig;
use crate::graph::model::TradeGraph;
use crate::graph::scc::{self, Scc};
use crate::graph::types::ParticipantId;
use crate::graph::{community, types::EdgeData};
use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use crate::oracles::{CollectionOracle, OwnershipOracle, PricingOracle, RejectionStore};
use crate::perf::{BreakerState, CircuitBreakerRegistry, TtlLruCache};
use crate::config::{EngineSettings, PartialEngineSettings};
use parking_lot::Mutex as SyncMutex;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// Status of a discovered cycle. The engine only ever produces `Pending`;
/// downstream statuses belong to a host's persistence layer, out of scope
/// here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Pending,
}

/// One cycle enriched with the metadata the engine attaches on output.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DiscoveredCycle {
    pub canonical_id: String,
    pub participants: Vec<String>,
    pub steps: Vec<CycleStep>,
    pub efficiency: f64,
    pub quality_score: f64,
    pub status: CycleStatus,
    pub created_at_ms: u64,
}

/// Engine-level metadata accompanying every discovery result; always
/// populated, even on partial failure, so a caller can inspect what ran.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DiscoveryMetadata {
    pub cycles_discovered: usize,
    pub canonical_returned: usize,
    pub permutations_eliminated: usize,
    pub sccs_processed: usize,
    pub processing_time_ms: u64,
    pub timed_out: bool,
    pub failure_classes: Vec<FailureClass>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DiscoveryResult {
    pub cycles: Vec<DiscoveredCycle>,
    pub metadata: DiscoveryMetadata,
}

impl DiscoveryResult {
    fn empty_with_failure(class: FailureClass, elapsed: Duration) -> Self {
        Self {
            cycles: Vec::new(),
            metadata: DiscoveryMetadata {
                failure_classes: vec![class],
                processing_time_ms: elapsed.as_millis() as u64,
                ..Default::default()
            },
        }
    }
}

/// Snapshot of ownership built from the engine's internal live-state map,
/// used to re-derive a graph after a mutation without requiring the
/// original caller-supplied ownership oracle again.
struct SnapshotOwnership<'a>(&'a BTreeMap<String, String>);

impl<'a> OwnershipOracle for SnapshotOwnership<'a> {
    fn owner(&self, item: &str) -> Option<String> {
        self.0.get(item).cloned()
    }
}

/// The engine's live state between calls: the last known want/ownership
/// picture (mutated in place by `apply_mutation`) and the cycles currently
/// considered active, kept so a delta can merge against them.
#[derive(Debug, Clone, Default)]
struct LiveState {
    participants: Vec<String>,
    item_owner: BTreeMap<String, String>,
    specific_wants: BTreeMap<String, Vec<String>>,
    collection_wants: BTreeMap<String, Vec<String>>,
    last_graph: Option<Arc<TradeGraph>>,
    persisted_cycles: Vec<DiscoveredCycle>,
}

/// Ties together the builder, SCC finder, community partitioner, and
/// enumerator behind the public API. Collaborators (collection membership,
/// pricing, rejections, observation) are injected at construction — the
/// engine holds explicit references instead of reaching for globals.
pub struct Engine {
    settings: RwLock<EngineSettings>,
    collections: Arc<dyn CollectionOracle>,
    rejections: Arc<dyn RejectionStore>,
    pricing: Option<Arc<dyn PricingOracle>>,
    observer: Arc<dyn EngineObserver>,
    builder: GraphBuilder,
    result_cache: TtlLruCache<String, DiscoveryResult>,
    breakers: CircuitBreakerRegistry,
    metrics: MetricsRegistry,
    state: SyncMutex<LiveState>,
}

impl Engine {
    pub fn new(
        settings: EngineSettings,
        collections: Arc<dyn CollectionOracle>,
        rejections: Arc<dyn RejectionStore>,
        pricing: Option<Arc<dyn PricingOracle>>,
        observer: Arc<dyn EngineObserver>,
    ) -> Self {
        let expansion_config = CollectionExpansionConfig {
            max_collection_size: settings.max_collection_size,
            fallback_to_sampling: settings.fallback_to_sampling,
            max_total_expansion_per_request: settings.max_expansion_per_request,
            ..Default::default()
        };
        Self {
            result_cache: TtlLruCache::new(Duration::from_millis(settings.cache_ttl_ms), 1_000),
            breakers: CircuitBreakerRegistry::new(
                settings.circuit_breaker_threshold,
                Duration::from_millis(settings.circuit_breaker_timeout_ms),
            ),
            builder: GraphBuilder::new(expansion_config),
            settings: RwLock::new(settings),
            collections,
            rejections,
            pricing,
            observer,
            metrics: MetricsRegistry::new(),
            state: SyncMutex::new(LiveState::default()),
        }
    }

    pub fn with_defaults(collections: Arc<dyn CollectionOracle>, rejections: Arc<dyn RejectionStore>) -> Self {
        Self::new(
            EngineSettings::default(),
            collections,
            rejections,
            None,
            Arc::new(NullObserver),
        )
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Bounded hot-reload: only fields present in `partial` change.
    pub async fn configure(&self, partial: PartialEngineSettings) {
        let changed_fields = changed_field_names(&partial);
        {
            let mut settings = self.settings.write().await;
            settings.merge(partial);
        }
        self.observer.on_config_updated(ConfigUpdatedEvent {
            changed_fields: &changed_fields,
        });
    }

    /// Full discovery path: build (or reuse) a graph from `participants`,
    /// `ownership`, `specific_wants`, and `collection_wants`, then enumerate
    /// every SCC (optionally community-bounded), merge, and rank.
    pub async fn discover_trades(
        &self,
        participants: Vec<String>,
        ownership: &dyn OwnershipOracle,
        specific_wants: &BTreeMap<String, Vec<String>>,
        collection_wants: &BTreeMap<String, Vec<String>>,
    ) -> EngineResult<DiscoveryResult> {
        let started = Instant::now();
        self.metrics.record_discover_call();

        if !self.breakers.allow("discover") {
            return Err(EngineError::CircuitOpen {
                operation: "discover".to_string(),
            });
        }

        let settings = self.settings.read().await.clone();
        let build_key = GraphBuildKey {
            participants: {
                let mut p = participants.clone();
                p.sort();
                p
            },
            item_wants: specific_wants
                .iter()
                .map(|(k, v)| {
                    let mut v = v.clone();
                    v.sort();
                    (k.clone(), v)
                })
                .collect(),
            collection_wants: collection_wants
                .iter()
                .flat_map(|(p, cs)| cs.iter().map(move |c| (p.clone(), c.clone())))
                .collect(),
        };
        let settings_fingerprint = fingerprint(&settings);
        let cache_key = format!("{}:{}", build_key.fingerprint(), settings_fingerprint);

        if let Some(cached) = self.result_cache.get(&cache_key) {
            self.metrics.record_cache_hit();
            tracing::debug!(cache_key = %cache_key, "graph build cache hit");
            return Ok(cached);
        }
        self.metrics.record_cache_miss();
        tracing::debug!(cache_key = %cache_key, "graph build cache miss");

        let empty_collection_wants = BTreeMap::new();
        let effective_collection_wants = if settings.enable_collection_expansion {
            collection_wants
        } else {
            &empty_collection_wants
        };
        let outcome = self
            .builder
            .build(
                participants.clone(),
                ownership,
                specific_wants,
                effective_collection_wants,
                self.rejections.as_ref(),
                self.collections.as_ref(),
            )
            .await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                self.breakers.record_failure("discover");
                if self.breakers.state("discover") == BreakerState::Open {
                    self.metrics.record_circuit_breaker_trip();
                    tracing::warn!(operation = "discover", "circuit breaker opened");
                }
                return Err(err);
            }
        };
        self.breakers.record_success("discover");

        let graph = Arc::new(outcome.graph);
        let mut failure_classes = Vec::new();
        if outcome.expansion_budget_exceeded {
            failure_classes.push(FailureClass::ExpansionBudgetExceeded);
        }
        for _ in &outcome.unavailable_collections {
            failure_classes.push(FailureClass::CollectionUnavailable);
        }

        let deadline = started + Duration::from_millis(settings.timeout_ms);
        let sccs = scc::find_sccs(&graph, None);
        tracing::debug!(sccs = sccs.len(), "scc computation complete");
        let (cycles, permutations_eliminated, timed_out) =
            self.enumerate_all_groups(&graph, &sccs, &settings, deadline).await;
        tracing::debug!(
            cycles = cycles.len(),
            timed_out,
            "group enumeration complete"
        );

        {
            let mut state = self.state.lock();
            state.participants = participants;
            state.item_owner = collect_item_owner(&graph);
            state.specific_wants = specific_wants.clone();
            state.collection_wants = collection_wants.clone();
            state.last_graph = Some(graph.clone());
        }

        let result = self
            .finish_result(
                cycles,
                permutations_eliminated,
                sccs.len(),
                timed_out,
                failure_classes,
                started,
                &settings,
            )
            .await;

        {
            let mut state = self.state.lock();
            state.persisted_cycles = result.cycles.clone();
        }

        self.result_cache.insert(cache_key, result.clone());
        self.metrics.record_cycles_discovered(result.cycles.len() as u64);
        self.observer.on_cycles_discovered(CyclesDiscoveredEvent {
            cycles: &owned_cycles(&result.cycles),
            sccs_processed: sccs.len(),
            timed_out: result.metadata.timed_out,
        });

        Ok(result)
    }

    /// Incremental path: compute the minimal affected sub-graph for
    /// `mutation`, restrict re-enumeration to it, and merge with the
    /// cycles that survive unaffected Never
    /// returns `Err` to the caller: internal failures retry
    /// up to three times, then route to the dead-letter counter and
    /// surface as an `Internal` failure class in the returned metadata.
    pub async fn apply_mutation(&self, mutation: Mutation) -> DiscoveryResult {
        let started = Instant::now();
        self.metrics.record_mutation_call();

        const MAX_ATTEMPTS: u32 = 3;
        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            match self.apply_mutation_once(&mutation, started).await {
                Ok(result) => return result,
                Err(err) => {
                    last_err = Some(err);
                    if attempt + 1 < MAX_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(50 * 2u64.pow(attempt))).await;
                    }
                }
            }
        }

        self.metrics.record_dead_letter();
        tracing::warn!(attempts = MAX_ATTEMPTS, error = ?last_err, "mutation dead-lettered");
        DiscoveryResult::empty_with_failure(FailureClass::Internal, started.elapsed())
    }

    async fn apply_mutation_once(
        &self,
        mutation: &Mutation,
        started: Instant,
    ) -> EngineResult<DiscoveryResult> {
        if !self.breakers.allow("mutation") {
            return Err(EngineError::CircuitOpen {
                operation: "mutation".to_string(),
            });
        }

        let settings = self.settings.read().await.clone();

        let (previous_graph, persisted_cycles) = {
            let state = self.state.lock();
            (state.last_graph.clone(), state.persisted_cycles.clone())
        };
        let Some(previous_graph) = previous_graph else {
            // No prior full discovery to delta against; treat as a no-op.
            return Ok(DiscoveryResult::default());
        };

        let persisted_participant_sets: Vec<BTreeSet<String>> = persisted_cycles
            .iter()
            .map(|c| c.participants.iter().cloned().collect())
            .collect();
        let descriptor = delta::affected_subgraph(&previous_graph, mutation, &persisted_participant_sets);

        let (mut item_owner, mut specific_wants, collection_wants, participants) = {
            let state = self.state.lock();
            (
                state.item_owner.clone(),
                state.specific_wants.clone(),
                state.collection_wants.clone(),
                state.participants.clone(),
            )
        };
        apply_mutation_to_maps(mutation, &mut item_owner, &mut specific_wants);

        let ownership = SnapshotOwnership(&item_owner);
        let empty_collection_wants = BTreeMap::new();
        let effective_collection_wants = if settings.enable_collection_expansion {
            &collection_wants
        } else {
            &empty_collection_wants
        };
        let outcome = self
            .builder
            .build(
                participants.clone(),
                &ownership,
                &specific_wants,
                effective_collection_wants,
                self.rejections.as_ref(),
                self.collections.as_ref(),
            )
            .await?;
        let graph = Arc::new(outcome.graph);

        let affected_ids: BTreeSet<ParticipantId> = descriptor
            .affected_participants
            .iter()
            .filter_map(|name| graph.participant_id(name))
            .collect();
        let restricted_sccs = scc::find_sccs(&graph, Some(&affected_ids));

        let deadline = started + Duration::from_millis(settings.timeout_ms);
        let (new_cycles, permutations_eliminated, timed_out) = self
            .enumerate_all_groups(&graph, &restricted_sccs, &settings, deadline)
            .await;

        let retained: Vec<DiscoveredCycle> = persisted_cycles
            .into_iter()
            .filter(|c| {
                !c.participants
                    .iter()
                    .any(|p| descriptor.affected_participants.contains(p))
            })
            .collect();

        let mut merged_raw = new_cycles;
        let existing_ids: BTreeSet<String> = retained.iter().map(|c| c.canonical_id.clone()).collect();
        merged_raw.retain(|c| !existing_ids.contains(&c.canonical_id));

        let mut result = self
            .finish_result(
                merged_raw,
                permutations_eliminated,
                restricted_sccs.len(),
                timed_out,
                Vec::new(),
                started,
                &settings,
            )
            .await;
        result.cycles.extend(retained);
        result.metadata.cycles_discovered = result.cycles.len();
        result.metadata.canonical_returned = result.cycles.len();

        {
            let mut state = self.state.lock();
            state.item_owner = item_owner;
            state.specific_wants = specific_wants;
            state.last_graph = Some(graph);
            state.persisted_cycles = result.cycles.clone();
        }

        self.breakers.record_success("mutation");
        self.observer.on_mutation_applied(MutationAppliedEvent {
            descriptor: &descriptor,
        });

        Ok(result)
    }

    /// Enumerate every group (one per SCC, optionally split further into
    /// communities when the SCC is large), honoring `deadline` across the
    /// whole set: groups past the deadline are skipped, not retried, and a
    /// single slow or failing group never aborts the others.
    async fn enumerate_all_groups(
        &self,
        graph: &TradeGraph,
        sccs: &[Scc],
        settings: &EngineSettings,
        deadline: Instant,
    ) -> (Vec<Cycle>, usize, bool) {
        let config = EnumerationConfig {
            max_depth: settings.max_depth,
            max_cycles_per_group: settings.max_cycles_per_group,
        };

        let mut groups: Vec<BTreeSet<ParticipantId>> = Vec::new();
        for component in sccs {
            if settings.enable_community_partition && community::is_large_scope(graph, component) {
                for cell in community::partition(graph, component) {
                    if !cell.is_empty() {
                        groups.push(cell);
                    }
                }
            } else {
                groups.push(component.clone());
            }
        }

        // CPU-bound enumeration runs on a worker pool sized to
        // `min(4, max(1, floor(N/10)))` for an N-participant graph.
        let pool_size = (graph.participant_count() / 10).clamp(1, 4);
        let per_group_results: Vec<enumerate::GroupEnumerationResult> =
            match rayon::ThreadPoolBuilder::new().num_threads(pool_size).build() {
                Ok(pool) => pool.install(|| {
                    groups
                        .par_iter()
                        .map(|group| enumerate::enumerate_group(graph, group, config, deadline))
                        .collect()
                }),
                Err(err) => {
                    tracing::warn!(error = %err, "rayon pool build failed, enumerating groups sequentially");
                    groups
                        .iter()
                        .map(|group| enumerate::enumerate_group(graph, group, config, deadline))
                        .collect()
                }
            };

        let mut all_cycles = Vec::new();
        let mut seen_ids: BTreeSet<String> = BTreeSet::new();
        let mut permutations_eliminated = 0usize;
        let mut timed_out = false;

        for result in per_group_results {
            permutations_eliminated += result.permutations_eliminated;
            timed_out |= result.timed_out;
            for cycle in result.cycles {
                if seen_ids.insert(cycle.canonical_id.clone()) {
                    all_cycles.push(cycle);
                }
            }
        }

        (all_cycles, permutations_eliminated, timed_out)
    }

    async fn finish_result(
        &self,
        mut cycles: Vec<Cycle>,
        permutations_eliminated: usize,
        sccs_processed: usize,
        timed_out: bool,
        mut failure_classes: Vec<FailureClass>,
        started: Instant,
        settings: &EngineSettings,
    ) -> DiscoveryResult {
        let cycles_discovered = cycles.len();
        cycles.retain(|c| c.efficiency() >= settings.min_efficiency);

        let mut discovered = Vec::with_capacity(cycles.len());
        for cycle in cycles {
            let quality_score = self.quality_score(&cycle).await;
            discovered.push(DiscoveredCycle {
                canonical_id: cycle.canonical_id,
                participants: cycle.participants,
                efficiency: 1.0 / cycle.steps.len() as f64,
                steps: cycle.steps,
                quality_score,
                status: CycleStatus::Pending,
                created_at_ms: now_ms(),
            });
        }

        discovered.sort_by(|a, b| {
            b.quality_score
                .partial_cmp(&a.quality_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.participants.len().cmp(&b.participants.len()))
                .then(a.canonical_id.cmp(&b.canonical_id))
        });
        discovered.truncate(settings.max_cycles);

        if timed_out {
            failure_classes.push(FailureClass::BudgetExceeded);
        }

        DiscoveryResult {
            metadata: DiscoveryMetadata {
                cycles_discovered,
                canonical_returned: discovered.len(),
                permutations_eliminated,
                sccs_processed,
                processing_time_ms: started.elapsed().as_millis() as u64,
                timed_out,
                failure_classes,
            },
            cycles: discovered,
        }
    }

    async fn quality_score(&self, cycle: &Cycle) -> f64 {
        let Some(pricing) = &self.pricing else {
            return 1.0;
        };
        let mut prices = Vec::with_capacity(cycle.items.len());
        for item in &cycle.items {
            match pricing.price(item).await {
                Ok(price) => prices.push(price),
                Err(_) => return 1.0,
            }
        }
        let (Some(min), Some(max)) = (
            prices.iter().cloned().fold(None, fold_min),
            prices.iter().cloned().fold(None, fold_max),
        ) else {
            return 1.0;
        };
        if max <= 0.0 {
            return 1.0;
        }
        // ±10% fairness tolerance: a perfectly fair trade
        // (min == max) scores 1.1, a maximally unfair one scores 0.9.
        let fairness = min / max;
        0.9 + 0.2 * fairness
    }
}

fn fold_min(acc: Option<f64>, x: f64) -> Option<f64> {
    Some(acc.map_or(x, |a: f64| a.min(x)))
}

fn fold_max(acc: Option<f64>, x: f64) -> Option<f64> {
    Some(acc.map_or(x, |a: f64| a.max(x)))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn collect_item_owner(graph: &TradeGraph) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for participant in graph.nodes() {
        for (_, edges) in graph.out_edges(participant) {
            for EdgeData { item, .. } in edges {
                map.insert(item, participant.to_string());
            }
        }
    }
    map
}

fn owned_cycles(discovered: &[DiscoveredCycle]) -> Vec<Cycle> {
    discovered
        .iter()
        .map(|d| Cycle {
            canonical_id: d.canonical_id.clone(),
            participants: d.participants.clone(),
            items: d.steps.iter().map(|s| s.item.clone()).collect(),
            steps: d.steps.clone(),
        })
        .collect()
}

fn apply_mutation_to_maps(
    mutation: &Mutation,
    item_owner: &mut BTreeMap<String, String>,
    specific_wants: &mut BTreeMap<String, Vec<String>>,
) {
    match mutation {
        Mutation::ItemAdded { item, owner, .. } => {
            item_owner.insert(item.clone(), owner.clone());
        }
        Mutation::ItemRemoved { item } => {
            item_owner.remove(item);
            specific_wants.remove(item);
        }
        Mutation::WantAdded { wanter, item } => {
            let wanters = specific_wants.entry(item.clone()).or_default();
            if !wanters.contains(wanter) {
                wanters.push(wanter.clone());
            }
        }
        Mutation::WantRemoved { wanter, item } => {
            if let Some(wanters) = specific_wants.get_mut(item) {
                wanters.retain(|w| w != wanter);
                if wanters.is_empty() {
                    specific_wants.remove(item);
                }
            }
        }
        Mutation::OwnershipTransferred { item, new_owner } => {
            item_owner.insert(item.clone(), new_owner.clone());
        }
    }
}

fn changed_field_names(partial: &PartialEngineSettings) -> Vec<&'static str> {
    let mut fields = Vec::new();
    macro_rules! check {
        ($field:ident) => {
            if partial.$field.is_some() {
                fields.push(stringify!($field));
            }
        };
    }
    check!(max_depth);
    check!(timeout_ms);
    check!(max_cycles_per_group);
    check!(min_efficiency);
    check!(enable_collection_expansion);
    check!(enable_community_partition);
    check!(max_collection_size);
    check!(fallback_to_sampling);
    check!(max_expansion_per_request);
    check!(cache_ttl_ms);
    check!(circuit_breaker_threshold);
    check!(circuit_breaker_timeout_ms);
    check!(max_cycles);
    fields
}
