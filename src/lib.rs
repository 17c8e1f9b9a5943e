//! Trade Cycle Engine
//!
//! Discovers closed multi-party barter cycles over a directed
//! "wants-what-you-own" graph: participants own non-fungible items and
//! advertise wants for specific items or for any item in a named
//! collection. A discovered cycle is a sequence of participants where each
//! one receives something they want and forwards something they own.
//!
//! # Architecture
//!
//! - **graph**: the directed graph representation, its builder, strongly
//!   connected components, community partitioning, and collection-want
//!   expansion.
//! - **enumerate**: canonical, depth-bounded cycle enumeration over a
//!   single SCC/community, one representative per rotation+reversal class.
//! - **delta**: the minimal affected sub-graph for a single mutation, so
//!   incremental re-discovery never re-walks the whole graph.
//! - **orchestrator**: the public entry point — full and incremental
//!   discovery, result caching, circuit breaking, hot-reloadable settings.
//! - **perf**: the cache/breaker/batching/rate-limiting envelope the
//!   orchestrator is built on.
//! - **oracles**: the external collaborator traits (ownership, collection
//!   membership, pricing, rejection) the engine is injected with.
//! - **config**, **error**, **events**, **metrics**, **fingerprint**,
//!   **rng**: settings, the error taxonomy, the observer interface,
//!   counters, content fingerprinting, and deterministic sampling.
//!
//! # Critical invariants
//!
//! 1. A discovered cycle's canonical id is invariant under rotation and
//!    traversal direction; the enumerator never emits the same logical
//!    cycle twice.
//! 2. All randomness (collection sampling) is deterministic given its seed.
//! 3. Discovery is always bounded by depth, count, and wall-clock deadline;
//!    `DiscoveryResult` carries metadata describing what was bounded away
//!    even when it never returns an `Err`.

pub mod config;
pub mod delta;
pub mod enumerate;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod graph;
pub mod metrics;
pub mod oracles;
pub mod orchestrator;
pub mod perf;
pub mod rng;

pub use config::{EngineSettings, PartialEngineSettings};
pub use delta::Mutation;
pub use enumerate::{Cycle, CycleStep};
pub use error::{EngineError, EngineResult, FailureClass};
pub use events::{EngineObserver, NullObserver};
pub use oracles::{CollectionOracle, OwnershipOracle, PricingOracle, RejectionStore};
pub use orchestrator::{DiscoveredCycle, DiscoveryMetadata, DiscoveryResult, Engine};
