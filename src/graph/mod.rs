//! Graph model, construction, and structural decomposition.
//!
//! Layout mirrors the `settlement::lsm` split used elsewhere in this
//! codebase between the aggregated graph representation and the algorithms
//! that run over it: `model` + `types` are the representation, `builder`
//! constructs it, `scc` and `community` decompose it.

pub mod builder;
pub mod collections;
pub mod community;
pub mod model;
pub mod scc;
pub mod types;

pub use builder::{BuildOutcome, GraphBuilder};
pub use collections::{CollectionExpansionConfig, ExpandedWant, ExpansionOutcome};
pub use community::{partition as partition_communities, Partition};
pub use model::TradeGraph;
pub use scc::{find_sccs, Scc};
pub use types::{EdgeData, GraphStats, ItemId, ParticipantId, Provenance};
