//! Observer interface
//!
//! Design note 9 replaces the source's event-emitter singleton with a typed
//! observer a host registers on the orchestrator. Callbacks run synchronously
//! on the thread that raised the event (the orchestrator does not fan these
//! out onto a channel itself); a host wanting async delivery should bounce
//! the callback onto its own channel.

use crate::delta::SubgraphDescriptor;
use crate::enumerate::Cycle;

/// A discovery pass completed and produced (possibly zero) new canonical
/// cycles.
#[derive(Debug, Clone)]
pub struct CyclesDiscoveredEvent<'a> {
    pub cycles: &'a [Cycle],
    pub sccs_processed: usize,
    pub timed_out: bool,
}

/// `configure` was called and settings changed.
#[derive(Debug, Clone)]
pub struct ConfigUpdatedEvent<'a> {
    pub changed_fields: &'a [&'static str],
}

/// The result cache ran its aggressive cleanup pass.
#[derive(Debug, Clone)]
pub struct MemoryOptimizedEvent {
    pub entries_evicted: usize,
}

/// A mutation was applied and its affected sub-graph computed.
#[derive(Debug, Clone)]
pub struct MutationAppliedEvent<'a> {
    pub descriptor: &'a SubgraphDescriptor,
}

/// Implemented by hosts that want to observe engine activity. All methods
/// have no-op defaults so a host only overrides what it needs.
pub trait EngineObserver: Send + Sync {
    fn on_cycles_discovered(&self, _event: CyclesDiscoveredEvent<'_>) {}
    fn on_config_updated(&self, _event: ConfigUpdatedEvent<'_>) {}
    fn on_memory_optimized(&self, _event: MemoryOptimizedEvent) {}
    fn on_mutation_applied(&self, _event: MutationAppliedEvent<'_>) {}
}

/// An observer that does nothing; the orchestrator's default when a host
/// does not register one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl EngineObserver for NullObserver {}
