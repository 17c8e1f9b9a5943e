//! Engine error taxonomy
//!
//! Builder errors abort a `discover` call and surface to the caller;
//! enumerator and expansion errors are caught per-group/per-pair and folded
//! into `DiscoveryResult` metadata instead.
//!
//! CRITICAL: `BudgetExceeded` and `ExpansionBudgetExceeded` are constructed
//! as values but are never returned as `Err` from the public entry points —
//! they travel through `FailureClass` in the result metadata.

use thiserror::Error;

/// Errors that can occur while building or querying the trade graph and
/// while running discovery.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// Malformed participant snapshot, or a specific want references an item
    /// with no known owner.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Wall-clock budget for the current operation was exhausted.
    #[error("operation budget exceeded")]
    BudgetExceeded,

    /// A collection-membership oracle call failed.
    #[error("collection {collection} unavailable: {source}")]
    CollectionUnavailable { collection: String, source: String },

    /// The global expansion cap for a single build was reached.
    #[error("expansion budget exceeded")]
    ExpansionBudgetExceeded,

    /// The circuit breaker for `operation` is open; retry after its timeout.
    #[error("circuit open for operation {operation}")]
    CircuitOpen { operation: String },

    /// Unexpected internal error; escalated, and increments the breaker for
    /// the operation that raised it.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse failure classes surfaced in `DiscoveryResult` metadata so a caller
/// can distinguish "no cycles exist" from "we timed out looking".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    BudgetExceeded,
    CollectionUnavailable,
    ExpansionBudgetExceeded,
    CircuitOpen,
    Internal,
}

impl EngineError {
    /// Classify this error for metadata reporting, if it belongs to the
    /// "logged and continue" family rather than the "abort the call" family.
    pub fn failure_class(&self) -> Option<FailureClass> {
        match self {
            EngineError::BudgetExceeded => Some(FailureClass::BudgetExceeded),
            EngineError::CollectionUnavailable { .. } => Some(FailureClass::CollectionUnavailable),
            EngineError::ExpansionBudgetExceeded => Some(FailureClass::ExpansionBudgetExceeded),
            EngineError::CircuitOpen { .. } => Some(FailureClass::CircuitOpen),
            EngineError::Internal(_) => Some(FailureClass::Internal),
            EngineError::InvalidInput(_) => None,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_has_no_failure_class() {
        assert_eq!(EngineError::InvalidInput("x".into()).failure_class(), None);
    }

    #[test]
    fn budget_exceeded_classifies() {
        assert_eq!(
            EngineError::BudgetExceeded.failure_class(),
            Some(FailureClass::BudgetExceeded)
        );
    }
}
