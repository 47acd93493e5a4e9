//! Error types for the gapwise workflow.
//!
//! All fallible operations in the workflow return `GapwiseResult<T>`.
//! Variants carry enough context to produce a meaningful audit remark when a
//! case degrades to a "Processing Error" record.

use thiserror::Error;

/// The unified error type for the gapwise workspace.
#[derive(Debug, Error)]
pub enum GapwiseError {
    /// A case could not be constructed from the given inputs.
    #[error("invalid case: {reason}")]
    InvalidCase { reason: String },

    /// An oracle reply did not conform to the stage's reply schema.
    #[error("oracle reply for stage '{stage}' violates schema: {reason}")]
    SchemaViolation { stage: String, reason: String },

    /// The oracle could not be reached within the retry budget.
    #[error("oracle unavailable for stage '{stage}' after {attempts} attempt(s): {reason}")]
    OracleUnavailable {
        stage: String,
        attempts: u32,
        reason: String,
    },

    /// The evidence source failed. Fatal for the whole batch.
    #[error("evidence source unavailable: {reason}")]
    EvidenceUnavailable { reason: String },

    /// The stage graph is malformed (cycle, dangling edge, no path to the
    /// terminal node). Only ever raised at construction time.
    #[error("graph misconfigured: {reason}")]
    GraphMisconfigured { reason: String },

    /// The orchestrator took more steps than the graph has nodes.
    #[error("step limit of {limit} exceeded")]
    StepLimitExceeded { limit: usize },

    /// A stage tried to write a field group it does not own, or to write an
    /// owned group a second time.
    #[error("stage '{stage}' may not write field group '{field}'")]
    OwnershipViolation { stage: String, field: String },

    /// The case reached a stage whose preconditions do not hold.
    #[error("state machine error: {reason}")]
    StateMachineError { reason: String },

    /// The audit writer could not persist a record.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

impl GapwiseError {
    /// Return true if this error is confined to a single case.
    ///
    /// Local errors degrade the case to a "Processing Error" record. Anything
    /// else is surfaced to the caller.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            GapwiseError::SchemaViolation { .. }
                | GapwiseError::OracleUnavailable { .. }
                | GapwiseError::OwnershipViolation { .. }
                | GapwiseError::StateMachineError { .. }
        )
    }
}

/// Transport-level failures reported by an oracle implementation.
///
/// Kept separate from `GapwiseError` so the retry guard can tell transient
/// failures apart from contract violations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    #[error("oracle call timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("oracle transport failure: {reason}")]
    Transport { reason: String },
}

/// Convenience alias used throughout the gapwise crates.
pub type GapwiseResult<T> = Result<T, GapwiseError>;
