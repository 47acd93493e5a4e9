//! Core trait definitions for the gapwise workflow.
//!
//! These traits are the seams where collaborators are injected:
//!
//! - `Oracle`        : external classifier (usually an LLM); untrusted
//! - `EvidenceSource`: ranked passage retrieval; read-only during a run
//! - `Stage`         : one node of the workflow graph
//! - `Verifier`      : checks oracle replies against a stage's schema
//! - `AuditWriter`   : append-only sink for finalized records
//!
//! The orchestrator wires them together. Nothing in the workflow reaches for
//! a global client; every handle is passed in at construction.

use async_trait::async_trait;

use gapwise_contracts::{
    case::{Case, StageOutput},
    error::{GapwiseResult, OracleError},
    evidence::Passage,
    oracle::{OracleReply, OracleRequest},
    record::AuditRecord,
    route::StageName,
    verify::{OutputSchema, VerificationReport},
};

/// An external classification capability.
///
/// Implementations either return a reply or a transport-level failure.
/// Whether the reply's payload conforms to the asking stage's schema is
/// checked by the stage, not here.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn ask(&self, request: &OracleRequest) -> Result<OracleReply, OracleError>;
}

/// Ranked text retrieval over the evidence corpus.
///
/// The underlying index is read-only for the duration of a batch, so
/// implementations may be called concurrently from every case without
/// locking.
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    /// Return at most `top_k` passages for `query`, most relevant first.
    ///
    /// An `Err` here means the source itself is unavailable, which is fatal
    /// for the whole batch. "Nothing relevant" is an empty `Ok`.
    async fn retrieve(&self, query: &str, top_k: usize) -> GapwiseResult<Vec<Passage>>;
}

/// A named unit of the workflow graph.
///
/// A stage reads the case and returns the one field group it owns. It must
/// make at most one oracle call per `apply` and must never write to the
/// audit log. The engine folds the output into a new case value, which is
/// where ownership is enforced.
#[async_trait]
pub trait Stage: Send + Sync {
    /// The graph node this stage implements.
    fn name(&self) -> StageName;

    async fn apply(&self, case: &Case) -> GapwiseResult<StageOutput>;
}

/// The reply verifier.
///
/// Implementations must be pure: they inspect the reply and report every
/// failure they find. A failing report is turned into a schema violation by
/// the calling stage.
pub trait Verifier: Send + Sync {
    fn verify(&self, reply: &OracleReply, schema: &OutputSchema) -> GapwiseResult<VerificationReport>;
}

/// The audit log writer.
///
/// Each call to `write` appends exactly one whole record. Concurrent callers
/// must never observe or produce an interleaved record.
pub trait AuditWriter: Send + Sync {
    /// Append one finalized record.
    fn write(&self, record: &AuditRecord) -> GapwiseResult<()>;

    /// Seal the log for a finished batch run.
    ///
    /// Implementations may flush or sign here. The in-memory writer only logs.
    fn finalize(&self, run_id: &str) -> GapwiseResult<()>;
}
