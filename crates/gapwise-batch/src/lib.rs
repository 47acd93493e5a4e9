//! # gapwise-batch
//!
//! Runs many requirements through one orchestrator with bounded concurrency,
//! and screens candidate requirements before they get there.
//!
//! ```text
//!   candidates ─► triage ─► DeltaFilter ─► BatchRunner ─► BatchReport
//!                   │            │
//!              needs review   covered
//! ```
//!
//! Every case gets its own `Case` value; the only state shared between case
//! tasks is the orchestrator (immutable after construction), the evidence
//! source (read-only) and the audit writer (append-only).

pub mod intake;
pub mod report;
pub mod requirement;
pub mod runner;

pub use intake::{parse_candidates, triage, Candidate, DeltaDecision, DeltaFilter, DeltaOutcome, Triage};
pub use report::{BatchReport, BatchSummary, CompletedCase, FailedCase, SkippedRequirement};
pub use requirement::{parse_requirements, Requirement};
pub use runner::{BatchRunner, BatchSettings, CancelHandle};
