//! # gapwise-core
//!
//! The workflow runtime for gapwise compliance reviews.
//!
//! This crate provides:
//! - The collaborator traits (`Oracle`, `EvidenceSource`, `Stage`, `Verifier`,
//!   `AuditWriter`)
//! - The validated `StageGraph` and its routers
//! - The `Orchestrator` that drives a case to its single audit record
//! - Terminal normalization (`finalize`) and the deterministic rating table
//! - `GuardedOracle`, the timeout and retry wrapper around oracle calls
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gapwise_core::{Orchestrator, StageGraph, traits::{Stage, AuditWriter}};
//!
//! let graph = StageGraph::canonical(true)?;
//! let orchestrator = Orchestrator::new(graph, stages, audit)?;
//! let outcome = orchestrator.run(case).await?;
//! ```

pub mod engine;
pub mod finalize;
pub mod graph;
pub mod guard;
pub mod rating;
pub mod traits;

pub use engine::{CaseOutcome, Orchestrator};
pub use graph::{GraphBuilder, StageGraph};
pub use guard::{GuardedOracle, RetryPolicy};
