//! # gapwise-ref
//!
//! Reference collaborators for running gapwise without external services:
//!
//! - `ScriptedOracle`: canned replies per task, for scenarios and tests.
//! - `HeuristicOracle`: a deterministic keyword oracle that answers every
//!   task with a schema-valid reply.
//! - `KeywordIndex`: an evidence source over a bundled, fictional policy
//!   corpus, with a switchable outage mode.
//! - `scenarios`: the four reference runs through the real workflow.
//!
//! Nothing here makes a network call.

pub mod heuristic;
pub mod index;
pub mod scenarios;
pub mod scripted;
pub mod terms;

pub use heuristic::HeuristicOracle;
pub use index::{KeywordIndex, BUNDLED_POLICIES};
pub use scenarios::ScenarioRun;
pub use scripted::ScriptedOracle;

/// Sample requirements listing for the CLI, in `theme | requirement` form.
pub const SAMPLE_REQUIREMENTS: &str = include_str!("../data/requirements.txt");
