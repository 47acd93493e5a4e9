//! Classification oracle request and reply types.
//!
//! An oracle is anything that answers a structured classification question:
//! an LLM behind an HTTP API, a rules engine, or a scripted test double. The
//! workflow only depends on this contract. Prompt wording is the oracle's
//! business; the request carries the raw text fields a stage wants judged.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Which question the oracle is being asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OracleTask {
    /// Inspector: KEEP_GAP / DROP_GAP / NO_GAP_HIGH_RISK.
    GapRouting,
    /// Auditor: structured gap finding.
    GapFinding,
    /// Risk Assessor: risk statement, impact, likelihood, control.
    RiskAssessment,
    /// Intake: is a candidate requirement already covered by internal policy.
    DeltaDetection,
}

impl OracleTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            OracleTask::GapRouting => "gap-routing",
            OracleTask::GapFinding => "gap-finding",
            OracleTask::RiskAssessment => "risk-assessment",
            OracleTask::DeltaDetection => "delta-detection",
        }
    }
}

impl fmt::Display for OracleTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single oracle question.
///
/// `fields` is ordered so the request serializes identically every time,
/// which keeps oracle-side caching and replay deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub task: OracleTask,
    pub fields: BTreeMap<String, String>,
}

impl OracleRequest {
    pub fn new(task: OracleTask) -> Self {
        Self {
            task,
            fields: BTreeMap::new(),
        }
    }

    /// Add a text field to the request.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// The structured answer returned by an oracle.
///
/// The payload is raw JSON. Stages verify it against their reply schema
/// before deserializing it into typed fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleReply {
    pub task: OracleTask,
    pub payload: serde_json::Value,
}

impl OracleReply {
    pub fn new(task: OracleTask, payload: serde_json::Value) -> Self {
        Self { task, payload }
    }
}
