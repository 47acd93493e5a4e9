//! Configuration sections.
//!
//! Every field has a default, so an empty document is a valid configuration.
//! Unknown keys are rejected to catch typos early.
//!
//! ```toml
//! [pipeline]
//! scope = "General compliance review"
//! theme = "General Compliance"
//! materiality_check = true
//!
//! [oracle]
//! timeout_ms = 30000
//! max_attempts = 3
//! backoff_ms = 250
//!
//! [batch]
//! max_concurrency = 4
//!
//! [evidence]
//! top_k = 3
//!
//! [intake]
//! auto_approve_threshold = 0.8
//! ```

use serde::{Deserialize, Serialize};

use gapwise_contracts::case::{DEFAULT_SCOPE, DEFAULT_THEME};

/// Workflow shape and case defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSection {
    /// Engagement scope sent to the Inspector.
    pub scope: String,
    /// Theme for requirements that do not name one.
    pub theme: String,
    /// Route risk assessments through the materiality check.
    pub materiality_check: bool,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            scope: DEFAULT_SCOPE.to_string(),
            theme: DEFAULT_THEME.to_string(),
            materiality_check: true,
        }
    }
}

/// Per-call oracle timeout and retry budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OracleSection {
    pub timeout_ms: u64,
    pub max_attempts: u32,
    /// Delay after the first failure; doubles per retry.
    pub backoff_ms: u64,
}

impl Default for OracleSection {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_attempts: 3,
            backoff_ms: 250,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchSection {
    /// Cases in flight at once.
    pub max_concurrency: usize,
}

impl Default for BatchSection {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvidenceSection {
    /// Passages retrieved per requirement.
    pub top_k: usize,
}

impl Default for EvidenceSection {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntakeSection {
    /// Extraction confidence at or above which a candidate skips review.
    pub auto_approve_threshold: f64,
}

impl Default for IntakeSection {
    fn default() -> Self {
        Self {
            auto_approve_threshold: 0.8,
        }
    }
}
