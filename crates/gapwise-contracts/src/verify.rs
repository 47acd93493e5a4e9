//! Reply verification schema and report types.
//!
//! Every stage that consults an oracle declares an `OutputSchema`. The
//! verifier checks the raw reply against it before the stage deserializes a
//! single field, so a malformed reply is reported as a schema violation
//! instead of leaking half-parsed values into the case.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The complete contract an oracle reply must satisfy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSchema {
    /// Unique identifier for this schema (e.g. "gap-routing-v1").
    pub schema_id: String,
    /// JSON Schema document for structural validation. `Null` disables it.
    pub json_schema: Value,
    /// Domain rules evaluated after structural validation.
    pub rules: Vec<VerificationRule>,
}

/// A single named rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRule {
    /// Referenced in failure reports.
    pub rule_id: String,
    pub description: String,
    pub rule_type: VerificationRuleType,
}

/// Built-in rule kinds. Field paths use dot notation, e.g. `"finding.severity"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VerificationRuleType {
    /// Present and non-null.
    RequiredField { field_path: String },

    /// Equal to one of `allowed`.
    AllowedValues {
        field_path: String,
        allowed: Vec<Value>,
    },

    /// A number within `[min, max]` inclusive.
    NumberRange {
        field_path: String,
        min: f64,
        max: f64,
    },

    /// A string of at most `max_chars` characters.
    MaxLength {
        field_path: String,
        max_chars: usize,
    },

    /// A string that does not contain `pattern` (case-insensitive substring).
    ForbiddenPattern {
        field_path: String,
        pattern: String,
    },

    /// Delegate to a function registered with the verifier under this name.
    Custom { function_name: String },
}

/// Outcome of running every rule in a schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub passed: bool,
    pub failures: Vec<VerificationFailure>,
}

impl VerificationReport {
    /// All failure messages joined into one line, for error reasons and logs.
    pub fn summary(&self) -> String {
        self.failures
            .iter()
            .map(|f| format!("[{}] {}", f.rule_id, f.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationFailure {
    pub rule_id: String,
    pub message: String,
}
