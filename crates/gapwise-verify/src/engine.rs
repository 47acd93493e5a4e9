//! Schema-based reply verifier.
//!
//! `SchemaVerifier` implements the `Verifier` trait from `gapwise-core`.
//! Verification runs in two phases:
//!
//! 1. **Structural**: the `OracleReply` payload is validated against the
//!    `OutputSchema::json_schema` document using the `jsonschema` crate.
//! 2. **Semantic**: each `VerificationRule` in `OutputSchema::rules` is
//!    evaluated in order. All failures are collected before returning so a
//!    "Processing Error" remark names every problem with the reply at once.
//!
//! Custom rules delegate to named functions registered via `register_rule`.
//! Stage-specific checks (such as the risk statement's "If …, then …" shape)
//! are registered by the stages crate, not hard-coded here.

use std::collections::HashMap;

use tracing::{debug, warn};

use gapwise_contracts::{
    error::GapwiseResult,
    oracle::OracleReply,
    verify::{OutputSchema, VerificationFailure, VerificationReport, VerificationRuleType},
};
use gapwise_core::traits::Verifier;

/// A caller-supplied verification function.
///
/// Receives the full reply payload. Returns `Some(message)` when the check
/// fails, or `None` on success.
pub type CustomVerifierFn = Box<dyn Fn(&serde_json::Value) -> Option<String> + Send + Sync>;

/// The oracle reply verifier.
///
/// Combines JSON Schema structural validation with a set of semantic rules.
pub struct SchemaVerifier {
    custom_rules: HashMap<String, CustomVerifierFn>,
}

impl SchemaVerifier {
    /// Create a verifier with no custom rules registered.
    pub fn new() -> Self {
        Self {
            custom_rules: HashMap::new(),
        }
    }

    /// Register a custom verification function under `name`.
    ///
    /// The name must match the `function_name` used in
    /// `VerificationRuleType::Custom` rules. Registering the same name twice
    /// replaces the previous function.
    pub fn register_rule(&mut self, name: impl Into<String>, f: CustomVerifierFn) {
        self.custom_rules.insert(name.into(), f);
    }

    /// Whether a custom function is registered under `name`.
    pub fn has_rule(&self, name: &str) -> bool {
        self.custom_rules.contains_key(name)
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    /// Resolve a dot-notation field path (e.g. `"finding.severity"`) against a
    /// JSON value. Returns `None` when any segment is missing or the value is
    /// JSON `null`.
    fn resolve_path<'v>(value: &'v serde_json::Value, path: &str) -> Option<&'v serde_json::Value> {
        let mut current = value;
        for segment in path.split('.') {
            match current.get(segment) {
                Some(v) if !v.is_null() => current = v,
                _ => return None,
            }
        }
        Some(current)
    }

    fn check_rule(&self, payload: &serde_json::Value, rule_type: &VerificationRuleType) -> Option<String> {
        match rule_type {
            VerificationRuleType::RequiredField { field_path } => {
                if Self::resolve_path(payload, field_path).is_none() {
                    Some(format!("required field '{field_path}' is missing or null"))
                } else {
                    None
                }
            }

            VerificationRuleType::AllowedValues { field_path, allowed } => {
                match Self::resolve_path(payload, field_path) {
                    None => Some(format!(
                        "field '{field_path}' is missing; cannot check allowed values"
                    )),
                    Some(actual) if allowed.contains(actual) => None,
                    Some(actual) => Some(format!(
                        "field '{field_path}' has value {actual} which is not in the allowed set"
                    )),
                }
            }

            VerificationRuleType::NumberRange { field_path, min, max } => {
                match Self::resolve_path(payload, field_path) {
                    None => Some(format!(
                        "field '{field_path}' is missing; cannot check range"
                    )),
                    Some(v) => match v.as_f64() {
                        Some(n) if n >= *min && n <= *max => None,
                        Some(n) => Some(format!(
                            "field '{field_path}' is {n}, outside [{min}, {max}]"
                        )),
                        None => Some(format!("field '{field_path}' is not a number: {v}")),
                    },
                }
            }

            // Absent fields pass; presence is RequiredField's job.
            VerificationRuleType::MaxLength { field_path, max_chars } => {
                match Self::resolve_path(payload, field_path) {
                    None => None,
                    Some(v) => match v.as_str() {
                        Some(s) => {
                            let len = s.chars().count();
                            (len > *max_chars).then(|| {
                                format!(
                                    "field '{field_path}' is {len} characters, limit is {max_chars}"
                                )
                            })
                        }
                        None => Some(format!("field '{field_path}' is not a string")),
                    },
                }
            }

            // Non-string fields pass silently; the rule only applies to text.
            VerificationRuleType::ForbiddenPattern { field_path, pattern } => {
                let text = Self::resolve_path(payload, field_path).and_then(|v| v.as_str())?;
                if text.to_lowercase().contains(&pattern.to_lowercase()) {
                    Some(format!(
                        "field '{field_path}' contains forbidden pattern '{pattern}'"
                    ))
                } else {
                    None
                }
            }

            // An unregistered name is itself a failure so misconfigured rules
            // surface immediately.
            VerificationRuleType::Custom { function_name } => {
                match self.custom_rules.get(function_name.as_str()) {
                    Some(f) => f(payload),
                    None => Some(format!(
                        "no custom rule registered for function name '{function_name}'"
                    )),
                }
            }
        }
    }
}

impl Default for SchemaVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Verifier for SchemaVerifier {
    /// Verify `reply` against `schema`, accumulating every failure.
    fn verify(&self, reply: &OracleReply, schema: &OutputSchema) -> GapwiseResult<VerificationReport> {
        let mut failures: Vec<VerificationFailure> = Vec::new();
        let payload = &reply.payload;

        // ── Phase 1: JSON Schema structural validation ────────────────────────
        //
        // A null json_schema means "no structural constraint".
        if !schema.json_schema.is_null() {
            match jsonschema::validator_for(&schema.json_schema) {
                Ok(validator) => {
                    for error in validator.iter_errors(payload) {
                        let message = format!(
                            "JSON Schema violation at {}: {}",
                            error.instance_path, error
                        );
                        warn!(schema_id = %schema.schema_id, %message, "structural validation failure");
                        failures.push(VerificationFailure {
                            rule_id: "json-schema".to_string(),
                            message,
                        });
                    }
                }
                Err(e) => {
                    // A malformed schema document fails the reply rather than
                    // the batch, so the case still gets its record.
                    let message = format!("invalid JSON Schema document: {e}");
                    warn!(schema_id = %schema.schema_id, %message, "schema compilation failure");
                    failures.push(VerificationFailure {
                        rule_id: "json-schema".to_string(),
                        message,
                    });
                }
            }
        }

        // ── Phase 2: Semantic rule evaluation ────────────────────────────────
        for rule in &schema.rules {
            debug!(
                rule_id = %rule.rule_id,
                description = %rule.description,
                "evaluating verification rule"
            );

            if let Some(message) = self.check_rule(payload, &rule.rule_type) {
                warn!(rule_id = %rule.rule_id, %message, "semantic rule failed");
                failures.push(VerificationFailure {
                    rule_id: rule.rule_id.clone(),
                    message,
                });
            }
        }

        let passed = failures.is_empty();
        debug!(
            schema_id = %schema.schema_id,
            task = %reply.task,
            passed,
            failure_count = failures.len(),
            "verification complete"
        );

        Ok(VerificationReport { passed, failures })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
