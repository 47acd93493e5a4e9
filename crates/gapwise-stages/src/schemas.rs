//! Reply schemas for every oracle task.
//!
//! Each schema pairs a JSON Schema document (shape and types) with semantic
//! rules (enumerations, ranges, length limits). The enumerations are built
//! from the contract enums so the wire vocabulary has a single source.

use serde_json::{json, Value};

use gapwise_contracts::{
    route::{GapRoute, Level, Rating},
    verify::{OutputSchema, VerificationRule, VerificationRuleType},
};
use gapwise_verify::SchemaVerifier;

/// Upper bound on a risk statement, in characters.
pub const RISK_STATEMENT_MAX_CHARS: usize = 400;

/// Name of the custom rule checking the "If <event>, then <consequence>" shape.
pub const RISK_STATEMENT_FORMAT: &str = "risk-statement-format";

/// Delta decisions, in wire form.
pub const DELTA_DECISIONS: [&str; 3] = ["COVERED", "NOT_COVERED", "STRONGER"];

fn rule(rule_id: &str, description: &str, rule_type: VerificationRuleType) -> VerificationRule {
    VerificationRule {
        rule_id: rule_id.to_string(),
        description: description.to_string(),
        rule_type,
    }
}

fn allowed(field_path: &str, values: impl IntoIterator<Item = &'static str>) -> VerificationRuleType {
    VerificationRuleType::AllowedValues {
        field_path: field_path.to_string(),
        allowed: values.into_iter().map(|v| json!(v)).collect(),
    }
}

fn levels() -> impl Iterator<Item = &'static str> {
    Level::ALL.into_iter().map(|l| l.as_str())
}

/// Inspector reply: `{route, confidence, reason, status?}`.
pub fn gap_routing() -> OutputSchema {
    OutputSchema {
        schema_id: "gap-routing-v1".to_string(),
        json_schema: json!({
            "type": "object",
            "properties": {
                "route": { "type": "string" },
                "confidence": { "type": "number" },
                "reason": { "type": "string", "minLength": 1 },
                "status": { "type": ["string", "null"] }
            },
            "required": ["route", "confidence", "reason"]
        }),
        rules: vec![
            rule(
                "route-enum",
                "route must be KEEP_GAP, DROP_GAP, or NO_GAP_HIGH_RISK",
                allowed("route", GapRoute::ALL.into_iter().map(|r| r.as_str())),
            ),
            rule(
                "confidence-range",
                "confidence must lie in [0, 1]",
                VerificationRuleType::NumberRange {
                    field_path: "confidence".to_string(),
                    min: 0.0,
                    max: 1.0,
                },
            ),
        ],
    }
}

/// Auditor reply: `{gap_summary, severity, recommendation, source_ref?, status?}`.
pub fn gap_finding() -> OutputSchema {
    OutputSchema {
        schema_id: "gap-finding-v1".to_string(),
        json_schema: json!({
            "type": "object",
            "properties": {
                "gap_summary": { "type": "string", "minLength": 1 },
                "severity": { "type": "string" },
                "recommendation": { "type": "string", "minLength": 1 },
                "source_ref": { "type": ["string", "null"] },
                "status": { "type": ["string", "null"] }
            },
            "required": ["gap_summary", "severity", "recommendation"]
        }),
        rules: vec![rule(
            "severity-enum",
            "severity must be Low, Medium, or High",
            allowed("severity", levels()),
        )],
    }
}

/// Risk Assessor reply:
/// `{risk_statement, impact, likelihood, rating, recommended_control}`.
pub fn risk_assessment() -> OutputSchema {
    OutputSchema {
        schema_id: "risk-assessment-v1".to_string(),
        json_schema: json!({
            "type": "object",
            "properties": {
                "risk_statement": { "type": "string" },
                "impact": { "type": "string" },
                "likelihood": { "type": "string" },
                "rating": { "type": "string" },
                "recommended_control": { "type": "string", "minLength": 1 }
            },
            "required": ["risk_statement", "impact", "likelihood", "rating", "recommended_control"]
        }),
        rules: vec![
            rule("impact-enum", "impact must be Low, Medium, or High", allowed("impact", levels())),
            rule(
                "likelihood-enum",
                "likelihood must be Low, Medium, or High",
                allowed("likelihood", levels()),
            ),
            rule(
                "rating-enum",
                "rating must be Low, Medium, High, or Critical",
                allowed("rating", Rating::ALL.into_iter().map(|r| r.as_str())),
            ),
            rule(
                "risk-statement-length",
                "risk statement must fit in 400 characters",
                VerificationRuleType::MaxLength {
                    field_path: "risk_statement".to_string(),
                    max_chars: RISK_STATEMENT_MAX_CHARS,
                },
            ),
            rule(
                "risk-statement-format",
                "risk statement must read 'If <event>, then <consequence>'",
                VerificationRuleType::Custom {
                    function_name: RISK_STATEMENT_FORMAT.to_string(),
                },
            ),
        ],
    }
}

/// Intake delta reply: `{decision, reason?}`.
pub fn delta_detection() -> OutputSchema {
    OutputSchema {
        schema_id: "delta-detection-v1".to_string(),
        json_schema: json!({
            "type": "object",
            "properties": {
                "decision": { "type": "string" },
                "reason": { "type": ["string", "null"] }
            },
            "required": ["decision"]
        }),
        rules: vec![rule(
            "decision-enum",
            "decision must be COVERED, NOT_COVERED, or STRONGER",
            allowed("decision", DELTA_DECISIONS),
        )],
    }
}

/// Check the "If <event>, then <consequence>" shape of `risk_statement`.
///
/// Missing or non-string statements pass here; the structural phase reports
/// those.
pub fn check_risk_statement(payload: &Value) -> Option<String> {
    let statement = payload.get("risk_statement")?.as_str()?.trim();

    let Some(rest) = statement.strip_prefix("If ") else {
        return Some("risk statement must start with 'If '".to_string());
    };
    match rest.split_once(", then ") {
        Some((event, consequence)) if !event.trim().is_empty() && !consequence.trim().is_empty() => None,
        _ => Some("risk statement must read 'If <event>, then <consequence>'".to_string()),
    }
}

/// A verifier with every custom rule the schemas above reference.
pub fn reply_verifier() -> SchemaVerifier {
    let mut verifier = SchemaVerifier::new();
    verifier.register_rule(RISK_STATEMENT_FORMAT, Box::new(check_risk_statement));
    verifier
}

#[cfg(test)]
mod tests {
    use gapwise_contracts::oracle::{OracleReply, OracleTask};
    use gapwise_core::traits::Verifier;

    use super::*;

    fn verify(task: OracleTask, schema: &OutputSchema, payload: Value) -> Vec<String> {
        reply_verifier()
            .verify(&OracleReply::new(task, payload), schema)
            .unwrap()
            .failures
            .into_iter()
            .map(|f| f.rule_id)
            .collect()
    }

    #[test]
    fn risk_statement_shape() {
        assert_eq!(check_risk_statement(&json!({ "risk_statement": "If keys leak, then data is exposed" })), None);
        assert!(check_risk_statement(&json!({ "risk_statement": "Keys may leak" })).is_some());
        assert!(check_risk_statement(&json!({ "risk_statement": "If keys leak then data is exposed" })).is_some());
        assert!(check_risk_statement(&json!({ "risk_statement": "If , then x" })).is_some());
        assert_eq!(check_risk_statement(&json!({})), None);
    }

    #[test]
    fn routing_schema_rejects_unknown_route_and_bad_confidence() {
        let failures = verify(
            OracleTask::GapRouting,
            &gap_routing(),
            json!({ "route": "PARTIAL_GAP", "confidence": 3, "reason": "r" }),
        );
        assert!(failures.contains(&"route-enum".to_string()), "{failures:?}");
        assert!(failures.contains(&"confidence-range".to_string()), "{failures:?}");
    }

    #[test]
    fn routing_schema_accepts_optional_status() {
        let failures = verify(
            OracleTask::GapRouting,
            &gap_routing(),
            json!({ "route": "NO_GAP_HIGH_RISK", "confidence": 0.4, "reason": "r", "status": null }),
        );
        assert!(failures.is_empty(), "{failures:?}");
    }

    #[test]
    fn finding_schema_requires_known_severity() {
        let failures = verify(
            OracleTask::GapFinding,
            &gap_finding(),
            json!({ "gap_summary": "s", "severity": "Severe", "recommendation": "r" }),
        );
        assert_eq!(failures, vec!["severity-enum".to_string()]);
    }

    #[test]
    fn risk_schema_limits_statement_length() {
        let long = format!("If {}, then breach", "x".repeat(RISK_STATEMENT_MAX_CHARS));
        let failures = verify(
            OracleTask::RiskAssessment,
            &risk_assessment(),
            json!({
                "risk_statement": long,
                "impact": "High",
                "likelihood": "Low",
                "rating": "Medium",
                "recommended_control": "c"
            }),
        );
        assert_eq!(failures, vec!["risk-statement-length".to_string()]);
    }

    #[test]
    fn delta_schema_enumerates_decisions() {
        assert!(verify(OracleTask::DeltaDetection, &delta_detection(), json!({ "decision": "STRONGER" })).is_empty());
        assert_eq!(
            verify(OracleTask::DeltaDetection, &delta_detection(), json!({ "decision": "MAYBE" })),
            vec!["decision-enum".to_string()]
        );
    }
}
