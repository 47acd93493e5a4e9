//! A deterministic keyword oracle.
//!
//! Stands in for an LLM in the CLI and in end-to-end tests. It answers every
//! task with a reply that passes the stage schemas, judging only by how much
//! of the requirement's vocabulary the supplied evidence repeats. It is not
//! meant to be a good auditor, only a predictable one.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use gapwise_contracts::{
    error::OracleError,
    oracle::{OracleReply, OracleRequest, OracleTask},
    route::{GapRoute, Level},
};
use gapwise_core::{rating::rate, traits::Oracle};

use crate::terms::{coverage, key_terms, mentions_any};

/// Wording that marks a requirement as cosmetic.
const COSMETIC: &[&str] = &["cosmetic", "font", "formatting", "letterhead", "logo", "typograph"];

/// Subjects that stay risky even when policy covers them.
const HIGH_RISK: &[&str] = &[
    "cardholder",
    "encrypt",
    "payment",
    "personal data",
    "privileged",
    "remote access",
    "third part",
    "vendor",
];

/// Wording that makes a requirement stricter than a general policy line.
const STRICTER: &[&str] = &["annual", "daily", "every", "hours", "monthly", "quarterly", "within"];

/// Evidence coverage at or above which a requirement counts as addressed.
const ADDRESSED: f64 = 0.5;

/// Longest requirement excerpt quoted back in findings and statements.
const EXCERPT_CHARS: usize = 160;

#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicOracle;

impl HeuristicOracle {
    pub fn new() -> Self {
        Self
    }

    fn gap_routing(request: &OracleRequest) -> Value {
        let requirement = request.field("requirement").unwrap_or_default();
        let evidence = request.field("evidence").unwrap_or_default();
        let covered = coverage(&key_terms(requirement), evidence);

        let (route, confidence, reason) = if mentions_any(requirement, COSMETIC) {
            (GapRoute::DropGap, 0.9, "Requirement is presentational and not decision-relevant.")
        } else if covered >= ADDRESSED && mentions_any(requirement, HIGH_RISK) {
            (
                GapRoute::NoGapHighRisk,
                covered,
                "Policy addresses the requirement but the subject carries elevated risk.",
            )
        } else if covered >= ADDRESSED {
            (GapRoute::DropGap, covered, "Existing policy already addresses the requirement.")
        } else {
            (
                GapRoute::KeepGap,
                1.0 - covered,
                "Internal policy does not address the requirement.",
            )
        };

        json!({
            "route": route.as_str(),
            "confidence": round2(confidence),
            "reason": reason,
        })
    }

    fn gap_finding(request: &OracleRequest) -> Value {
        let requirement = request.field("requirement").unwrap_or_default();
        let evidence = request.field("evidence").unwrap_or_default();

        let mandatory = mentions_any(requirement, &["must", "shall", "required"]);
        let severity = match (mandatory, mentions_any(requirement, HIGH_RISK)) {
            (true, true) => Level::High,
            (true, false) | (false, true) => Level::Medium,
            (false, false) => Level::Low,
        };

        let mut reply = json!({
            "gap_summary": format!("Internal policy does not establish: {}", excerpt(requirement)),
            "severity": severity.as_str(),
            "recommendation": format!(
                "Adopt and approve a documented control that meets: {}",
                excerpt(requirement)
            ),
        });
        if let Some(source) = first_source(evidence) {
            reply["source_ref"] = json!(source);
        }
        reply
    }

    fn risk_assessment(request: &OracleRequest) -> Value {
        let requirement = request.field("requirement").unwrap_or_default();
        let evidence = request.field("evidence").unwrap_or_default();
        let context = request.field("gap_context").unwrap_or_default();

        let impact = if mentions_any(requirement, HIGH_RISK) || context.contains("Severity: High") {
            Level::High
        } else {
            Level::Medium
        };
        let likelihood = if coverage(&key_terms(requirement), evidence) >= ADDRESSED {
            Level::Low
        } else if context.starts_with("Gap:") {
            Level::High
        } else {
            Level::Medium
        };

        json!({
            "risk_statement": format!(
                "If the control described by '{}' is not operating, then the organization is exposed to undetected failures and regulatory findings",
                excerpt(requirement).replace(", then ", " then ")
            ),
            "impact": impact.as_str(),
            "likelihood": likelihood.as_str(),
            "rating": rate(impact, likelihood).as_str(),
            "recommended_control": format!("Assign an owner and test periodically: {}", excerpt(requirement)),
        })
    }

    fn delta_detection(request: &OracleRequest) -> Value {
        let requirement = request.field("requirement").unwrap_or_default();
        let policy = request.field("internal_policy").unwrap_or_default();
        let covered = coverage(&key_terms(requirement), policy);

        let decision = if covered >= 0.7 && !mentions_any(requirement, STRICTER) {
            "COVERED"
        } else if covered >= 0.3 && mentions_any(requirement, STRICTER) {
            "STRONGER"
        } else if covered >= 0.7 {
            "COVERED"
        } else {
            "NOT_COVERED"
        };
        json!({ "decision": decision })
    }
}

#[async_trait]
impl Oracle for HeuristicOracle {
    async fn ask(&self, request: &OracleRequest) -> Result<OracleReply, OracleError> {
        let payload = match request.task {
            OracleTask::GapRouting => Self::gap_routing(request),
            OracleTask::GapFinding => Self::gap_finding(request),
            OracleTask::RiskAssessment => Self::risk_assessment(request),
            OracleTask::DeltaDetection => Self::delta_detection(request),
        };
        debug!(task = %request.task, "heuristic oracle answered");
        Ok(OracleReply::new(request.task, payload))
    }
}

fn round2(value: f64) -> f64 {
    (value.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}

/// The `[source]` tag of the first rendered evidence passage.
fn first_source(evidence: &str) -> Option<&str> {
    let rest = evidence.trim_start().strip_prefix('[')?;
    let (source, _) = rest.split_once(']')?;
    let source = source.trim();
    (!source.is_empty()).then_some(source)
}
