//! The Auditor: writes the gap finding for a KEEP_GAP case.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use gapwise_contracts::{
    case::{Case, GapFinding, StageOutput},
    error::{GapwiseError, GapwiseResult},
    oracle::{OracleRequest, OracleTask},
    route::{GapRoute, Level, StageName},
    verify::OutputSchema,
};
use gapwise_core::{
    traits::{Stage, Verifier},
    GuardedOracle,
};

use crate::{decode::decode, schemas};

#[derive(Debug, Deserialize)]
struct FindingReply {
    gap_summary: String,
    severity: Level,
    recommendation: String,
    #[serde(default)]
    source_ref: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Produces a consulting-ready gap finding. The reply is stored verbatim.
pub struct Auditor {
    oracle: GuardedOracle,
    verifier: Arc<dyn Verifier>,
    schema: OutputSchema,
}

impl Auditor {
    pub fn new(oracle: GuardedOracle, verifier: Arc<dyn Verifier>) -> Self {
        Self {
            oracle,
            verifier,
            schema: schemas::gap_finding(),
        }
    }
}

#[async_trait]
impl Stage for Auditor {
    fn name(&self) -> StageName {
        StageName::Auditor
    }

    async fn apply(&self, case: &Case) -> GapwiseResult<StageOutput> {
        // Checked before the oracle call so a misrouted case costs nothing.
        if case.gap_route() != Some(GapRoute::KeepGap) {
            return Err(GapwiseError::StateMachineError {
                reason: format!(
                    "auditor runs only on KEEP_GAP, case is {}",
                    case.gap_route().map(|r| r.as_str()).unwrap_or("unrouted")
                ),
            });
        }

        let request = OracleRequest::new(OracleTask::GapFinding)
            .with_field("requirement", case.requirement())
            .with_field("evidence", case.evidence());

        let reply = self.oracle.ask(StageName::Auditor, &request).await?;
        let decoded: FindingReply =
            decode(self.verifier.as_ref(), StageName::Auditor.as_str(), &reply, &self.schema)?;

        info!(case_id = %case.id(), severity = %decoded.severity, "auditor recorded gap");

        Ok(StageOutput::Finding(GapFinding {
            summary: decoded.gap_summary,
            severity: decoded.severity,
            recommendation: decoded.recommendation,
            source_ref: decoded.source_ref,
            status: decoded.status,
        }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use gapwise_contracts::case::GapDecision;

    use super::*;
    use crate::testing::fixed;

    fn routed(route: GapRoute) -> Case {
        Case::new("Backups must be tested quarterly", "Backups run nightly.", "SOC 2")
            .unwrap()
            .apply(
                StageName::Inspector,
                StageOutput::Routing(GapDecision {
                    route,
                    confidence: 0.7,
                    reason: "no restore tests".to_string(),
                    status: None,
                }),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn finding_is_written_verbatim() {
        let (_, oracle, verifier) = fixed(json!({
            "gap_summary": "Restore tests are not performed",
            "severity": "High",
            "recommendation": "Run quarterly restore drills",
            "source_ref": "BCP §4.2"
        }));
        let auditor = Auditor::new(oracle, verifier);

        match auditor.apply(&routed(GapRoute::KeepGap)).await.unwrap() {
            StageOutput::Finding(finding) => {
                assert_eq!(finding.summary, "Restore tests are not performed");
                assert_eq!(finding.severity, Level::High);
                assert_eq!(finding.source_ref.as_deref(), Some("BCP §4.2"));
                assert_eq!(finding.status, None);
            }
            other => panic!("expected Finding, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_severity_is_rejected() {
        let (_, oracle, verifier) = fixed(json!({
            "gap_summary": "s",
            "severity": "Catastrophic",
            "recommendation": "r"
        }));
        let auditor = Auditor::new(oracle, verifier);

        let err = auditor.apply(&routed(GapRoute::KeepGap)).await.unwrap_err();
        assert!(matches!(err, GapwiseError::SchemaViolation { .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn refuses_non_keep_cases_without_asking() {
        let (raw, oracle, verifier) = fixed(json!({}));
        let auditor = Auditor::new(oracle, verifier);

        let err = auditor.apply(&routed(GapRoute::NoGapHighRisk)).await.unwrap_err();

        assert!(matches!(err, GapwiseError::StateMachineError { .. }), "got {:?}", err);
        assert!(raw.requests.lock().unwrap().is_empty());
    }
}
