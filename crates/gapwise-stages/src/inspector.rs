//! The Inspector: first triage of a requirement against its evidence.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use gapwise_contracts::{
    case::{Case, GapDecision, StageOutput},
    error::GapwiseResult,
    oracle::{OracleRequest, OracleTask},
    route::{GapRoute, StageName},
    verify::OutputSchema,
};
use gapwise_core::{
    traits::{Stage, Verifier},
    GuardedOracle,
};

use crate::{decode::decode, schemas};

#[derive(Debug, Deserialize)]
struct RoutingReply {
    route: GapRoute,
    confidence: f64,
    reason: String,
    #[serde(default)]
    status: Option<String>,
}

/// Decides KEEP_GAP, DROP_GAP, or NO_GAP_HIGH_RISK.
///
/// Sends the requirement, evidence, and scope, plus any prior-pass severity
/// and rating so the oracle can weigh an earlier assessment.
pub struct Inspector {
    oracle: GuardedOracle,
    verifier: Arc<dyn Verifier>,
    schema: OutputSchema,
}

impl Inspector {
    pub fn new(oracle: GuardedOracle, verifier: Arc<dyn Verifier>) -> Self {
        Self {
            oracle,
            verifier,
            schema: schemas::gap_routing(),
        }
    }

    fn request(case: &Case) -> OracleRequest {
        let mut request = OracleRequest::new(OracleTask::GapRouting)
            .with_field("requirement", case.requirement())
            .with_field("evidence", case.evidence())
            .with_field("scope", case.scope());

        if let Some(prior) = case.prior() {
            if let Some(severity) = prior.gap_severity {
                request = request.with_field("prior_gap_severity", severity.as_str());
            }
            if let Some(rating) = prior.rating {
                request = request.with_field("prior_rating", rating.as_str());
            }
        }
        request
    }
}

#[async_trait]
impl Stage for Inspector {
    fn name(&self) -> StageName {
        StageName::Inspector
    }

    async fn apply(&self, case: &Case) -> GapwiseResult<StageOutput> {
        let reply = self.oracle.ask(StageName::Inspector, &Self::request(case)).await?;
        let decoded: RoutingReply =
            decode(self.verifier.as_ref(), StageName::Inspector.as_str(), &reply, &self.schema)?;

        info!(
            case_id = %case.id(),
            route = %decoded.route,
            confidence = decoded.confidence,
            "inspector routed case"
        );

        Ok(StageOutput::Routing(GapDecision {
            route: decoded.route,
            confidence: decoded.confidence,
            reason: decoded.reason,
            status: decoded.status,
        }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use gapwise_contracts::{
        case::PriorAssessment,
        error::GapwiseError,
        route::{Level, Rating},
    };

    use super::*;
    use crate::testing::fixed;

    fn case() -> Case {
        Case::new("MFA is required for remote access", "VPN requires passwords.", "ISO 27001")
            .unwrap()
    }

    #[tokio::test]
    async fn valid_reply_becomes_routing() {
        let (_, oracle, verifier) =
            fixed(json!({ "route": "KEEP_GAP", "confidence": 0.82, "reason": "MFA absent" }));
        let inspector = Inspector::new(oracle, verifier);

        match inspector.apply(&case()).await.unwrap() {
            StageOutput::Routing(decision) => {
                assert_eq!(decision.route, GapRoute::KeepGap);
                assert_eq!(decision.confidence, 0.82);
                assert_eq!(decision.status, None);
            }
            other => panic!("expected Routing, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn route_outside_enumeration_is_a_schema_violation() {
        let (_, oracle, verifier) =
            fixed(json!({ "route": "MAYBE_GAP", "confidence": 0.5, "reason": "unsure" }));
        let inspector = Inspector::new(oracle, verifier);

        match inspector.apply(&case()).await {
            Err(GapwiseError::SchemaViolation { stage, reason }) => {
                assert_eq!(stage, "inspector");
                assert!(reason.contains("route-enum"), "{reason}");
            }
            other => panic!("expected SchemaViolation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn request_carries_scope_and_prior() {
        let (raw, oracle, verifier) =
            fixed(json!({ "route": "DROP_GAP", "confidence": 0.9, "reason": "covered" }));
        let inspector = Inspector::new(oracle, verifier);
        let seeded = case().with_prior(PriorAssessment {
            gap_severity: Some(Level::Medium),
            rating: Some(Rating::High),
        });

        inspector.apply(&seeded).await.unwrap();

        let requests = raw.requests.lock().unwrap();
        assert_eq!(requests.len(), 1, "one oracle call per apply");
        let request = &requests[0];
        assert_eq!(request.task, OracleTask::GapRouting);
        assert_eq!(request.field("scope"), Some("ISO 27001"));
        assert_eq!(request.field("prior_gap_severity"), Some("Medium"));
        assert_eq!(request.field("prior_rating"), Some("High"));
    }
}
