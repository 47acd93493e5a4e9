//! The Risk Assessor: risk statement, impact, likelihood, and control.
//!
//! The oracle proposes a rating, but the stored rating always comes from
//! `gapwise_core::rating::rate`. A disagreeing proposal is logged and
//! replaced.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use gapwise_contracts::{
    case::{Case, RiskAssessment, StageOutput},
    error::{GapwiseError, GapwiseResult},
    oracle::{OracleRequest, OracleTask},
    route::{GapRoute, Level, Rating, StageName},
    verify::OutputSchema,
};
use gapwise_core::{
    rating::rate,
    traits::{Stage, Verifier},
    GuardedOracle,
};

use crate::{decode::decode, schemas};

/// Context sent in place of a finding on `NO_GAP_HIGH_RISK`.
pub const NO_GAP_NOTE: &str =
    "No formal gap identified; elevated contextual risk requires assessment.";

#[derive(Debug, Deserialize)]
struct RiskReply {
    risk_statement: String,
    impact: Level,
    likelihood: Level,
    rating: Rating,
    recommended_control: String,
}

pub struct RiskAssessor {
    oracle: GuardedOracle,
    verifier: Arc<dyn Verifier>,
    schema: OutputSchema,
}

impl RiskAssessor {
    pub fn new(oracle: GuardedOracle, verifier: Arc<dyn Verifier>) -> Self {
        Self {
            oracle,
            verifier,
            schema: schemas::risk_assessment(),
        }
    }

    /// The gap context for the oracle: the Auditor's finding on KEEP_GAP,
    /// the fixed note on NO_GAP_HIGH_RISK.
    fn gap_context(case: &Case) -> GapwiseResult<String> {
        match (case.gap_route(), case.finding()) {
            (Some(GapRoute::KeepGap), Some(finding)) => Ok(format!(
                "Gap: {}\nSeverity: {}\nRecommendation: {}",
                finding.summary, finding.severity, finding.recommendation
            )),
            (Some(GapRoute::KeepGap), None) => Err(GapwiseError::StateMachineError {
                reason: "risk assessment on KEEP_GAP requires the auditor's finding".to_string(),
            }),
            (Some(GapRoute::NoGapHighRisk), _) => Ok(NO_GAP_NOTE.to_string()),
            (Some(GapRoute::DropGap), _) | (None, _) => Err(GapwiseError::StateMachineError {
                reason: "risk assessor runs only on KEEP_GAP or NO_GAP_HIGH_RISK".to_string(),
            }),
        }
    }
}

#[async_trait]
impl Stage for RiskAssessor {
    fn name(&self) -> StageName {
        StageName::RiskAssessor
    }

    async fn apply(&self, case: &Case) -> GapwiseResult<StageOutput> {
        let request = OracleRequest::new(OracleTask::RiskAssessment)
            .with_field("requirement", case.requirement())
            .with_field("evidence", case.evidence())
            .with_field("gap_context", Self::gap_context(case)?);

        let reply = self.oracle.ask(StageName::RiskAssessor, &request).await?;
        let decoded: RiskReply =
            decode(self.verifier.as_ref(), StageName::RiskAssessor.as_str(), &reply, &self.schema)?;

        let rating = rate(decoded.impact, decoded.likelihood);
        if rating != decoded.rating {
            warn!(
                case_id = %case.id(),
                proposed = %decoded.rating,
                table = %rating,
                impact = %decoded.impact,
                likelihood = %decoded.likelihood,
                "oracle rating overridden by rating table"
            );
        }

        info!(case_id = %case.id(), rating = %rating, "risk assessed");

        Ok(StageOutput::Risk(RiskAssessment {
            statement: decoded.risk_statement.trim().to_string(),
            impact: decoded.impact,
            likelihood: decoded.likelihood,
            rating,
            recommended_control: decoded.recommended_control,
        }))
    }
}
