//! The Materiality Check: a pure rule over the stored rating.

use async_trait::async_trait;
use tracing::debug;

use gapwise_contracts::{
    case::{Case, MaterialityDecision, StageOutput},
    error::{GapwiseError, GapwiseResult},
    route::{RiskRoute, StageName},
};
use gapwise_core::{rating::materiality, traits::Stage};

/// Medium and above is material. No oracle call; confidence is always 1.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialityCheck;

#[async_trait]
impl Stage for MaterialityCheck {
    fn name(&self) -> StageName {
        StageName::MaterialityCheck
    }

    async fn apply(&self, case: &Case) -> GapwiseResult<StageOutput> {
        let rating = case.rating().ok_or_else(|| GapwiseError::StateMachineError {
            reason: "materiality check requires a risk rating".to_string(),
        })?;

        let route = materiality(rating);
        let reason = match route {
            RiskRoute::KeepRisk => format!("rating {rating} is material"),
            RiskRoute::DropRisk => format!("rating {rating} is below the materiality threshold"),
        };
        debug!(case_id = %case.id(), rating = %rating, route = %route, "materiality decided");

        Ok(StageOutput::Materiality(MaterialityDecision {
            route,
            confidence: 1.0,
            reason,
        }))
    }
}
