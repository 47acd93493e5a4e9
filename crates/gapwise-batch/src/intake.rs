//! Requirement intake: triage and the delta filter.
//!
//! Candidates extracted from a new regulation arrive with an extraction
//! confidence. Triage auto-approves confident ones and queues the rest for a
//! human. The delta filter then asks the oracle whether internal policy
//! already covers each approved requirement; only uncovered or stronger ones
//! go on to the batch.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use gapwise_contracts::{
    error::{GapwiseError, GapwiseResult},
    evidence::render_evidence,
    oracle::{OracleRequest, OracleTask},
    verify::OutputSchema,
};
use gapwise_core::{
    traits::{EvidenceSource, Verifier},
    GuardedOracle,
};
use gapwise_stages::{decode::decode, schemas};

use crate::requirement::Requirement;

/// Name used for the delta check in logs and schema errors.
const DELTA_ASKER: &str = "delta-filter";

// ── Triage ───────────────────────────────────────────────────────────────────

/// An extracted requirement awaiting triage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub requirement: Requirement,
    /// Extraction confidence in [0, 1].
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Triage {
    pub approved: Vec<Requirement>,
    pub needs_review: Vec<Candidate>,
}

/// Parse an extraction export: a JSON array of candidates.
///
/// ```text
/// [{ "requirement": { "text": "MFA for remote access", "theme": "Access" }, "confidence": 0.93 }]
/// ```
///
/// # Errors
///
/// `InvalidCase` when the document is not a candidate array.
pub fn parse_candidates(json: &str) -> GapwiseResult<Vec<Candidate>> {
    serde_json::from_str(json).map_err(|err| GapwiseError::InvalidCase {
        reason: format!("malformed candidate list: {}", err),
    })
}

/// Split candidates at `threshold`. A confidence that is not a number always
/// goes to review.
pub fn triage(candidates: Vec<Candidate>, threshold: f64) -> Triage {
    let mut result = Triage::default();
    for candidate in candidates {
        if candidate.confidence >= threshold {
            result.approved.push(candidate.requirement);
        } else {
            result.needs_review.push(candidate);
        }
    }
    debug!(
        approved = result.approved.len(),
        needs_review = result.needs_review.len(),
        threshold,
        "intake triage"
    );
    result
}

// ── Delta filter ─────────────────────────────────────────────────────────────

/// The delta oracle's verdict on one requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeltaDecision {
    /// Internal policy already meets the requirement.
    Covered,
    NotCovered,
    /// The requirement is stricter than current policy.
    Stronger,
}

impl DeltaDecision {
    pub fn proceeds(&self) -> bool {
        !matches!(self, DeltaDecision::Covered)
    }
}

#[derive(Debug, Deserialize)]
struct DeltaReply {
    decision: DeltaDecision,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaOutcome {
    /// Requirements that go on to the batch.
    pub proceed: Vec<Requirement>,
    /// Requirements skipped as already covered.
    pub covered: Vec<Requirement>,
}

pub struct DeltaFilter {
    oracle: GuardedOracle,
    verifier: Arc<dyn Verifier>,
    evidence: Arc<dyn EvidenceSource>,
    top_k: usize,
    schema: OutputSchema,
}

impl DeltaFilter {
    pub fn new(
        oracle: GuardedOracle,
        verifier: Arc<dyn Verifier>,
        evidence: Arc<dyn EvidenceSource>,
        top_k: usize,
    ) -> Self {
        Self {
            oracle,
            verifier,
            evidence,
            top_k,
            schema: schemas::delta_detection(),
        }
    }

    /// Ask about one requirement.
    ///
    /// `Ok(None)` means the oracle gave no usable answer; the caller keeps
    /// the requirement so a reviewer sees it.
    ///
    /// # Errors
    ///
    /// Only evidence source failures, which are fatal as in a batch run.
    pub async fn check(&self, requirement: &Requirement) -> GapwiseResult<Option<DeltaDecision>> {
        let passages = self.evidence.retrieve(&requirement.text, self.top_k).await?;
        let request = OracleRequest::new(OracleTask::DeltaDetection)
            .with_field("requirement", requirement.text.as_str())
            .with_field("internal_policy", render_evidence(&passages));

        let reply = match self.oracle.ask_as(DELTA_ASKER, &request).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(requirement = %requirement.text, error = %err, "delta check unavailable, keeping requirement");
                return Ok(None);
            }
        };

        match decode::<DeltaReply>(self.verifier.as_ref(), DELTA_ASKER, &reply, &self.schema) {
            Ok(decoded) => Ok(Some(decoded.decision)),
            Err(GapwiseError::SchemaViolation { reason, .. }) => {
                warn!(requirement = %requirement.text, reason = %reason, "invalid delta reply, keeping requirement");
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    /// Filter `requirements`, keeping input order.
    pub async fn filter(&self, requirements: Vec<Requirement>) -> GapwiseResult<DeltaOutcome> {
        let mut outcome = DeltaOutcome::default();
        for requirement in requirements {
            match self.check(&requirement).await? {
                Some(decision) if !decision.proceeds() => outcome.covered.push(requirement),
                _ => outcome.proceed.push(requirement),
            }
        }
        info!(
            proceed = outcome.proceed.len(),
            covered = outcome.covered.len(),
            "delta filter applied"
        );
        Ok(outcome)
    }
}
