//! The case record threaded through the workflow graph.
//!
//! A `Case` is created once per requirement with its immutable inputs
//! (requirement, evidence, scope). Each stage contributes exactly one field
//! group, expressed as a `StageOutput`. `Case::apply` folds an output into a
//! *new* case value after checking that the writing stage owns the group, that
//! the group has not been written before, and that the route preconditions for
//! that stage hold. Fields are private so no other code path can write them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    error::{GapwiseError, GapwiseResult},
    route::{GapRoute, Level, Rating, RiskRoute, StageName},
};

/// Default engagement scope when none is configured.
pub const DEFAULT_SCOPE: &str = "General compliance review";

/// Default theme label for records without an explicit clause theme.
pub const DEFAULT_THEME: &str = "General Compliance";

/// Unique identifier for one case. Appears in the case's audit record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaseId(pub uuid::Uuid);

impl CaseId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for CaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Assessment carried over from a previous pass over the same requirement.
///
/// Only the Inspector reads this, as extra context for its routing request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorAssessment {
    pub gap_severity: Option<Level>,
    pub rating: Option<Rating>,
}

// ── Stage-owned field groups ─────────────────────────────────────────────────

/// Fields owned by the Inspector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapDecision {
    pub route: GapRoute,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub reason: String,
    /// Optional route-level status that overrides the default status for
    /// `NO_GAP_HIGH_RISK` records.
    #[serde(default)]
    pub status: Option<String>,
}

/// Fields owned by the Auditor. Present only on `KEEP_GAP`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapFinding {
    pub summary: String,
    pub severity: Level,
    pub recommendation: String,
    #[serde(default)]
    pub source_ref: Option<String>,
    /// Finer-grained status that replaces "Non-Compliant (Gap)".
    #[serde(default)]
    pub status: Option<String>,
}

/// Fields owned by the Risk Assessor.
///
/// `rating` is always the table value for (`impact`, `likelihood`), so it can
/// never exist without both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub statement: String,
    pub impact: Level,
    pub likelihood: Level,
    pub rating: Rating,
    pub recommended_control: String,
}

/// Fields owned by the Materiality Check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialityDecision {
    pub route: RiskRoute,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub reason: String,
}

/// What a stage hands back to the engine: exactly one field group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageOutput {
    Routing(GapDecision),
    Finding(GapFinding),
    Risk(RiskAssessment),
    Materiality(MaterialityDecision),
}

impl StageOutput {
    /// The only stage allowed to produce this field group.
    pub fn owner(&self) -> StageName {
        match self {
            StageOutput::Routing(_) => StageName::Inspector,
            StageOutput::Finding(_) => StageName::Auditor,
            StageOutput::Risk(_) => StageName::RiskAssessor,
            StageOutput::Materiality(_) => StageName::MaterialityCheck,
        }
    }

    pub fn field_group(&self) -> &'static str {
        match self {
            StageOutput::Routing(_) => "gap_route",
            StageOutput::Finding(_) => "gap_finding",
            StageOutput::Risk(_) => "risk_assessment",
            StageOutput::Materiality(_) => "risk_route",
        }
    }
}

// ── Case ─────────────────────────────────────────────────────────────────────

/// The per-requirement unit of work.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Case {
    id: CaseId,
    theme: String,
    requirement: String,
    evidence: String,
    scope: String,
    prior: Option<PriorAssessment>,
    routing: Option<GapDecision>,
    finding: Option<GapFinding>,
    risk: Option<RiskAssessment>,
    materiality: Option<MaterialityDecision>,
}

impl Case {
    /// Seed a case with its immutable inputs.
    ///
    /// The requirement must contain non-whitespace text. Evidence may be empty
    /// when retrieval found nothing; that is itself a signal for the
    /// Inspector. A blank scope falls back to `DEFAULT_SCOPE`.
    pub fn new(
        requirement: impl Into<String>,
        evidence: impl Into<String>,
        scope: impl Into<String>,
    ) -> GapwiseResult<Self> {
        let requirement = requirement.into();
        if requirement.trim().is_empty() {
            return Err(GapwiseError::InvalidCase {
                reason: "requirement text is empty".to_string(),
            });
        }
        let scope = scope.into();
        let scope = if scope.trim().is_empty() {
            DEFAULT_SCOPE.to_string()
        } else {
            scope
        };

        Ok(Self {
            id: CaseId::new(),
            theme: DEFAULT_THEME.to_string(),
            requirement: requirement.trim().to_string(),
            evidence: evidence.into(),
            scope,
            prior: None,
            routing: None,
            finding: None,
            risk: None,
            materiality: None,
        })
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        let theme = theme.into();
        if !theme.trim().is_empty() {
            self.theme = theme;
        }
        self
    }

    pub fn with_prior(mut self, prior: PriorAssessment) -> Self {
        self.prior = Some(prior);
        self
    }

    /// Fold a stage's output into a new case value.
    ///
    /// # Errors
    ///
    /// - `OwnershipViolation` if `stage` does not own the output's field
    ///   group, or the group was already written.
    /// - `StateMachineError` if the route preconditions for `stage` do not
    ///   hold (e.g. an Auditor finding on a `DROP_GAP` case).
    /// - `SchemaViolation` if a confidence lies outside `[0, 1]`.
    pub fn apply(&self, stage: StageName, output: StageOutput) -> GapwiseResult<Case> {
        if output.owner() != stage {
            return Err(self.ownership(stage, &output));
        }

        let mut next = self.clone();
        match output {
            StageOutput::Routing(decision) => {
                if self.routing.is_some() {
                    return Err(self.ownership(stage, &StageOutput::Routing(decision)));
                }
                check_confidence(stage, decision.confidence)?;
                next.routing = Some(decision);
            }
            StageOutput::Finding(finding) => {
                if self.finding.is_some() {
                    return Err(self.ownership(stage, &StageOutput::Finding(finding)));
                }
                self.require_route(stage, &[GapRoute::KeepGap])?;
                next.finding = Some(finding);
            }
            StageOutput::Risk(risk) => {
                if self.risk.is_some() {
                    return Err(self.ownership(stage, &StageOutput::Risk(risk)));
                }
                let route = self.require_route(stage, &[GapRoute::KeepGap, GapRoute::NoGapHighRisk])?;
                if route == GapRoute::KeepGap && self.finding.is_none() {
                    return Err(GapwiseError::StateMachineError {
                        reason: "risk assessment on KEEP_GAP requires the auditor's finding".to_string(),
                    });
                }
                next.risk = Some(risk);
            }
            StageOutput::Materiality(decision) => {
                if self.materiality.is_some() {
                    return Err(self.ownership(stage, &StageOutput::Materiality(decision)));
                }
                if self.risk.is_none() {
                    return Err(GapwiseError::StateMachineError {
                        reason: "materiality check requires a risk rating".to_string(),
                    });
                }
                check_confidence(stage, decision.confidence)?;
                next.materiality = Some(decision);
            }
        }
        Ok(next)
    }

    fn ownership(&self, stage: StageName, output: &StageOutput) -> GapwiseError {
        GapwiseError::OwnershipViolation {
            stage: stage.to_string(),
            field: output.field_group().to_string(),
        }
    }

    fn require_route(&self, stage: StageName, allowed: &[GapRoute]) -> GapwiseResult<GapRoute> {
        match self.gap_route() {
            Some(route) if allowed.contains(&route) => Ok(route),
            Some(route) => Err(GapwiseError::StateMachineError {
                reason: format!("stage '{}' may not run on route {}", stage, route),
            }),
            None => Err(GapwiseError::StateMachineError {
                reason: format!("stage '{}' read gap_route before it was set", stage),
            }),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn id(&self) -> &CaseId {
        &self.id
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    pub fn requirement(&self) -> &str {
        &self.requirement
    }

    pub fn evidence(&self) -> &str {
        &self.evidence
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn prior(&self) -> Option<&PriorAssessment> {
        self.prior.as_ref()
    }

    pub fn routing(&self) -> Option<&GapDecision> {
        self.routing.as_ref()
    }

    pub fn finding(&self) -> Option<&GapFinding> {
        self.finding.as_ref()
    }

    pub fn risk(&self) -> Option<&RiskAssessment> {
        self.risk.as_ref()
    }

    pub fn materiality(&self) -> Option<&MaterialityDecision> {
        self.materiality.as_ref()
    }

    pub fn gap_route(&self) -> Option<GapRoute> {
        self.routing.as_ref().map(|r| r.route)
    }

    pub fn gap_confidence(&self) -> Option<f64> {
        self.routing.as_ref().map(|r| r.confidence)
    }

    pub fn rating(&self) -> Option<Rating> {
        self.risk.as_ref().map(|r| r.rating)
    }

    pub fn risk_route(&self) -> Option<RiskRoute> {
        self.materiality.as_ref().map(|m| m.route)
    }

    pub fn risk_confidence(&self) -> Option<f64> {
        self.materiality.as_ref().map(|m| m.confidence)
    }
}

fn check_confidence(stage: StageName, confidence: f64) -> GapwiseResult<()> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(GapwiseError::SchemaViolation {
            stage: stage.to_string(),
            reason: format!("confidence {} is outside [0, 1]", confidence),
        })
    }
}
