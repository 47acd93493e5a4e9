//! The four reference scenarios.
//!
//! Each scenario wires the real workflow (canonical graph, the four stages,
//! the reply verifier and a hash-chained audit log) to a `ScriptedOracle`
//! whose replies force one routing path:
//!
//!   1. DROP_GAP: the record is "Out of Scope" throughout.
//!   2. KEEP_GAP with High/High risk: rated "Critical", risk kept.
//!   3. NO_GAP_HIGH_RISK: gap fields "Not Applicable", risk fields set.
//!   4. A route outside the enumeration: "Processing Error", and the next
//!      case in the run still completes.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use gapwise_audit::{AuditLog, InMemoryAuditWriter};
use gapwise_contracts::{
    case::{Case, DEFAULT_SCOPE},
    error::GapwiseResult,
    oracle::OracleTask,
};
use gapwise_core::{
    traits::AuditWriter, CaseOutcome, GuardedOracle, Orchestrator, RetryPolicy, StageGraph,
};
use gapwise_stages::{canonical_stages, schemas::reply_verifier};

use crate::scripted::ScriptedOracle;

/// What one scenario produced.
#[derive(Debug, Clone)]
pub struct ScenarioRun {
    pub number: u8,
    pub title: &'static str,
    /// One per case, in run order.
    pub outcomes: Vec<CaseOutcome>,
    /// The sealed audit log of the run.
    pub log: AuditLog,
}

// ── Canned replies ───────────────────────────────────────────────────────────

fn routing(route: &str, reason: &str) -> Value {
    json!({ "route": route, "confidence": 0.9, "reason": reason })
}

fn finding() -> Value {
    json!({
        "gap_summary": "No documented procedure for restore testing of backups.",
        "severity": "High",
        "recommendation": "Define and schedule annual restore tests with documented results.",
        "source_ref": "Backup and Recovery Procedure 1.2"
    })
}

fn risk(impact: &str, likelihood: &str, rating: &str) -> Value {
    json!({
        "risk_statement": "If backups cannot be restored, then critical services stay down after an outage",
        "impact": impact,
        "likelihood": likelihood,
        "rating": rating,
        "recommended_control": "Run and evidence a full restore test every year."
    })
}

// ── Runner ───────────────────────────────────────────────────────────────────

const EVIDENCE: &str = "[Backup and Recovery Procedure 1.2] Backups of production databases run nightly and are retained for thirty days.";

async fn run_scripted(
    number: u8,
    title: &'static str,
    oracle: ScriptedOracle,
    requirements: &[&str],
) -> GapwiseResult<ScenarioRun> {
    let run_id = Uuid::new_v4().to_string();
    let audit = Arc::new(InMemoryAuditWriter::new(run_id.as_str()));

    let policy = RetryPolicy {
        max_attempts: 1,
        ..RetryPolicy::default()
    };
    let oracle = GuardedOracle::new(Arc::new(oracle), policy);
    let stages = canonical_stages(oracle, Arc::new(reply_verifier()), true);
    let orchestrator = Orchestrator::new(StageGraph::canonical(true)?, stages, audit.clone())?;

    let mut outcomes = Vec::with_capacity(requirements.len());
    for requirement in requirements {
        let case = Case::new(*requirement, EVIDENCE, DEFAULT_SCOPE)?;
        outcomes.push(orchestrator.run(case).await?);
    }

    audit.finalize(&run_id)?;
    info!(scenario = number, cases = outcomes.len(), "scenario complete");

    Ok(ScenarioRun {
        number,
        title,
        outcomes,
        log: audit.export_log(),
    })
}

pub async fn drop_gap() -> GapwiseResult<ScenarioRun> {
    let oracle = ScriptedOracle::new().reply(
        OracleTask::GapRouting,
        routing("DROP_GAP", "Service levels are outside the engagement scope."),
    );
    run_scripted(1, "Out-of-scope requirement (DROP_GAP)", oracle, &["X must have an SLA"]).await
}

pub async fn keep_gap_critical() -> GapwiseResult<ScenarioRun> {
    let oracle = ScriptedOracle::new()
        .reply(OracleTask::GapRouting, routing("KEEP_GAP", "No restore testing is documented."))
        .reply(OracleTask::GapFinding, finding())
        .reply(OracleTask::RiskAssessment, risk("High", "High", "Critical"));
    run_scripted(
        2,
        "Control gap with critical risk (KEEP_GAP)",
        oracle,
        &["Backups must be restore-tested at least annually."],
    )
    .await
}

pub async fn no_gap_high_risk() -> GapwiseResult<ScenarioRun> {
    let oracle = ScriptedOracle::new()
        .reply(
            OracleTask::GapRouting,
            routing("NO_GAP_HIGH_RISK", "Backups are covered but restore capability is unproven."),
        )
        .reply(OracleTask::RiskAssessment, risk("High", "Medium", "High"));
    run_scripted(
        3,
        "Compliant but risky (NO_GAP_HIGH_RISK)",
        oracle,
        &["Production databases must be backed up nightly."],
    )
    .await
}

pub async fn invalid_route() -> GapwiseResult<ScenarioRun> {
    let oracle = ScriptedOracle::new()
        .reply_for(
            "encryption keys",
            OracleTask::GapRouting,
            routing("MAYBE_GAP", "Unsure."),
        )
        .reply(OracleTask::GapRouting, routing("KEEP_GAP", "No restore testing is documented."))
        .reply(OracleTask::GapFinding, finding())
        .reply(OracleTask::RiskAssessment, risk("Medium", "Medium", "Medium"));
    run_scripted(
        4,
        "Oracle answers outside the route enumeration",
        oracle,
        &[
            "Encryption keys must be rotated yearly.",
            "Backups must be restore-tested at least annually.",
        ],
    )
    .await
}

/// Run all four scenarios in order.
pub async fn run_all() -> GapwiseResult<Vec<ScenarioRun>> {
    Ok(vec![
        drop_gap().await?,
        keep_gap_critical().await?,
        no_gap_high_risk().await?,
        invalid_route().await?,
    ])
}
