//! End-to-end batch runs over the real stages, audit log, and reference
//! collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use gapwise_audit::InMemoryAuditWriter;
use gapwise_batch::{
    triage, BatchRunner, BatchSettings, CancelHandle, Candidate, DeltaFilter, Requirement,
};
use gapwise_contracts::{
    error::{GapwiseError, OracleError},
    oracle::{OracleReply, OracleRequest, OracleTask},
    record::{status, NOT_APPLICABLE, OUT_OF_SCOPE, UNROUTED},
};
use gapwise_core::{
    traits::{EvidenceSource, Oracle},
    GuardedOracle, Orchestrator, RetryPolicy, StageGraph,
};
use gapwise_ref::{HeuristicOracle, KeywordIndex, ScriptedOracle};
use gapwise_stages::{canonical_stages, schemas::reply_verifier};

const RUN_ID: &str = "run-under-test";

fn guarded(oracle: Arc<dyn Oracle>) -> GuardedOracle {
    GuardedOracle::new(
        oracle,
        RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        },
    )
}

fn runner(
    oracle: Arc<dyn Oracle>,
    evidence: Arc<dyn EvidenceSource>,
    max_concurrency: usize,
) -> (BatchRunner, Arc<InMemoryAuditWriter>) {
    let audit = Arc::new(InMemoryAuditWriter::new(RUN_ID));
    let stages = canonical_stages(guarded(oracle), Arc::new(reply_verifier()), true);
    let orchestrator =
        Orchestrator::new(StageGraph::canonical(true).unwrap(), stages, audit.clone()).unwrap();
    let settings = BatchSettings {
        max_concurrency,
        ..BatchSettings::default()
    };
    (
        BatchRunner::new(Arc::new(orchestrator), evidence, audit.clone(), settings),
        audit,
    )
}

fn routing(route: &str) -> serde_json::Value {
    json!({ "route": route, "confidence": 0.8, "reason": "scripted" })
}

/// One requirement per routing path, plus one the oracle answers badly.
fn four_way_oracle() -> ScriptedOracle {
    ScriptedOracle::new()
        .reply_for("SLA", OracleTask::GapRouting, routing("DROP_GAP"))
        .reply_for("nightly", OracleTask::GapRouting, routing("NO_GAP_HIGH_RISK"))
        .reply_for("keys", OracleTask::GapRouting, routing("PARTIAL_GAP"))
        .reply(OracleTask::GapRouting, routing("KEEP_GAP"))
        .reply(
            OracleTask::GapFinding,
            json!({
                "gap_summary": "Restore tests are not performed.",
                "severity": "High",
                "recommendation": "Schedule annual restore tests.",
            }),
        )
        .reply(
            OracleTask::RiskAssessment,
            json!({
                "risk_statement": "If restores fail, then outages last longer",
                "impact": "High",
                "likelihood": "High",
                "rating": "Critical",
                "recommended_control": "Test restores annually.",
            }),
        )
}

fn four_requirements() -> Vec<Requirement> {
    vec![
        Requirement::new("X must have an SLA"),
        Requirement::new("Backups must be restore-tested annually").with_theme("Business Continuity"),
        Requirement::new("Backups run nightly"),
        Requirement::new("Encryption keys must be rotated"),
    ]
}

#[tokio::test]
async fn every_case_gets_exactly_one_record() {
    let (runner, audit) = runner(
        Arc::new(four_way_oracle()),
        Arc::new(KeywordIndex::bundled()),
        2,
    );

    let report = runner.run(RUN_ID, four_requirements()).await.unwrap();

    assert_eq!(report.total(), 4);
    assert_eq!(report.completed.len(), 4);
    assert!(report.failures.is_empty());
    assert!(report.skipped.is_empty());

    let statuses: Vec<&str> = report.records().map(|r| r.status.as_str()).collect();
    assert_eq!(
        statuses,
        vec![
            status::OUT_OF_SCOPE,
            status::NON_COMPLIANT_GAP,
            status::COMPLIANT_BUT_RISKY,
            status::PROCESSING_ERROR,
        ]
    );

    let records: Vec<_> = report.records().collect();
    assert!(records.iter().skip(1).all(|r| r.gap_summary != OUT_OF_SCOPE));
    assert_eq!(records[0].risk_statement, OUT_OF_SCOPE);
    assert_eq!(records[1].theme, "Business Continuity");
    assert_eq!(records[1].risk_rating, "Critical");
    assert_eq!(records[1].source_ref, "Not Explicitly Stated");
    assert_eq!(records[2].gap_summary, NOT_APPLICABLE);
    assert_eq!(records[3].theme, "General Compliance");

    assert_eq!(audit.len(), 4);
    assert!(audit.is_sealed());
    let log = audit.export_log();
    assert!(log.verify());
    assert_eq!(report.processing_errors(), 1);
    assert_eq!(report.summary().by_status.get(status::PROCESSING_ERROR), Some(&1));
}

#[tokio::test]
async fn blank_requirement_is_logged_as_processing_error_without_stopping_the_batch() {
    let (runner, audit) = runner(
        Arc::new(four_way_oracle()),
        Arc::new(KeywordIndex::bundled()),
        4,
    );
    let requirements = vec![
        Requirement::new("Backups run nightly"),
        Requirement::new("   "),
        Requirement::new("X must have an SLA"),
    ];

    let total = requirements.len();

    let report = runner.run(RUN_ID, requirements).await.unwrap();

    assert_eq!(report.completed.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 1);
    assert!(report.failures[0].reason.contains("empty"), "{}", report.failures[0].reason);

    assert_eq!(audit.len(), total);
    let log = audit.export_log();
    assert!(log.verify());
    let blank = log
        .records()
        .find(|r| r.route == UNROUTED)
        .expect("blank requirement has a record");
    assert!(blank.is_processing_error());
    assert_eq!(blank.clause, NOT_APPLICABLE);
    assert!(blank.remarks.contains("empty"), "{}", blank.remarks);

    let statuses: Vec<&str> = report.records().map(|r| r.status.as_str()).collect();
    assert_eq!(statuses.len(), total);
    assert_eq!(statuses[1], status::PROCESSING_ERROR);
    assert_eq!(report.summary().recorded, total);
}

/// Sleeps on every call and remembers the most calls ever in flight.
struct SlowOracle {
    inner: HeuristicOracle,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Oracle for SlowOracle {
    async fn ask(&self, request: &OracleRequest) -> Result<OracleReply, OracleError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.ask(request).await
    }
}

#[tokio::test(start_paused = true)]
async fn concurrency_never_exceeds_the_limit() {
    let oracle = Arc::new(SlowOracle {
        inner: HeuristicOracle::new(),
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let (runner, _audit) = runner(oracle.clone(), Arc::new(KeywordIndex::bundled()), 2);
    let requirements = (0..6)
        .map(|i| Requirement::new(format!("Requirement number {i} must be met")))
        .collect();

    let report = runner.run(RUN_ID, requirements).await.unwrap();

    assert_eq!(report.completed.len(), 6);
    assert_eq!(oracle.peak.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cancelling_before_the_run_skips_everything() {
    let (runner, audit) = runner(
        Arc::new(four_way_oracle()),
        Arc::new(KeywordIndex::bundled()),
        2,
    );
    let cancel = CancelHandle::new();
    cancel.cancel();

    let report = runner
        .run_until_cancelled(RUN_ID, four_requirements(), &cancel)
        .await
        .unwrap();

    assert!(report.completed.is_empty());
    let skipped: Vec<usize> = report.skipped.iter().map(|s| s.index).collect();
    assert_eq!(skipped, vec![0, 1, 2, 3]);
    assert!(audit.is_empty());
    assert!(audit.is_sealed());
}

/// Fires the cancel handle from inside the first oracle call.
struct CancellingOracle {
    inner: ScriptedOracle,
    cancel: CancelHandle,
}

#[async_trait]
impl Oracle for CancellingOracle {
    async fn ask(&self, request: &OracleRequest) -> Result<OracleReply, OracleError> {
        self.cancel.cancel();
        self.inner.ask(request).await
    }
}

#[tokio::test]
async fn cancelling_mid_run_lets_admitted_cases_finish() {
    let cancel = CancelHandle::new();
    let oracle = Arc::new(CancellingOracle {
        inner: four_way_oracle(),
        cancel: cancel.clone(),
    });
    let (runner, audit) = runner(oracle, Arc::new(KeywordIndex::bundled()), 1);

    let report = runner
        .run_until_cancelled(RUN_ID, four_requirements(), &cancel)
        .await
        .unwrap();

    assert_eq!(report.completed.len(), 1);
    assert_eq!(report.completed[0].index, 0);
    assert_eq!(report.skipped.len(), 3);
    assert_eq!(report.total(), 4);
    assert_eq!(audit.len(), 1);
    assert!(audit.verify_integrity());
}

#[tokio::test]
async fn evidence_outage_aborts_the_batch() {
    let index = Arc::new(KeywordIndex::bundled());
    index.set_available(false);
    let (runner, audit) = runner(Arc::new(four_way_oracle()), index, 2);

    let err = runner.run(RUN_ID, four_requirements()).await.unwrap_err();

    assert!(matches!(err, GapwiseError::EvidenceUnavailable { .. }));
    assert!(audit.is_empty());
}

#[tokio::test]
async fn intake_feeds_the_batch() {
    let index = Arc::new(KeywordIndex::bundled());
    let candidates = vec![
        Candidate {
            requirement: Requirement::new("Backups must be restore-tested at least annually."),
            confidence: 0.95,
        },
        Candidate {
            requirement: Requirement::new("Remote access to internal networks requires multi-factor authentication through the corporate VPN."),
            confidence: 0.9,
        },
        Candidate {
            requirement: Requirement::new("Something garbled from page nine"),
            confidence: 0.3,
        },
    ];

    let triaged = triage(candidates, 0.8);
    assert_eq!(triaged.approved.len(), 2);
    assert_eq!(triaged.needs_review.len(), 1);

    let filter = DeltaFilter::new(
        guarded(Arc::new(HeuristicOracle::new())),
        Arc::new(reply_verifier()),
        index.clone(),
        3,
    );
    let delta = filter.filter(triaged.approved).await.unwrap();
    assert_eq!(delta.covered.len(), 1);
    assert_eq!(delta.proceed.len(), 1);

    let (runner, audit) = runner(Arc::new(HeuristicOracle::new()), index, 2);
    let report = runner.run(RUN_ID, delta.proceed).await.unwrap();

    assert_eq!(report.completed.len(), 1);
    let record = &report.completed[0].outcome.record;
    assert!(!record.is_processing_error(), "{:?}", record);
    assert!(audit.export_log().verify());
}
