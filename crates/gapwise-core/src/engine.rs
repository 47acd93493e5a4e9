//! The orchestrator: drives one case through the stage graph.
//!
//! ```text
//!   entry ─► Stage::apply ─► Case::apply (ownership) ─► StageGraph::next ─► … ─► logger
//!                                                                              │
//!                                                          finalize ─► AuditWriter::write
//! ```
//!
//! A case always ends in exactly one audit record. Local failures (schema
//! violations, exhausted oracle retries, ownership and routing errors) stop
//! the walk and finalize the case as "Processing Error". Anything else is an
//! internal fault and is returned to the caller without a record.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use gapwise_contracts::{
    case::Case,
    error::{GapwiseError, GapwiseResult},
    record::AuditRecord,
    route::StageName,
};

use crate::{
    finalize::{finalize, finalize_failed},
    graph::StageGraph,
    traits::{AuditWriter, Stage},
};

/// What became of one case.
#[derive(Debug, Clone)]
pub struct CaseOutcome {
    /// The case as it stood when the walk ended.
    pub case: Case,
    /// The record appended to the audit log.
    pub record: AuditRecord,
    /// Visited nodes in order. Ends with `logger` unless a stage failed.
    pub trace: Vec<StageName>,
    /// The local failure that produced a "Processing Error" record, if any.
    pub error: Option<String>,
}

impl CaseOutcome {
    pub fn visited(&self, stage: StageName) -> bool {
        self.trace.contains(&stage)
    }
}

/// A walk that stopped before the terminal node.
struct Halted {
    case: Case,
    trace: Vec<StageName>,
    error: GapwiseError,
}

/// Runs cases through a validated graph and appends their records.
///
/// One orchestrator serves a whole batch; `run` takes `&self` and may be
/// called from many tasks at once.
pub struct Orchestrator {
    graph: StageGraph,
    stages: BTreeMap<StageName, Arc<dyn Stage>>,
    audit: Arc<dyn AuditWriter>,
}

impl Orchestrator {
    /// Bind stage implementations to the nodes of `graph`.
    ///
    /// # Errors
    ///
    /// `GraphMisconfigured` if a non-terminal node has no stage, two stages
    /// claim the same node, a stage names a node the graph does not declare,
    /// or a stage is bound to the terminal node.
    pub fn new(
        graph: StageGraph,
        stages: Vec<Arc<dyn Stage>>,
        audit: Arc<dyn AuditWriter>,
    ) -> GapwiseResult<Self> {
        let mut bound: BTreeMap<StageName, Arc<dyn Stage>> = BTreeMap::new();

        for stage in stages {
            let name = stage.name();
            if name == StageName::Logger {
                return Err(GapwiseError::GraphMisconfigured {
                    reason: "the logger is terminal and cannot be bound to a stage".to_string(),
                });
            }
            if !graph.contains(name) {
                return Err(GapwiseError::GraphMisconfigured {
                    reason: format!("stage '{}' is not a node of this graph", name),
                });
            }
            if bound.insert(name, stage).is_some() {
                return Err(GapwiseError::GraphMisconfigured {
                    reason: format!("more than one stage bound to '{}'", name),
                });
            }
        }

        let unbound: Vec<String> = graph
            .nodes()
            .filter(|node| *node != StageName::Logger && !bound.contains_key(node))
            .map(|node| node.to_string())
            .collect();
        if !unbound.is_empty() {
            return Err(GapwiseError::GraphMisconfigured {
                reason: format!("no stage bound to: {}", unbound.join(", ")),
            });
        }

        Ok(Self { graph, stages: bound, audit })
    }

    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    /// Drive `case` to the terminal node and append its record.
    ///
    /// # Errors
    ///
    /// Only non-local faults: `StepLimitExceeded`, or `AuditWriteFailed` from
    /// the writer. Stage failures are not errors here; they come back as an
    /// `Ok` outcome carrying a "Processing Error" record.
    pub async fn run(&self, case: Case) -> GapwiseResult<CaseOutcome> {
        let case_id = case.id().to_string();
        debug!(case_id = %case_id, "case starting");

        let (case, trace, error, record) = match self.drive(case).await {
            Ok((case, trace)) => {
                let record = finalize(&case);
                (case, trace, None, record)
            }
            Err(Halted { case, trace, error }) => {
                if !error.is_local() {
                    warn!(case_id = %case_id, error = %error, "case aborted by internal fault");
                    return Err(error);
                }
                warn!(
                    case_id = %case_id,
                    stage = ?trace.last(),
                    error = %error,
                    "stage failed, recording processing error"
                );
                let record = finalize_failed(&case, &error);
                (case, trace, Some(error.to_string()), record)
            }
        };

        self.audit.write(&record)?;

        info!(
            case_id = %case_id,
            route = %record.route,
            status = %record.status,
            "case finalized"
        );

        Ok(CaseOutcome { case, record, trace, error })
    }

    /// Walk the graph from the entry node until the logger.
    async fn drive(&self, mut case: Case) -> Result<(Case, Vec<StageName>), Halted> {
        let limit = self.graph.node_count();
        let mut trace = Vec::with_capacity(limit);
        let mut current = self.graph.entry();

        loop {
            if trace.len() >= limit {
                return Err(Halted {
                    case,
                    trace,
                    error: GapwiseError::StepLimitExceeded { limit },
                });
            }
            trace.push(current);

            if current == StageName::Logger {
                return Ok((case, trace));
            }

            let Some(stage) = self.stages.get(&current) else {
                return Err(Halted {
                    error: GapwiseError::StateMachineError {
                        reason: format!("no stage bound to '{}'", current),
                    },
                    case,
                    trace,
                });
            };

            debug!(case_id = %case.id(), stage = %current, "applying stage");

            let output = match stage.apply(&case).await {
                Ok(output) => output,
                Err(error) => return Err(Halted { case, trace, error }),
            };

            case = match case.apply(current, output) {
                Ok(next) => next,
                Err(error) => return Err(Halted { case, trace, error }),
            };

            current = match self.graph.next(current, &case) {
                Ok(next) => next,
                Err(error) => return Err(Halted { case, trace, error }),
            };
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use gapwise_contracts::{
        case::{GapDecision, GapFinding, MaterialityDecision, RiskAssessment, StageOutput},
        record::{status, NOT_APPLICABLE, OUT_OF_SCOPE},
        route::{GapRoute, Level, Rating, RiskRoute},
    };

    use crate::graph::GraphBuilder;
    use crate::rating::{materiality, rate};

    use super::*;

    // ── Mock helpers ─────────────────────────────────────────────────────────

    type Journal = Arc<Mutex<Vec<StageName>>>;

    /// What a mock stage does when applied.
    #[derive(Clone)]
    enum Script {
        Emit(StageOutput),
        /// Report a schema violation.
        Reject(&'static str),
        /// Emit a field group the stage does not own.
        Trespass(StageOutput),
        /// Compute the materiality decision from the case's rating.
        Materiality,
    }

    struct MockStage {
        name: StageName,
        script: Script,
        journal: Journal,
    }

    #[async_trait]
    impl Stage for MockStage {
        fn name(&self) -> StageName {
            self.name
        }

        async fn apply(&self, case: &Case) -> GapwiseResult<StageOutput> {
            self.journal.lock().unwrap().push(self.name);
            match &self.script {
                Script::Emit(output) | Script::Trespass(output) => Ok(output.clone()),
                Script::Reject(reason) => Err(GapwiseError::SchemaViolation {
                    stage: self.name.to_string(),
                    reason: reason.to_string(),
                }),
                Script::Materiality => {
                    let rating = case.rating().ok_or_else(|| GapwiseError::StateMachineError {
                        reason: "no rating".to_string(),
                    })?;
                    Ok(StageOutput::Materiality(MaterialityDecision {
                        route: materiality(rating),
                        confidence: 1.0,
                        reason: format!("rating {rating}"),
                    }))
                }
            }
        }
    }

    #[derive(Default)]
    struct MockAudit {
        records: Mutex<Vec<AuditRecord>>,
        fail: bool,
    }

    impl AuditWriter for MockAudit {
        fn write(&self, record: &AuditRecord) -> GapwiseResult<()> {
            if self.fail {
                return Err(GapwiseError::AuditWriteFailed {
                    reason: "disk full".to_string(),
                });
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        fn finalize(&self, _run_id: &str) -> GapwiseResult<()> {
            Ok(())
        }
    }

    fn routing(route: GapRoute) -> StageOutput {
        StageOutput::Routing(GapDecision {
            route,
            confidence: 0.9,
            reason: format!("inspector chose {route}"),
            status: None,
        })
    }

    fn finding() -> StageOutput {
        StageOutput::Finding(GapFinding {
            summary: "Retention period undefined".to_string(),
            severity: Level::High,
            recommendation: "Set a 7-year retention period".to_string(),
            source_ref: Some("Records Policy §2".to_string()),
            status: None,
        })
    }

    fn risk(impact: Level, likelihood: Level) -> StageOutput {
        StageOutput::Risk(RiskAssessment {
            statement: "If records are purged early, then audits cannot be evidenced".to_string(),
            impact,
            likelihood,
            rating: rate(impact, likelihood),
            recommended_control: "Automated retention locks".to_string(),
        })
    }

    struct Harness {
        orchestrator: Orchestrator,
        audit: Arc<MockAudit>,
        journal: Journal,
    }

    fn harness(route: GapRoute, auditor: Script, assessor: Script, with_materiality: bool) -> Harness {
        let journal: Journal = Arc::new(Mutex::new(vec![]));
        let audit = Arc::new(MockAudit::default());
        let mut stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(MockStage {
                name: StageName::Inspector,
                script: Script::Emit(routing(route)),
                journal: journal.clone(),
            }),
            Arc::new(MockStage { name: StageName::Auditor, script: auditor, journal: journal.clone() }),
            Arc::new(MockStage {
                name: StageName::RiskAssessor,
                script: assessor,
                journal: journal.clone(),
            }),
        ];
        if with_materiality {
            stages.push(Arc::new(MockStage {
                name: StageName::MaterialityCheck,
                script: Script::Materiality,
                journal: journal.clone(),
            }));
        }

        let graph = StageGraph::canonical(with_materiality).unwrap();
        let orchestrator = Orchestrator::new(graph, stages, audit.clone()).unwrap();
        Harness { orchestrator, audit, journal }
    }

    fn seed() -> Case {
        Case::new(
            "Records must be retained for seven years",
            "Records are archived annually.",
            "SOX readiness",
        )
        .unwrap()
    }

    // ── Scenario tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn drop_gap_goes_straight_to_the_logger() {
        let h = harness(
            GapRoute::DropGap,
            Script::Emit(finding()),
            Script::Emit(risk(Level::High, Level::High)),
            true,
        );

        let outcome = h.orchestrator.run(seed()).await.unwrap();

        assert_eq!(outcome.trace, vec![StageName::Inspector, StageName::Logger]);
        assert_eq!(*h.journal.lock().unwrap(), vec![StageName::Inspector]);
        assert_eq!(outcome.record.status, status::OUT_OF_SCOPE);
        assert_eq!(outcome.record.risk_statement, OUT_OF_SCOPE);
        assert!(outcome.error.is_none());
        assert_eq!(h.audit.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn keep_gap_runs_auditor_before_risk_assessor() {
        let h = harness(
            GapRoute::KeepGap,
            Script::Emit(finding()),
            Script::Emit(risk(Level::High, Level::High)),
            true,
        );

        let outcome = h.orchestrator.run(seed()).await.unwrap();

        assert_eq!(
            outcome.trace,
            vec![
                StageName::Inspector,
                StageName::Auditor,
                StageName::RiskAssessor,
                StageName::MaterialityCheck,
                StageName::Logger,
            ]
        );
        assert_eq!(outcome.case.rating(), Some(Rating::Critical));
        assert_eq!(outcome.case.risk_route(), Some(RiskRoute::KeepRisk));
        assert_eq!(outcome.case.risk_confidence(), Some(1.0));
        assert_eq!(outcome.record.status, status::NON_COMPLIANT_GAP);
        assert_eq!(outcome.record.risk_rating, "Critical");
        assert_eq!(outcome.record.source_ref, "Records Policy §2");
    }

    #[tokio::test]
    async fn no_gap_high_risk_skips_the_auditor() {
        let h = harness(
            GapRoute::NoGapHighRisk,
            Script::Emit(finding()),
            Script::Emit(risk(Level::Medium, Level::High)),
            false,
        );

        let outcome = h.orchestrator.run(seed()).await.unwrap();

        assert!(!outcome.visited(StageName::Auditor));
        assert!(outcome.visited(StageName::RiskAssessor));
        assert_eq!(outcome.record.gap_summary, NOT_APPLICABLE);
        assert_eq!(outcome.record.risk_rating, "High");
        assert_eq!(outcome.record.status, status::COMPLIANT_BUT_RISKY);
        assert_eq!(outcome.record.materiality, NOT_APPLICABLE);
    }

    #[tokio::test]
    async fn low_rating_is_logged_as_not_material() {
        let h = harness(
            GapRoute::NoGapHighRisk,
            Script::Emit(finding()),
            Script::Emit(risk(Level::Low, Level::Medium)),
            true,
        );

        let outcome = h.orchestrator.run(seed()).await.unwrap();

        assert_eq!(outcome.case.risk_route(), Some(RiskRoute::DropRisk));
        assert_eq!(outcome.record.status, status::COMPLIANT_RISK_NOT_MATERIAL);
        assert_eq!(outcome.trace.last(), Some(&StageName::Logger));
    }

    // ── Failure handling ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn stage_failure_yields_processing_error_record() {
        let h = harness(
            GapRoute::KeepGap,
            Script::Reject("severity 'Severe' not allowed"),
            Script::Emit(risk(Level::High, Level::High)),
            true,
        );

        let outcome = h.orchestrator.run(seed()).await.unwrap();

        assert_eq!(outcome.record.status, status::PROCESSING_ERROR);
        assert_eq!(outcome.trace, vec![StageName::Inspector, StageName::Auditor]);
        assert!(!h.journal.lock().unwrap().contains(&StageName::RiskAssessor));
        assert!(outcome.error.as_deref().unwrap_or_default().contains("Severe"));
        assert_eq!(h.audit.records.lock().unwrap().len(), 1, "failed cases still log once");
    }

    #[tokio::test]
    async fn trespassing_stage_is_an_ownership_violation() {
        // The auditor tries to write the risk group.
        let h = harness(
            GapRoute::KeepGap,
            Script::Trespass(risk(Level::Low, Level::Low)),
            Script::Emit(risk(Level::High, Level::High)),
            false,
        );

        let outcome = h.orchestrator.run(seed()).await.unwrap();

        assert_eq!(outcome.record.status, status::PROCESSING_ERROR);
        assert!(outcome.case.risk().is_none(), "trespassing output must not be folded in");
        assert!(outcome.error.unwrap().contains("may not write"));
    }

    #[tokio::test]
    async fn audit_write_failure_is_returned() {
        let journal: Journal = Arc::new(Mutex::new(vec![]));
        let audit = Arc::new(MockAudit { fail: true, ..MockAudit::default() });
        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(MockStage {
                name: StageName::Inspector,
                script: Script::Emit(routing(GapRoute::DropGap)),
                journal: journal.clone(),
            }),
            Arc::new(MockStage {
                name: StageName::Auditor,
                script: Script::Emit(finding()),
                journal: journal.clone(),
            }),
            Arc::new(MockStage {
                name: StageName::RiskAssessor,
                script: Script::Emit(risk(Level::Low, Level::Low)),
                journal,
            }),
        ];
        let orchestrator =
            Orchestrator::new(StageGraph::canonical(false).unwrap(), stages, audit).unwrap();

        match orchestrator.run(seed()).await {
            Err(GapwiseError::AuditWriteFailed { .. }) => {}
            other => panic!("expected AuditWriteFailed, got {:?}", other.map(|o| o.record)),
        }
    }

    // ── Construction ─────────────────────────────────────────────────────────

    fn lone_inspector(journal: &Journal) -> Arc<dyn Stage> {
        Arc::new(MockStage {
            name: StageName::Inspector,
            script: Script::Emit(routing(GapRoute::DropGap)),
            journal: journal.clone(),
        })
    }

    #[test]
    fn unbound_node_is_rejected() {
        let journal: Journal = Arc::new(Mutex::new(vec![]));
        let result = Orchestrator::new(
            StageGraph::canonical(false).unwrap(),
            vec![lone_inspector(&journal)],
            Arc::new(MockAudit::default()),
        );

        match result {
            Err(GapwiseError::GraphMisconfigured { reason }) => {
                assert!(reason.contains("auditor"), "{reason}");
                assert!(reason.contains("risk-assessor"), "{reason}");
            }
            Err(other) => panic!("expected GraphMisconfigured, got {:?}", other),
            Ok(_) => panic!("expected GraphMisconfigured, got Ok"),
        }
    }

    #[test]
    fn stage_for_undeclared_node_is_rejected() {
        let journal: Journal = Arc::new(Mutex::new(vec![]));
        let graph = GraphBuilder::new()
            .entry(StageName::Inspector)
            .node(StageName::Inspector)
            .node(StageName::Logger)
            .edge(StageName::Inspector, StageName::Logger)
            .build()
            .unwrap();
        let stray: Arc<dyn Stage> = Arc::new(MockStage {
            name: StageName::MaterialityCheck,
            script: Script::Materiality,
            journal: journal.clone(),
        });

        let result = Orchestrator::new(
            graph,
            vec![lone_inspector(&journal), stray],
            Arc::new(MockAudit::default()),
        );
        assert!(matches!(result, Err(GapwiseError::GraphMisconfigured { .. })));
    }

    #[test]
    fn duplicate_binding_is_rejected() {
        let journal: Journal = Arc::new(Mutex::new(vec![]));
        let graph = GraphBuilder::new()
            .entry(StageName::Inspector)
            .node(StageName::Inspector)
            .node(StageName::Logger)
            .edge(StageName::Inspector, StageName::Logger)
            .build()
            .unwrap();

        let result = Orchestrator::new(
            graph,
            vec![lone_inspector(&journal), lone_inspector(&journal)],
            Arc::new(MockAudit::default()),
        );
        assert!(matches!(result, Err(GapwiseError::GraphMisconfigured { .. })));
    }
}
