//! The batch runner: many requirements, one orchestrator, bounded concurrency.
//!
//! ```text
//!   requirements ─► admit (semaphore permit | cancel) ─► spawn case task
//!                                                          │
//!                     EvidenceSource::retrieve ─► Case::new ─► Orchestrator::run
//! ```
//!
//! Per-case failures never abort siblings: local stage failures already come
//! back as "Processing Error" records, and internal faults land in
//! `BatchReport::failures`. A requirement rejected before it becomes a case
//! (blank text) still gets a "Processing Error" record in the shared log. The one batch-wide failure is an unavailable
//! evidence source: admission stops, in-flight cases are aborted, and the
//! error is returned.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use gapwise_config::PipelineConfig;
use gapwise_contracts::{
    case::Case,
    error::{GapwiseError, GapwiseResult},
    evidence::render_evidence,
    record::AuditRecord,
};
use gapwise_core::{
    finalize::finalize_rejected,
    traits::{AuditWriter, EvidenceSource},
    CaseOutcome, Orchestrator,
};

use crate::{
    report::{BatchReport, CompletedCase, FailedCase, SkippedRequirement},
    requirement::Requirement,
};

/// Knobs the runner needs from the pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSettings {
    pub max_concurrency: usize,
    pub top_k: usize,
    pub scope: String,
    pub theme: String,
}

impl From<&PipelineConfig> for BatchSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_concurrency: config.batch.max_concurrency,
            top_k: config.evidence.top_k,
            scope: config.pipeline.scope.clone(),
            theme: config.pipeline.theme.clone(),
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

// ── Cancellation ─────────────────────────────────────────────────────────────

/// Stops admission of further cases. Cases already running finish.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    // The handle keeps the sender alive for the whole run, so `Err` only
    // means nobody can cancel any more.
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

// ── Runner ───────────────────────────────────────────────────────────────────

/// How a spawned case task ended.
enum CaseRun {
    Recorded(CaseOutcome),
    /// The requirement never became a case; `record` is already in the log.
    Rejected { record: AuditRecord, error: GapwiseError },
    Failed(GapwiseError),
    /// The evidence source failed. Fatal for the batch.
    EvidenceDown(GapwiseError),
}

struct CaseTask {
    index: usize,
    requirement: String,
    run: CaseRun,
}

pub struct BatchRunner {
    orchestrator: Arc<Orchestrator>,
    evidence: Arc<dyn EvidenceSource>,
    audit: Arc<dyn AuditWriter>,
    settings: BatchSettings,
}

impl BatchRunner {
    /// `audit` must be the writer the orchestrator appends to; the runner
    /// seals it once the batch is done.
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        evidence: Arc<dyn EvidenceSource>,
        audit: Arc<dyn AuditWriter>,
        settings: BatchSettings,
    ) -> Self {
        Self {
            orchestrator,
            evidence,
            audit,
            settings,
        }
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    /// Run every requirement to completion.
    pub async fn run(&self, run_id: &str, requirements: Vec<Requirement>) -> GapwiseResult<BatchReport> {
        self.run_until_cancelled(run_id, requirements, &CancelHandle::new()).await
    }

    /// Run requirements until `cancel` fires.
    ///
    /// Requirements not yet admitted when `cancel` fires are reported as
    /// skipped and contribute no record. The audit log is sealed at the end
    /// either way.
    ///
    /// # Errors
    ///
    /// `EvidenceUnavailable` if the evidence source fails for any case, or
    /// `AuditWriteFailed` if the log cannot be sealed.
    pub async fn run_until_cancelled(
        &self,
        run_id: &str,
        requirements: Vec<Requirement>,
        cancel: &CancelHandle,
    ) -> GapwiseResult<BatchReport> {
        let total = requirements.len();
        let concurrency = self.settings.max_concurrency.max(1);
        info!(run_id = %run_id, total, concurrency, "batch starting");

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut cancel_rx = cancel.subscribe();
        let mut queue: VecDeque<(usize, Requirement)> = requirements.into_iter().enumerate().collect();
        let mut tasks: JoinSet<CaseTask> = JoinSet::new();
        let mut report = BatchReport::new(run_id);

        // ── Admission ────────────────────────────────────────────────────────
        while !queue.is_empty() {
            tokio::select! {
                biased;

                _ = cancelled(&mut cancel_rx) => {
                    warn!(run_id = %run_id, remaining = queue.len(), "batch cancelled, skipping unadmitted requirements");
                    break;
                }

                Some(joined) = tasks.join_next() => {
                    if let Err(fatal) = Self::tally(&mut report, joined) {
                        tasks.abort_all();
                        return Err(fatal);
                    }
                }

                permit = semaphore.clone().acquire_owned() => {
                    let Ok(permit) = permit else { break };
                    let Some((index, requirement)) = queue.pop_front() else { break };
                    debug!(run_id = %run_id, index, "admitting requirement");

                    let orchestrator = self.orchestrator.clone();
                    let evidence = self.evidence.clone();
                    let audit = self.audit.clone();
                    let settings = self.settings.clone();
                    tasks.spawn(async move {
                        let _permit = permit;
                        let run = run_case(&orchestrator, evidence.as_ref(), audit.as_ref(), &settings, &requirement).await;
                        CaseTask { index, requirement: requirement.text, run }
                    });
                }
            }
        }

        report.skipped = queue
            .into_iter()
            .map(|(index, requirement)| SkippedRequirement {
                index,
                requirement: requirement.text,
            })
            .collect();

        // ── Drain ────────────────────────────────────────────────────────────
        while let Some(joined) = tasks.join_next().await {
            if let Err(fatal) = Self::tally(&mut report, joined) {
                tasks.abort_all();
                return Err(fatal);
            }
        }

        self.audit.finalize(run_id)?;
        report.sort();

        info!(
            run_id = %run_id,
            recorded = report.completed.len(),
            processing_errors = report.processing_errors(),
            failures = report.failures.len(),
            skipped = report.skipped.len(),
            "batch finished"
        );
        Ok(report)
    }

    /// Fold one finished task into the report. `Err` means the batch must stop.
    fn tally(report: &mut BatchReport, joined: Result<CaseTask, JoinError>) -> GapwiseResult<()> {
        let task = match joined {
            Ok(task) => task,
            // Panicked tasks lose their index with the payload; aborted ones
            // only happen on the fatal path, which has already returned.
            Err(join_error) => {
                error!(error = %join_error, "case task did not complete");
                report.failures.push(FailedCase {
                    index: usize::MAX,
                    requirement: String::new(),
                    reason: format!("case task did not complete: {}", join_error),
                    record: None,
                });
                return Ok(());
            }
        };

        match task.run {
            CaseRun::Recorded(outcome) => {
                report.completed.push(CompletedCase { index: task.index, outcome });
                Ok(())
            }
            CaseRun::Rejected { record, error } => {
                warn!(index = task.index, error = %error, "requirement rejected, processing error recorded");
                report.failures.push(FailedCase {
                    index: task.index,
                    requirement: task.requirement,
                    reason: error.to_string(),
                    record: Some(record),
                });
                Ok(())
            }
            CaseRun::Failed(err) => {
                error!(index = task.index, error = %err, "case failed without a record");
                report.failures.push(FailedCase {
                    index: task.index,
                    requirement: task.requirement,
                    reason: err.to_string(),
                    record: None,
                });
                Ok(())
            }
            CaseRun::EvidenceDown(err) => {
                error!(index = task.index, error = %err, "evidence source unavailable, aborting batch");
                Err(err)
            }
        }
    }
}

/// Seed one case from its requirement and drive it.
async fn run_case(
    orchestrator: &Orchestrator,
    evidence: &dyn EvidenceSource,
    audit: &dyn AuditWriter,
    settings: &BatchSettings,
    requirement: &Requirement,
) -> CaseRun {
    let passages = match evidence.retrieve(&requirement.text, settings.top_k).await {
        Ok(passages) => passages,
        Err(GapwiseError::EvidenceUnavailable { reason }) => {
            return CaseRun::EvidenceDown(GapwiseError::EvidenceUnavailable { reason })
        }
        Err(other) => {
            return CaseRun::EvidenceDown(GapwiseError::EvidenceUnavailable {
                reason: other.to_string(),
            })
        }
    };

    let theme = requirement.theme.as_deref().unwrap_or(&settings.theme);
    let case = match Case::new(
        requirement.text.as_str(),
        render_evidence(&passages),
        settings.scope.as_str(),
    ) {
        Ok(case) => case,
        Err(error) => {
            let record = finalize_rejected(&requirement.text, theme, &error);
            return match audit.write(&record) {
                Ok(()) => CaseRun::Rejected { record, error },
                Err(write_error) => CaseRun::Failed(write_error),
            };
        }
    };
    let mut case = case.with_theme(theme);
    if let Some(prior) = &requirement.prior {
        case = case.with_prior(prior.clone());
    }

    match orchestrator.run(case).await {
        Ok(outcome) => CaseRun::Recorded(outcome),
        Err(err) => CaseRun::Failed(err),
    }
}
