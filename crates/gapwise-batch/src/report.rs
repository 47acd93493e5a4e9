//! What happened to every requirement in a batch.

use std::collections::BTreeMap;

use serde::Serialize;

use gapwise_contracts::record::AuditRecord;
use gapwise_core::CaseOutcome;

/// A case that reached its audit record.
#[derive(Debug, Clone)]
pub struct CompletedCase {
    /// Position in the batch input.
    pub index: usize,
    pub outcome: CaseOutcome,
}

/// A requirement that did not finish its workflow.
///
/// `record` is the "Processing Error" row written for a requirement rejected
/// before it became a case. Internal faults leave it `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedCase {
    pub index: usize,
    pub requirement: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<AuditRecord>,
}

/// A requirement never admitted because the batch was cancelled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRequirement {
    pub index: usize,
    pub requirement: String,
}

/// The result of one batch run. Every input requirement appears in exactly
/// one of `completed`, `failures`, or `skipped`, each ordered by input index.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub run_id: String,
    pub completed: Vec<CompletedCase>,
    pub failures: Vec<FailedCase>,
    pub skipped: Vec<SkippedRequirement>,
}

impl BatchReport {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Self::default()
        }
    }

    pub fn total(&self) -> usize {
        self.completed.len() + self.failures.len() + self.skipped.len()
    }

    /// Every record the batch wrote, in input order.
    pub fn records(&self) -> impl Iterator<Item = &AuditRecord> {
        let mut logged: Vec<(usize, &AuditRecord)> = self
            .completed
            .iter()
            .map(|c| (c.index, &c.outcome.record))
            .chain(
                self.failures
                    .iter()
                    .filter_map(|f| f.record.as_ref().map(|record| (f.index, record))),
            )
            .collect();
        logged.sort_by_key(|(index, _)| *index);
        logged.into_iter().map(|(_, record)| record)
    }

    /// Number of records per status.
    pub fn status_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in self.records() {
            *counts.entry(record.status.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn processing_errors(&self) -> usize {
        self.records().filter(|r| r.is_processing_error()).count()
    }

    pub(crate) fn sort(&mut self) {
        self.completed.sort_by_key(|c| c.index);
        self.failures.sort_by_key(|f| f.index);
        self.skipped.sort_by_key(|s| s.index);
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            run_id: self.run_id.clone(),
            total: self.total(),
            recorded: self.records().count(),
            processing_errors: self.processing_errors(),
            by_status: self.status_counts(),
            failures: self.failures.clone(),
            skipped: self.skipped.clone(),
        }
    }
}

/// Serializable roll-up of a `BatchReport`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub run_id: String,
    pub total: usize,
    pub recorded: usize,
    pub processing_errors: usize,
    pub by_status: BTreeMap<String, usize>,
    pub failures: Vec<FailedCase>,
    pub skipped: Vec<SkippedRequirement>,
}
