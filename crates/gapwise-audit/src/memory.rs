//! In-memory implementation of `AuditWriter`.
//!
//! `InMemoryAuditWriter` keeps every event in a `Vec` behind a `Mutex`. One
//! writer is shared by all cases of a batch run; each `write` appends one
//! whole record under the lock, so concurrent cases never interleave.
//!
//! `finalize` seals the log: later writes are refused. Use `export_log` to
//! obtain the sealed `AuditLog` and `verify_integrity` to re-check the chain.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info};

use gapwise_contracts::{
    error::{GapwiseError, GapwiseResult},
    record::AuditRecord,
};
use gapwise_core::traits::AuditWriter;

use crate::{
    chain::{hash_event, verify_chain},
    event::{AuditEvent, AuditLog},
};

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct InMemoryState {
    /// All events written so far, in append order.
    pub(crate) events: Vec<AuditEvent>,

    /// The `this_hash` of the last event, or `GENESIS_HASH` before the first.
    pub(crate) last_hash: String,

    pub(crate) sealed: bool,
}

// ── Public writer ─────────────────────────────────────────────────────────────

/// An in-memory, append-only audit writer backed by a SHA-256 hash chain.
pub struct InMemoryAuditWriter {
    run_id: String,
    pub(crate) state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryAuditWriter {
    pub fn new(run_id: impl Into<String>) -> Self {
        let state = InMemoryState {
            events: Vec::new(),
            last_hash: AuditEvent::GENESIS_HASH.to_string(),
            sealed: false,
        };
        Self {
            run_id: run_id.into(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Read access for export and verification. A panic elsewhere while the
    /// lock was held cannot leave a half-written event (the push is the last
    /// mutation), so a poisoned lock is still safe to read.
    fn read(&self) -> MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_sealed(&self) -> bool {
        self.read().sealed
    }

    /// Export the log with every event written so far.
    pub fn export_log(&self) -> AuditLog {
        let state = self.read();
        let terminal_hash = state
            .events
            .last()
            .map(|e| e.this_hash.clone())
            .unwrap_or_default();

        AuditLog {
            run_id: self.run_id.clone(),
            events: state.events.clone(),
            finalized_at: Utc::now(),
            terminal_hash,
        }
    }

    /// Verify that the in-memory chain has not been tampered with.
    pub fn verify_integrity(&self) -> bool {
        verify_chain(&self.read().events)
    }
}

// ── AuditWriter impl ──────────────────────────────────────────────────────────

impl AuditWriter for InMemoryAuditWriter {
    /// Append one record to the hash chain.
    ///
    /// Returns `Err(AuditWriteFailed)` if the log is sealed or the lock is
    /// poisoned.
    fn write(&self, record: &AuditRecord) -> GapwiseResult<()> {
        let mut state = self.state.lock().map_err(|e| GapwiseError::AuditWriteFailed {
            reason: format!("audit state lock poisoned: {}", e),
        })?;

        if state.sealed {
            return Err(GapwiseError::AuditWriteFailed {
                reason: format!("audit log for run '{}' is sealed", self.run_id),
            });
        }

        let prev_hash = state.last_hash.clone();
        let sequence = state.events.len() as u64;
        let recorded_at = Utc::now();

        let this_hash = hash_event(&self.run_id, sequence, &recorded_at, record, &prev_hash);

        state.events.push(AuditEvent {
            sequence,
            run_id: self.run_id.clone(),
            recorded_at,
            record: record.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        });
        state.last_hash = this_hash;

        debug!(run_id = %self.run_id, sequence, case_id = %record.case_id, "audit record appended");
        Ok(())
    }

    /// Seal the log for `run_id`.
    fn finalize(&self, run_id: &str) -> GapwiseResult<()> {
        let mut state = self.state.lock().map_err(|e| GapwiseError::AuditWriteFailed {
            reason: format!("audit state lock poisoned: {}", e),
        })?;

        if run_id != self.run_id {
            return Err(GapwiseError::AuditWriteFailed {
                reason: format!(
                    "cannot finalize run '{}' on the log of run '{}'",
                    run_id, self.run_id
                ),
            });
        }
        state.sealed = true;

        info!(
            run_id = %run_id,
            event_count = state.events.len(),
            terminal_hash = %state.last_hash,
            "audit log finalized"
        );

        Ok(())
    }
}
