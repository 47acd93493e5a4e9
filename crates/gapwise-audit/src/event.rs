//! Audit event and log types.
//!
//! `AuditEvent` is a single entry in the hash chain: one finalized
//! `AuditRecord` plus sequence number, wall-clock time, and the SHA-256
//! hashes that make tampering detectable. The record itself never carries a
//! timestamp; time lives only in this wrapper. `AuditLog` is the sealed
//! export of a batch run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gapwise_contracts::record::AuditRecord;

use crate::chain::verify_chain;

/// A single entry in the hash chain of one batch run.
///
/// Modifying any field, including those of the embedded `record`, invalidates
/// `this_hash` and every later `prev_hash`, which `verify_chain` detects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Position in the chain, starting at 0.
    pub sequence: u64,

    /// The batch run this event belongs to.
    pub run_id: String,

    /// When the record was appended.
    pub recorded_at: DateTime<Utc>,

    pub record: AuditRecord,

    /// Hash of the previous event, or `GENESIS_HASH` for the first.
    pub prev_hash: String,

    /// Hash over (run_id, sequence, recorded_at, prev_hash, record fields).
    pub this_hash: String,
}

impl AuditEvent {
    /// The `prev_hash` of the first event in every chain: 64 hex zeros.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A sealed audit log for one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub run_id: String,

    /// Events in chain order (sequence 0 first).
    pub events: Vec<AuditEvent>,

    /// When the log was exported.
    pub finalized_at: DateTime<Utc>,

    /// The `this_hash` of the last event. Empty if the log is empty.
    pub terminal_hash: String,
}

impl AuditLog {
    /// The records alone, in append order.
    pub fn records(&self) -> impl Iterator<Item = &AuditRecord> {
        self.events.iter().map(|e| &e.record)
    }

    /// Check the chain and that `terminal_hash` commits to its last event.
    ///
    /// Use this on a log read back from disk.
    pub fn verify(&self) -> bool {
        let terminal = self.events.last().map(|e| e.this_hash.as_str()).unwrap_or_default();
        verify_chain(&self.events) && self.terminal_hash == terminal
    }
}
