//! Hash-chain primitives: hashing and chain integrity verification.
//!
//! Hash input layout (bytes, in order):
//!   1. run_id
//!   2. sequence as 8-byte little-endian
//!   3. recorded_at as RFC 3339 with nanoseconds
//!   4. prev_hash (64 ASCII hex chars)
//!   5. every record field in declaration order
//!
//! Each variable-length part is prefixed with its byte length (8-byte
//! little-endian) so that moving text between adjacent fields changes the
//! hash.

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use gapwise_contracts::record::AuditRecord;

use crate::event::AuditEvent;

fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Record fields in declaration order.
fn record_fields(record: &AuditRecord) -> [&str; 13] {
    [
        record.case_id.as_str(),
        record.theme.as_str(),
        record.clause.as_str(),
        record.route.as_str(),
        record.source_ref.as_str(),
        record.status.as_str(),
        record.gap_summary.as_str(),
        record.gap_recommendation.as_str(),
        record.risk_rating.as_str(),
        record.risk_statement.as_str(),
        record.risk_recommendation.as_str(),
        record.materiality.as_str(),
        record.remarks.as_str(),
    ]
}

/// Compute the SHA-256 hash for a single audit event.
///
/// Returns a lowercase 64-character hex string.
pub fn hash_event(
    run_id: &str,
    sequence: u64,
    recorded_at: &DateTime<Utc>,
    record: &AuditRecord,
    prev_hash: &str,
) -> String {
    let mut hasher = Sha256::new();
    update_field(&mut hasher, run_id.as_bytes());
    hasher.update(sequence.to_le_bytes());
    update_field(
        &mut hasher,
        recorded_at.to_rfc3339_opts(SecondsFormat::Nanos, true).as_bytes(),
    );
    update_field(&mut hasher, prev_hash.as_bytes());
    for field in record_fields(record) {
        update_field(&mut hasher, field.as_bytes());
    }

    hex::encode(hasher.finalize())
}

/// Verify the integrity of a hash chain.
///
/// Valid when every event links to its predecessor's hash (the first to
/// `GENESIS_HASH`), sequence numbers count up from 0 without gaps, and every
/// stored `this_hash` matches the recomputed value. An empty chain is valid.
pub fn verify_chain(events: &[AuditEvent]) -> bool {
    let mut expected_prev = AuditEvent::GENESIS_HASH;

    for (position, event) in events.iter().enumerate() {
        if event.prev_hash != expected_prev || event.sequence != position as u64 {
            return false;
        }

        let recomputed = hash_event(
            &event.run_id,
            event.sequence,
            &event.recorded_at,
            &event.record,
            &event.prev_hash,
        );
        if event.this_hash != recomputed {
            return false;
        }

        expected_prev = event.this_hash.as_str();
    }

    true
}
