//! # gapwise-audit
//!
//! Append-only, SHA-256 hash-chained audit log for gapwise batch runs.
//!
//! ## Overview
//!
//! Every finalized case record is wrapped in an `AuditEvent` that links to
//! the previous event via its SHA-256 hash. Tampering with any event, even a
//! single byte, breaks the chain and is detected by `verify_chain`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gapwise_audit::InMemoryAuditWriter;
//! use gapwise_core::traits::AuditWriter;
//!
//! let writer = InMemoryAuditWriter::new("run-001");
//! writer.write(&record)?;
//! writer.finalize("run-001")?;
//!
//! let log = writer.export_log();
//! assert!(log.verify());
//! ```

pub mod chain;
pub mod event;
pub mod memory;

pub use chain::{hash_event, verify_chain};
pub use event::{AuditEvent, AuditLog};
pub use memory::InMemoryAuditWriter;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use gapwise_contracts::{
        error::GapwiseError,
        record::{status, AuditRecord, NOT_APPLICABLE, OUT_OF_SCOPE},
    };
    use gapwise_core::traits::AuditWriter;

    use super::{verify_chain, AuditEvent, AuditLog, InMemoryAuditWriter};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn make_record(case_id: &str, clause: &str) -> AuditRecord {
        AuditRecord {
            case_id: case_id.to_string(),
            theme: "Access Control".to_string(),
            clause: clause.to_string(),
            route: "DROP_GAP".to_string(),
            source_ref: OUT_OF_SCOPE.to_string(),
            status: status::OUT_OF_SCOPE.to_string(),
            gap_summary: OUT_OF_SCOPE.to_string(),
            gap_recommendation: OUT_OF_SCOPE.to_string(),
            risk_rating: OUT_OF_SCOPE.to_string(),
            risk_statement: OUT_OF_SCOPE.to_string(),
            risk_recommendation: OUT_OF_SCOPE.to_string(),
            materiality: OUT_OF_SCOPE.to_string(),
            remarks: NOT_APPLICABLE.to_string(),
        }
    }

    fn written(run_id: &str, clauses: &[&str]) -> InMemoryAuditWriter {
        let writer = InMemoryAuditWriter::new(run_id);
        for (i, clause) in clauses.iter().enumerate() {
            writer.write(&make_record(&format!("case-{i}"), clause)).unwrap();
        }
        writer
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_hash_chain_integrity() {
        let writer = written("run-integrity", &["first", "second", "third"]);
        assert!(writer.verify_integrity(), "chain must be valid after sequential writes");
    }

    #[test]
    fn test_tamper_detection() {
        let writer = written("run-tamper", &["a", "b", "c"]);

        {
            let mut state = writer.state.lock().unwrap();
            state.events[0].record.status = status::COMPLIANT_BUT_RISKY.to_string();
        }

        assert!(
            !writer.verify_integrity(),
            "chain must detect tampering with a stored event"
        );
    }

    #[test]
    fn test_field_boundary_shift_is_detected() {
        let writer = written("run-shift", &["ab"]);
        let mut log = writer.export_log();

        // Same concatenated bytes, different split between adjacent fields.
        log.events[0].record.theme = "Access Controla".to_string();
        log.events[0].record.clause = "b".to_string();

        assert!(!verify_chain(&log.events));
    }

    #[test]
    fn test_genesis_hash() {
        let log = written("run-genesis", &["first"]).export_log();
        assert_eq!(log.events.len(), 1);
        assert_eq!(
            log.events[0].prev_hash,
            AuditEvent::GENESIS_HASH,
            "first event must link to the genesis sentinel hash"
        );
    }

    #[test]
    fn test_sequence_monotonic() {
        let log = written("run-seq", &["a", "b", "c"]).export_log();
        for (idx, event) in log.events.iter().enumerate() {
            assert_eq!(event.sequence, idx as u64, "sequence at position {idx}");
        }
    }

    #[test]
    fn test_export_log() {
        let writer = written("run-export", &["alpha", "beta", "gamma"]);
        let log = writer.export_log();

        assert_eq!(log.run_id, "run-export");
        assert_eq!(log.events.len(), 3);
        assert_eq!(
            log.terminal_hash,
            log.events.last().unwrap().this_hash,
            "terminal_hash must equal the last event's this_hash"
        );
        let clauses: Vec<&str> = log.records().map(|r| r.clause.as_str()).collect();
        assert_eq!(clauses, vec!["alpha", "beta", "gamma"]);
        assert!(log.verify());
    }

    #[test]
    fn test_exported_log_survives_json_round_trip() {
        let log = written("run-json", &["one", "two"]).export_log();
        let json = serde_json::to_string(&log).unwrap();
        let restored: AuditLog = serde_json::from_str(&json).unwrap();

        assert!(restored.verify(), "hashes must recompute after deserialization");

        let mut truncated = restored.clone();
        truncated.events.pop();
        assert!(!truncated.verify(), "dropping the last event must break the terminal hash");
    }

    #[test]
    fn test_verify_empty() {
        let writer = InMemoryAuditWriter::new("run-empty");
        assert!(writer.is_empty());
        assert!(writer.verify_integrity());
        assert!(verify_chain(&[]));
        assert!(writer.export_log().verify());
    }

    #[test]
    fn test_sealed_log_refuses_writes() {
        let writer = written("run-seal", &["a"]);
        writer.finalize("run-seal").unwrap();
        assert!(writer.is_sealed());

        match writer.write(&make_record("late", "late")) {
            Err(GapwiseError::AuditWriteFailed { reason }) => assert!(reason.contains("sealed")),
            other => panic!("expected AuditWriteFailed, got {:?}", other),
        }
        assert_eq!(writer.len(), 1);
    }

    #[test]
    fn test_finalize_rejects_foreign_run_id() {
        let writer = InMemoryAuditWriter::new("run-a");
        assert!(writer.finalize("run-b").is_err());
        assert!(!writer.is_sealed());
    }

    #[test]
    fn test_concurrent_writers_never_interleave() {
        let writer = Arc::new(InMemoryAuditWriter::new("run-concurrent"));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let writer = writer.clone();
                thread::spawn(move || {
                    for i in 0..25 {
                        writer.write(&make_record(&format!("{t}-{i}"), "clause")).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(writer.len(), 200);
        assert!(writer.verify_integrity());
    }
}
