//! The canonical audit record and its sentinel values.
//!
//! `AuditRecord` is the externally visible artifact: one row per
//! requirement, read by report generators and review tooling as an opaque
//! mapping. Every field is a plain string and none may be absent, so fields
//! the workflow never computed carry one of the sentinels below.

use serde::{Deserialize, Serialize};

/// Forced into every content field of a `DROP_GAP` record.
pub const OUT_OF_SCOPE: &str = "Out of Scope";

/// Fills any content field the case's route never computed.
pub const NOT_APPLICABLE: &str = "Not Applicable";

/// Fills the source reference when the Auditor did not cite one.
pub const NOT_EXPLICITLY_STATED: &str = "Not Explicitly Stated";

/// Route label used on records whose case failed before routing.
pub const UNROUTED: &str = "UNROUTED";

/// Record status values.
pub mod status {
    pub const OUT_OF_SCOPE: &str = "Out of Scope";
    pub const NON_COMPLIANT_GAP: &str = "Non-Compliant (Gap)";
    pub const COMPLIANT_BUT_RISKY: &str = "Compliant but Risky";
    pub const COMPLIANT_RISK_NOT_MATERIAL: &str = "Compliant (Risk Not Material)";
    pub const PROCESSING_ERROR: &str = "Processing Error";
}

/// Materiality column values.
pub mod materiality {
    pub const MATERIAL: &str = "Material";
    pub const NOT_MATERIAL: &str = "Not Material";
}

/// One finalized row in the audit log.
///
/// Field order is fixed, so serializing the same record twice always yields
/// identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub case_id: String,
    pub theme: String,
    /// The requirement text under review.
    pub clause: String,
    pub route: String,
    pub source_ref: String,
    pub status: String,
    pub gap_summary: String,
    pub gap_recommendation: String,
    pub risk_rating: String,
    pub risk_statement: String,
    pub risk_recommendation: String,
    pub materiality: String,
    /// The Inspector's reason, or the failure description on a
    /// "Processing Error" record.
    pub remarks: String,
}

impl AuditRecord {
    pub fn is_processing_error(&self) -> bool {
        self.status == status::PROCESSING_ERROR
    }
}
