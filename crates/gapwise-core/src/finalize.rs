//! Terminal normalization: case state → one canonical audit record.
//!
//! Normalization is a single pass applied the same way for every route:
//!
//! | route            | status                                              | content fields                         |
//! |------------------|-----------------------------------------------------|----------------------------------------|
//! | DROP_GAP         | Out of Scope                                        | all forced to "Out of Scope"           |
//! | KEEP_GAP         | Auditor status, else Non-Compliant (Gap)            | pass through                           |
//! | NO_GAP_HIGH_RISK | Inspector status, else Compliant but Risky (or Compliant (Risk Not Material) when materiality dropped it) | risk computed, gap "Not Applicable" |
//! | failed case      | Processing Error                                    | "Not Applicable"                       |
//! | rejected input   | Processing Error, route "Unrouted"                  | "Not Applicable"                       |
//!
//! Anything left unset becomes a sentinel. `finalize` and `finalize_failed`
//! are pure, so finalizing the same case twice yields identical records.

use gapwise_contracts::{
    case::{Case, CaseId, DEFAULT_THEME},
    error::GapwiseError,
    record::{
        materiality, status, AuditRecord, NOT_APPLICABLE, NOT_EXPLICITLY_STATED, OUT_OF_SCOPE,
        UNROUTED,
    },
    route::{GapRoute, RiskRoute},
};

/// Produce the audit record for a case that reached the terminal node.
pub fn finalize(case: &Case) -> AuditRecord {
    let route = case.gap_route();
    let remarks = text_or(case.routing().map(|r| r.reason.as_str()), NOT_APPLICABLE);

    if route == Some(GapRoute::DropGap) {
        return AuditRecord {
            case_id: case.id().to_string(),
            theme: case.theme().to_string(),
            clause: case.requirement().to_string(),
            route: GapRoute::DropGap.to_string(),
            source_ref: OUT_OF_SCOPE.to_string(),
            status: status::OUT_OF_SCOPE.to_string(),
            gap_summary: OUT_OF_SCOPE.to_string(),
            gap_recommendation: OUT_OF_SCOPE.to_string(),
            risk_rating: OUT_OF_SCOPE.to_string(),
            risk_statement: OUT_OF_SCOPE.to_string(),
            risk_recommendation: OUT_OF_SCOPE.to_string(),
            materiality: OUT_OF_SCOPE.to_string(),
            remarks,
        };
    }

    let finding = case.finding();
    let risk = case.risk();

    let (status, source_ref) = match route {
        Some(GapRoute::KeepGap) => (
            text_or(finding.and_then(|f| f.status.as_deref()), status::NON_COMPLIANT_GAP),
            text_or(finding.and_then(|f| f.source_ref.as_deref()), NOT_EXPLICITLY_STATED),
        ),
        Some(GapRoute::NoGapHighRisk) => {
            let default = if case.risk_route() == Some(RiskRoute::DropRisk) {
                status::COMPLIANT_RISK_NOT_MATERIAL
            } else {
                status::COMPLIANT_BUT_RISKY
            };
            (
                text_or(case.routing().and_then(|r| r.status.as_deref()), default),
                NOT_APPLICABLE.to_string(),
            )
        }
        // Unrouted cases never reach the terminal node through the engine;
        // treat one handed in directly as an error record.
        Some(GapRoute::DropGap) | None => {
            (status::PROCESSING_ERROR.to_string(), NOT_APPLICABLE.to_string())
        }
    };

    let materiality = match case.risk_route() {
        Some(RiskRoute::KeepRisk) => materiality::MATERIAL.to_string(),
        Some(RiskRoute::DropRisk) => materiality::NOT_MATERIAL.to_string(),
        None => NOT_APPLICABLE.to_string(),
    };

    AuditRecord {
        case_id: case.id().to_string(),
        theme: case.theme().to_string(),
        clause: case.requirement().to_string(),
        route: route.map(|r| r.to_string()).unwrap_or_else(|| UNROUTED.to_string()),
        source_ref,
        status,
        gap_summary: text_or(finding.map(|f| f.summary.as_str()), NOT_APPLICABLE),
        gap_recommendation: text_or(finding.map(|f| f.recommendation.as_str()), NOT_APPLICABLE),
        risk_rating: risk
            .map(|r| r.rating.to_string())
            .unwrap_or_else(|| NOT_APPLICABLE.to_string()),
        risk_statement: text_or(risk.map(|r| r.statement.as_str()), NOT_APPLICABLE),
        risk_recommendation: text_or(risk.map(|r| r.recommended_control.as_str()), NOT_APPLICABLE),
        materiality,
        remarks,
    }
}

/// Produce the "Processing Error" record for a case whose run failed.
///
/// The record keeps the case's identity and route (when one was decided) but
/// none of its partial analysis; `remarks` carries the failure.
pub fn finalize_failed(case: &Case, error: &GapwiseError) -> AuditRecord {
    AuditRecord {
        case_id: case.id().to_string(),
        theme: case.theme().to_string(),
        clause: case.requirement().to_string(),
        route: case
            .gap_route()
            .map(|r| r.to_string())
            .unwrap_or_else(|| UNROUTED.to_string()),
        source_ref: NOT_APPLICABLE.to_string(),
        status: status::PROCESSING_ERROR.to_string(),
        gap_summary: NOT_APPLICABLE.to_string(),
        gap_recommendation: NOT_APPLICABLE.to_string(),
        risk_rating: NOT_APPLICABLE.to_string(),
        risk_statement: NOT_APPLICABLE.to_string(),
        risk_recommendation: NOT_APPLICABLE.to_string(),
        materiality: NOT_APPLICABLE.to_string(),
        remarks: error.to_string(),
    }
}

/// Produce the record for a requirement that could not become a case, so it
/// still leaves exactly one row in the log.
pub fn finalize_rejected(requirement: &str, theme: &str, error: &GapwiseError) -> AuditRecord {
    AuditRecord {
        case_id: CaseId::new().to_string(),
        theme: text_or(Some(theme), DEFAULT_THEME),
        clause: text_or(Some(requirement), NOT_APPLICABLE),
        route: UNROUTED.to_string(),
        source_ref: NOT_APPLICABLE.to_string(),
        status: status::PROCESSING_ERROR.to_string(),
        gap_summary: NOT_APPLICABLE.to_string(),
        gap_recommendation: NOT_APPLICABLE.to_string(),
        risk_rating: NOT_APPLICABLE.to_string(),
        risk_statement: NOT_APPLICABLE.to_string(),
        risk_recommendation: NOT_APPLICABLE.to_string(),
        materiality: NOT_APPLICABLE.to_string(),
        remarks: error.to_string(),
    }
}

/// Blank counts as unset.
fn text_or(value: Option<&str>, sentinel: &str) -> String {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => sentinel.to_string(),
    }
}
