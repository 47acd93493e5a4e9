//! Verify-then-deserialize for oracle replies.

use serde::de::DeserializeOwned;
use tracing::warn;

use gapwise_contracts::{
    error::{GapwiseError, GapwiseResult},
    oracle::OracleReply,
    verify::OutputSchema,
};
use gapwise_core::traits::Verifier;

/// Check `reply` against `schema`, then deserialize its payload.
///
/// `asker` names the stage (or intake step) in the error.
///
/// # Errors
///
/// `SchemaViolation` carrying every verification failure, or the serde error
/// if the payload passed verification but still does not fit `T`.
pub fn decode<T: DeserializeOwned>(
    verifier: &dyn Verifier,
    asker: &str,
    reply: &OracleReply,
    schema: &OutputSchema,
) -> GapwiseResult<T> {
    let report = verifier.verify(reply, schema)?;
    if !report.passed {
        let reason = report.summary();
        warn!(stage = asker, schema_id = %schema.schema_id, failures = %reason, "oracle reply rejected");
        return Err(GapwiseError::SchemaViolation {
            stage: asker.to_string(),
            reason,
        });
    }

    serde_json::from_value(reply.payload.clone()).map_err(|e| GapwiseError::SchemaViolation {
        stage: asker.to_string(),
        reason: format!("reply does not deserialize: {e}"),
    })
}
