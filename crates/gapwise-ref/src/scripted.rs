//! An oracle that plays back canned replies.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use gapwise_contracts::{
    error::OracleError,
    oracle::{OracleReply, OracleRequest, OracleTask},
};
use gapwise_core::traits::Oracle;

/// Replies per task, optionally overridden for requirements containing a
/// given phrase. A task with no reply fails with a transport error.
///
/// Every call is counted per task so callers can check which stages asked.
#[derive(Default)]
pub struct ScriptedOracle {
    defaults: HashMap<OracleTask, Value>,
    overrides: Vec<(String, OracleTask, Value)>,
    calls: Mutex<HashMap<OracleTask, usize>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `task` with `payload`.
    pub fn reply(mut self, task: OracleTask, payload: Value) -> Self {
        self.defaults.insert(task, payload);
        self
    }

    /// Answer `task` with `payload` when the request's requirement contains
    /// `phrase`. Earlier overrides win.
    pub fn reply_for(mut self, phrase: impl Into<String>, task: OracleTask, payload: Value) -> Self {
        self.overrides.push((phrase.into(), task, payload));
        self
    }

    pub fn calls(&self, task: OracleTask) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(&task).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn script_for(&self, request: &OracleRequest) -> Option<&Value> {
        let requirement = request.field("requirement").unwrap_or_default();
        self.overrides
            .iter()
            .find(|(phrase, task, _)| *task == request.task && requirement.contains(phrase.as_str()))
            .map(|(_, _, payload)| payload)
            .or_else(|| self.defaults.get(&request.task))
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn ask(&self, request: &OracleRequest) -> Result<OracleReply, OracleError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(request.task).or_insert(0) += 1;
        }
        self.script_for(request)
            .map(|payload| OracleReply::new(request.task, payload.clone()))
            .ok_or_else(|| OracleError::Transport {
                reason: format!("no scripted reply for '{}'", request.task),
            })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn request(task: OracleTask, requirement: &str) -> OracleRequest {
        OracleRequest::new(task).with_field("requirement", requirement)
    }

    #[tokio::test]
    async fn overrides_apply_by_phrase_and_task() {
        let oracle = ScriptedOracle::new()
            .reply(OracleTask::GapRouting, json!({ "route": "KEEP_GAP" }))
            .reply_for("SLA", OracleTask::GapRouting, json!({ "route": "DROP_GAP" }));

        let plain = oracle.ask(&request(OracleTask::GapRouting, "Backups")).await.unwrap();
        let sla = oracle.ask(&request(OracleTask::GapRouting, "X must have an SLA")).await.unwrap();

        assert_eq!(plain.payload["route"], "KEEP_GAP");
        assert_eq!(sla.payload["route"], "DROP_GAP");
        assert_eq!(oracle.calls(OracleTask::GapRouting), 2);
        assert_eq!(oracle.calls(OracleTask::GapFinding), 0);
    }

    #[tokio::test]
    async fn unscripted_task_is_a_transport_error() {
        let oracle = ScriptedOracle::new();
        let err = oracle.ask(&request(OracleTask::GapFinding, "x")).await.unwrap_err();
        assert!(matches!(err, OracleError::Transport { .. }));
        assert_eq!(oracle.calls(OracleTask::GapFinding), 1);
    }
}
