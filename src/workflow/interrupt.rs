//! Interrupt gate: the suspend/resume protocol for human-in-the-loop pauses.
//!
//! A paused run holds exactly one outstanding request; resuming requires a
//! response keyed to it. Mismatched keys leave the pending state untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::{CoachError, Result};

use super::SuspendedRun;

/// Clarifying questions plus the partial-state token of the paused stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptRequest {
    pub id: Uuid,
    pub run_id: Uuid,
    pub stage: String,
    pub questions: Vec<String>,
    /// Opaque to the scheduler; handed back to the stage on resume.
    pub state_token: String,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied answers keyed to a pending request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptResponse {
    pub request_id: Uuid,
    pub answers: Vec<String>,
}

/// Registry of suspended runs awaiting answers.
#[derive(Default)]
pub struct InterruptGate {
    pending: Mutex<HashMap<Uuid, SuspendedRun>>,
}

impl InterruptGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn park(&self, suspended: SuspendedRun) {
        let mut pending = self.pending.lock().expect("interrupt gate poisoned");
        pending.insert(suspended.request.id, suspended);
    }

    /// Remove and return the run matching a response. A response keyed to no
    /// pending request is a protocol error and removes nothing.
    pub fn take_matching(&self, response: &InterruptResponse) -> Result<SuspendedRun> {
        let mut pending = self.pending.lock().expect("interrupt gate poisoned");
        pending.remove(&response.request_id).ok_or_else(|| {
            CoachError::interrupt_protocol(format!(
                "no pending interrupt request with id {}",
                response.request_id
            ))
        })
    }

    pub fn pending_requests(&self) -> Vec<InterruptRequest> {
        let pending = self.pending.lock().expect("interrupt gate poisoned");
        let mut requests: Vec<InterruptRequest> =
            pending.values().map(|s| s.request.clone()).collect();
        requests.sort_by_key(|r| r.created_at);
        requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{RunMode, RunStatus, WorkflowRun};
    use std::collections::BTreeMap;

    fn suspended() -> SuspendedRun {
        let mut run = WorkflowRun::new(RunMode::Full);
        run.status = RunStatus::AwaitingInput;
        SuspendedRun {
            request: InterruptRequest {
                id: Uuid::new_v4(),
                run_id: run.id,
                stage: "synthesizer".to_string(),
                questions: vec!["Was the spike in week 3 a race?".to_string()],
                state_token: "draft".to_string(),
                created_at: Utc::now(),
            },
            run,
            completed_stages: vec![],
            artifacts_written: vec![],
            materialized: BTreeMap::new(),
            cost_records: vec![],
        }
    }

    #[test]
    fn matching_response_takes_the_run() {
        let gate = InterruptGate::new();
        let parked = suspended();
        let request_id = parked.request.id;
        gate.park(parked);

        let taken = gate
            .take_matching(&InterruptResponse {
                request_id,
                answers: vec!["yes".to_string()],
            })
            .unwrap();
        assert_eq!(taken.request.id, request_id);
        assert!(gate.pending_requests().is_empty());
    }

    #[test]
    fn mismatched_key_is_protocol_error_and_leaves_state() {
        let gate = InterruptGate::new();
        gate.park(suspended());

        let err = gate
            .take_matching(&InterruptResponse {
                request_id: Uuid::new_v4(),
                answers: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, CoachError::InterruptProtocol { .. }));
        assert_eq!(gate.pending_requests().len(), 1);
    }
}
