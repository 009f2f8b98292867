//! Workflow orchestration core: run lifecycle, stage graph, scheduler,
//! interrupt gate, and mode selection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::cost::{CostRecord, CostSummary};

pub mod graph;
pub mod interrupt;
pub mod mode;
pub mod scheduler;
pub mod stage;

pub use graph::StageGraph;
pub use interrupt::{InterruptGate, InterruptRequest, InterruptResponse};
pub use mode::select_mode;
pub use scheduler::{GraphScheduler, PersistPolicy};
pub use stage::{RunEnv, Stage, StageContext, StageOutcome, SuspendRequest};

/// Which graph variant a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// All stages, full artifact regeneration.
    Full,
    /// DataIntegrator -> WeeklyPlanner -> Formatter, reusing prior analysis.
    Update,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Update => "update",
        }
    }
}

/// Run lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    AwaitingInput,
    Succeeded,
    Failed,
}

/// One execution instance, owned by the scheduler for its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: Uuid,
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub status: RunStatus,
}

impl WorkflowRun {
    pub fn new(mode: RunMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            started_at: Utc::now(),
            status: RunStatus::Pending,
        }
    }
}

/// Caller-supplied progress notes for update runs. Never mutated by the
/// engine; consumed by the weekly planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressNote {
    pub body: String,
    pub window_days: u32,
}

/// Result of a run that reached a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run: WorkflowRun,
    pub artifacts_written: Vec<String>,
    pub cost: CostSummary,
}

/// Serialized partial execution state of a run paused at an interrupt gate.
///
/// Self-contained: carries the materialized artifact payloads so a resume
/// needs nothing beyond this value, the graph, and the caller's answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspendedRun {
    pub run: WorkflowRun,
    pub request: InterruptRequest,
    pub completed_stages: Vec<String>,
    pub artifacts_written: Vec<String>,
    pub materialized: BTreeMap<String, String>,
    /// Ledger snapshot at suspension; replayed into the resume ledger so
    /// usage already consumed is never dropped from the total.
    pub cost_records: Vec<CostRecord>,
}

/// What `execute` hands back: either a terminal report or a paused run.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(RunReport),
    Suspended(SuspendedRun),
}

impl RunOutcome {
    pub fn report(self) -> Option<RunReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Suspended(_) => None,
        }
    }

    pub fn suspended(self) -> Option<SuspendedRun> {
        match self {
            Self::Completed(_) => None,
            Self::Suspended(suspended) => Some(suspended),
        }
    }
}
