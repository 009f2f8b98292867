//! The stage abstraction: the atomic executable node of the graph.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::config::Competition;
use crate::cost::CostLedger;
use crate::error::{CoachError, Result};
use crate::reasoning::{ModelCatalog, ReasoningClient, StageRole};

use super::{ProgressNote, RunMode};

/// A stage's execution result: outputs to persist, or a request to pause
/// the run for external clarification.
#[derive(Debug, Clone)]
pub enum StageOutcome {
    /// Produced artifacts as (name, payload) pairs.
    Complete(Vec<(String, String)>),
    Suspend(SuspendRequest),
}

/// Raised by an interrupt-capable stage. The state token is opaque to the
/// scheduler and handed back verbatim on resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspendRequest {
    pub questions: Vec<String>,
    pub state_token: String,
}

/// Run-scoped environment shared by every stage of one run. Distinct runs
/// never share one of these.
pub struct RunEnv {
    pub mode: RunMode,
    pub athlete: String,
    pub analysis_context: String,
    pub planning_context: String,
    pub competitions: Vec<Competition>,
    pub progress_note: Option<ProgressNote>,
    pub hitl_enabled: bool,
    pub reasoning: Arc<dyn ReasoningClient>,
    pub catalog: ModelCatalog,
    pub ledger: Arc<CostLedger>,
}

/// Per-invocation view handed to a stage: merged inputs keyed by artifact
/// name, the shared run environment, and the cooperative-cancellation flag.
pub struct StageContext {
    stage: String,
    run_id: Uuid,
    env: Arc<RunEnv>,
    inputs: BTreeMap<String, String>,
    answers: Option<Vec<String>>,
    state_token: Option<String>,
    cancel: watch::Receiver<bool>,
}

impl StageContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        stage: String,
        run_id: Uuid,
        env: Arc<RunEnv>,
        inputs: BTreeMap<String, String>,
        answers: Option<Vec<String>>,
        state_token: Option<String>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            stage,
            run_id,
            env,
            inputs,
            answers,
            state_token,
            cancel,
        }
    }

    pub fn stage_name(&self) -> &str {
        &self.stage
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn env(&self) -> &RunEnv {
        &self.env
    }

    /// A required input artifact payload. Absence is a graph-construction
    /// bug, surfaced as a stage failure rather than a panic.
    pub fn input(&self, name: &str) -> Result<&str> {
        self.inputs
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| {
                CoachError::stage_failed(
                    self.run_id,
                    &self.stage,
                    format!("missing input artifact '{name}'"),
                )
            })
    }

    /// All merged inputs, keyed by artifact name.
    pub fn inputs(&self) -> &BTreeMap<String, String> {
        &self.inputs
    }

    /// Caller-supplied interrupt answers, present only on a resume cycle.
    pub fn answers(&self) -> Option<&[String]> {
        self.answers.as_deref()
    }

    /// State token from the suspend request, present only on resume.
    pub fn state_token(&self) -> Option<&str> {
        self.state_token.as_deref()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Cooperative cancellation point. Stages call this before expensive
    /// work; a cancelled stage abandons and signals by returning the error.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CoachError::stage_failed(
                self.run_id,
                &self.stage,
                "cancelled cooperatively after sibling failure",
            ))
        } else {
            Ok(())
        }
    }

    /// Issue one reasoning call for this stage's role, recording usage in
    /// the run ledger. Usage is recorded even if the run is subsequently
    /// cancelled; accounting is never rolled back.
    pub async fn reason(
        &self,
        role: StageRole,
        system: Option<String>,
        prompt: String,
    ) -> Result<String> {
        self.ensure_active()?;
        let request = self.env.catalog.request(role, system, prompt);
        let response = self.env.reasoning.complete(request).await?;
        let cost = self.env.catalog.estimate_cost(role, response.usage);
        self.env
            .ledger
            .record(&self.stage, response.usage.total(), cost);
        Ok(response.content)
    }
}

/// The atomic executable node. Stages are stateless between runs; anything
/// persistent lives in artifacts.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stable name, unique within a graph.
    fn name(&self) -> &str;

    /// Input artifact names this stage consumes.
    fn inputs(&self) -> Vec<String>;

    /// Output artifact names this stage produces.
    fn outputs(&self) -> Vec<String>;

    /// Whether this stage may raise the interrupt gate. The update graph
    /// must be built exclusively from non-interrupting stages.
    fn interruptible(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutcome>;
}
