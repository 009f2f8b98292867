//! The run facade: wires mode selection, telemetry, graph construction,
//! scheduling, the interrupt gate, and run-summary bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::artifact::{self, names, ArtifactStore};
use crate::config::CoachConfig;
use crate::cost::{CostLedger, CostSummary};
use crate::error::{CoachError, Result};
use crate::reasoning::{ModelCatalog, ReasoningClient};
use crate::stages::{self, ExtractorParams};
use crate::telemetry::{prepare_context, ExtractionWindow, TelemetryClient};
use crate::workflow::{
    select_mode, GraphScheduler, InterruptGate, InterruptRequest, InterruptResponse, ProgressNote,
    RunEnv, RunMode, RunOutcome, RunReport, StageGraph,
};

/// One appended entry of the `run_summary` artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummaryEntry {
    pub run_id: uuid::Uuid,
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cost: CostSummary,
    pub artifacts_written: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub athlete: String,
    pub entries: Vec<RunSummaryEntry>,
}

pub struct CoachEngine {
    config: CoachConfig,
    store: Arc<dyn ArtifactStore>,
    telemetry: Arc<dyn TelemetryClient>,
    reasoning: Arc<dyn ReasoningClient>,
    gate: InterruptGate,
}

impl CoachEngine {
    pub fn new(
        config: CoachConfig,
        store: Arc<dyn ArtifactStore>,
        telemetry: Arc<dyn TelemetryClient>,
        reasoning: Arc<dyn ReasoningClient>,
    ) -> Self {
        Self {
            config,
            store,
            telemetry,
            reasoning,
            gate: InterruptGate::new(),
        }
    }

    /// Execute a run. The update flag is honored only when the prior
    /// analysis artifacts exist; otherwise this fails before any stage runs.
    pub async fn run(&self, update_plan: bool) -> Result<RunOutcome> {
        let mode = select_mode(update_plan, self.store.as_ref()).await?;
        info!(mode = mode.as_str(), athlete = %self.config.athlete.name, "starting coaching run");

        let (graph, initial) = match mode {
            RunMode::Full => (self.full_graph()?, BTreeMap::new()),
            RunMode::Update => {
                let graph = stages::update_graph()?;
                let initial = self.update_initial_artifacts().await?;
                (graph, initial)
            }
        };

        let scheduler = self.scheduler(graph, mode);
        let outcome = scheduler.execute(self.store.as_ref(), initial).await?;
        self.settle(outcome).await
    }

    /// Resume a parked run with answers to its pending interrupt request.
    /// A protocol violation here consumes the pending request; the run
    /// cannot be resumed again without caller-side correction.
    pub async fn resume(&self, response: InterruptResponse) -> Result<RunOutcome> {
        let suspended = self.gate.take_matching(&response)?;
        let mode = suspended.run.mode;
        let graph = match mode {
            RunMode::Full => self.full_graph()?,
            RunMode::Update => stages::update_graph()?,
        };
        // Fresh per-resume environment: replay the suspended run's ledger so
        // cost accounting stays continuous across the pause.
        let env = self.env(mode);
        env.ledger.restore(suspended.cost_records.clone());
        let scheduler = self.scheduler_with(graph, env);
        let outcome = scheduler
            .resume(self.store.as_ref(), &suspended, &response)
            .await?;
        self.settle(outcome).await
    }

    /// Outstanding interrupt requests, oldest first.
    pub fn pending_requests(&self) -> Vec<InterruptRequest> {
        self.gate.pending_requests()
    }

    fn scheduler(&self, graph: StageGraph, mode: RunMode) -> GraphScheduler {
        let env = self.env(mode);
        self.scheduler_with(graph, env)
    }

    fn scheduler_with(&self, graph: StageGraph, env: Arc<RunEnv>) -> GraphScheduler {
        GraphScheduler::new(graph, env, self.config.extraction.stage_timeout)
            .with_persistence(Arc::new(artifact::is_persistent))
    }

    fn full_graph(&self) -> Result<StageGraph> {
        let extraction = &self.config.extraction;
        stages::full_graph(
            Arc::clone(&self.telemetry),
            ExtractorParams {
                window: ExtractionWindow::new(extraction.activities_days, extraction.metrics_days),
                recent_window_days: extraction.context_recent_days,
                trends_window_days: extraction.context_trends_days,
                as_of: Utc::now().date_naive(),
            },
        )
    }

    fn env(&self, mode: RunMode) -> Arc<RunEnv> {
        let progress_note = match mode {
            RunMode::Update => self.config.progress_notes().map(|notes| ProgressNote {
                body: notes.to_string(),
                window_days: self.config.extraction.update_days,
            }),
            RunMode::Full => None,
        };
        let competitions = match mode {
            RunMode::Full => self.config.competitions.clone(),
            RunMode::Update => Vec::new(),
        };
        Arc::new(RunEnv {
            mode,
            athlete: self.config.athlete.name.clone(),
            analysis_context: self.config.context.analysis.clone(),
            planning_context: self.config.context.planning.clone(),
            competitions,
            progress_note,
            hitl_enabled: mode == RunMode::Full && self.config.extraction.hitl_enabled,
            reasoning: Arc::clone(&self.reasoning),
            catalog: ModelCatalog::new(self.config.reasoning.mode),
            ledger: Arc::new(CostLedger::new()),
        })
    }

    /// Update runs seed the scheduler with fresh short-window telemetry and
    /// the reusable prior analysis; none of these are re-persisted.
    async fn update_initial_artifacts(&self) -> Result<BTreeMap<String, String>> {
        let days = self.config.extraction.update_days;
        let snapshot = self.telemetry.extract(ExtractionWindow::update(days)).await?;
        let prepared = prepare_context(&snapshot, Utc::now().date_naive(), days, days);
        let telemetry_payload = serde_json::to_string_pretty(&prepared)
            .map_err(|e| CoachError::storage_with("failed to encode telemetry context", e))?;

        let mut initial = BTreeMap::new();
        initial.insert(names::TELEMETRY_CONTEXT.to_string(), telemetry_payload);
        for name in artifact::REUSABLE_ARTIFACTS {
            let artifact = self.store.get(name).await?.ok_or_else(|| {
                CoachError::MissingPrerequisites {
                    missing: vec![name.to_string()],
                }
            })?;
            initial.insert(name.to_string(), artifact.payload);
        }
        Ok(initial)
    }

    /// Completed runs append a `run_summary` entry; suspended runs park at
    /// the gate until answers arrive.
    async fn settle(&self, outcome: RunOutcome) -> Result<RunOutcome> {
        match outcome {
            RunOutcome::Completed(mut report) => {
                self.append_run_summary(&report).await?;
                report.artifacts_written.push(names::RUN_SUMMARY.to_string());
                info!(
                    run_id = %report.run.id,
                    cost_usd = report.cost.total_cost_usd,
                    units = report.cost.total_units,
                    "run complete"
                );
                Ok(RunOutcome::Completed(report))
            }
            RunOutcome::Suspended(suspended) => {
                info!(
                    run_id = %suspended.run.id,
                    stage = %suspended.request.stage,
                    questions = suspended.request.questions.len(),
                    "run awaiting input"
                );
                self.gate.park(suspended.clone());
                Ok(RunOutcome::Suspended(suspended))
            }
        }
    }

    async fn append_run_summary(&self, report: &RunReport) -> Result<()> {
        let mut summary = match self.store.get(names::RUN_SUMMARY).await? {
            Some(artifact) => serde_json::from_str(&artifact.payload)
                .map_err(|e| CoachError::storage_with("corrupt run_summary artifact", e))?,
            None => RunSummary {
                athlete: self.config.athlete.name.clone(),
                entries: Vec::new(),
            },
        };

        summary.entries.push(RunSummaryEntry {
            run_id: report.run.id,
            mode: report.run.mode,
            started_at: report.run.started_at,
            finished_at: Utc::now(),
            cost: report.cost,
            artifacts_written: report.artifacts_written.clone(),
        });

        let payload = serde_json::to_string_pretty(&summary)
            .map_err(|e| CoachError::storage_with("failed to encode run_summary", e))?;
        self.store
            .put(names::RUN_SUMMARY, &payload, report.run.id)
            .await?;
        Ok(())
    }
}
