//! Graph scheduler: wavefront execution of parallel groups.
//!
//! Each iteration runs every stage whose inputs are materialized as one
//! parallel group. A synchronization point is simply a stage whose inputs
//! span more than one group; it stays un-ready until every contributor has
//! committed. Merged inputs are keyed by artifact name, so the merge is a
//! function of the set of outputs, never of arrival order.

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::artifact::ArtifactStore;
use crate::error::{CoachError, Result};

use super::graph::StageGraph;
use super::interrupt::{InterruptRequest, InterruptResponse};
use super::stage::{RunEnv, Stage, StageContext, StageOutcome, SuspendRequest};
use super::{RunMode, RunOutcome, RunReport, RunStatus, SuspendedRun, WorkflowRun};

/// Decides which artifact names reach the store; everything else stays
/// run-internal working state.
pub type PersistPolicy = Arc<dyn Fn(&str) -> bool + Send + Sync>;

pub struct GraphScheduler {
    graph: StageGraph,
    env: Arc<RunEnv>,
    stage_deadline: Duration,
    persist: PersistPolicy,
}

impl GraphScheduler {
    pub fn new(graph: StageGraph, env: Arc<RunEnv>, stage_deadline: Duration) -> Self {
        Self {
            graph,
            env,
            stage_deadline,
            persist: Arc::new(|_| true),
        }
    }

    pub fn with_persistence(mut self, persist: PersistPolicy) -> Self {
        self.persist = persist;
        self
    }

    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    /// Execute the graph from scratch. `initial` must materialize every
    /// artifact the graph declared as caller-supplied.
    pub async fn execute(
        &self,
        store: &dyn ArtifactStore,
        initial: BTreeMap<String, String>,
    ) -> Result<RunOutcome> {
        for name in self.graph.initial_artifacts() {
            if !initial.contains_key(name) {
                return Err(CoachError::graph(format!(
                    "initial artifact '{name}' was not supplied"
                )));
            }
        }

        let run = WorkflowRun::new(self.env.mode);
        debug!(run_id = %run.id, mode = run.mode.as_str(), stages = self.graph.len(), "starting run");
        self.drive(store, run, initial, BTreeSet::new(), Vec::new())
            .await
    }

    /// Resume a suspended run with answers keyed to its pending request.
    /// Validation failures leave the suspended state untouched.
    pub async fn resume(
        &self,
        store: &dyn ArtifactStore,
        suspended: &SuspendedRun,
        response: &InterruptResponse,
    ) -> Result<RunOutcome> {
        if response.request_id != suspended.request.id {
            return Err(CoachError::interrupt_protocol(format!(
                "response keyed to {} but pending request is {}",
                response.request_id, suspended.request.id
            )));
        }
        if suspended.run.status != RunStatus::AwaitingInput {
            return Err(CoachError::interrupt_protocol(format!(
                "run {} is not awaiting input",
                suspended.run.id
            )));
        }
        let stage = self
            .graph
            .stage(&suspended.request.stage)
            .ok_or_else(|| {
                CoachError::interrupt_protocol(format!(
                    "suspended stage '{}' is not part of this graph",
                    suspended.request.stage
                ))
            })?
            .clone();

        let mut run = suspended.run.clone();
        run.status = RunStatus::Pending;
        let mut materialized = suspended.materialized.clone();
        let mut completed: BTreeSet<String> =
            suspended.completed_stages.iter().cloned().collect();
        let mut written = suspended.artifacts_written.clone();

        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let ctx = StageContext::new(
            stage.name().to_string(),
            run.id,
            Arc::clone(&self.env),
            inputs_for(stage.as_ref(), &materialized),
            Some(response.answers.clone()),
            Some(suspended.request.state_token.clone()),
            cancel_rx,
        );

        let outcome = match timeout(self.stage_deadline, stage.execute(&ctx)).await {
            Ok(result) => result,
            Err(_) => Err(CoachError::StageTimeout {
                run_id: run.id,
                stage: stage.name().to_string(),
                deadline: self.stage_deadline,
            }),
        };

        match outcome {
            Ok(StageOutcome::Complete(outputs)) => {
                persist_outputs(
                    store,
                    &run,
                    stage.as_ref(),
                    &self.persist,
                    outputs,
                    &mut materialized,
                    &mut written,
                )
                .await?;
                completed.insert(stage.name().to_string());
            }
            Ok(StageOutcome::Suspend(_)) => {
                return Err(CoachError::interrupt_protocol(format!(
                    "stage '{}' suspended again on resume",
                    stage.name()
                )));
            }
            Err(err) => {
                run.status = RunStatus::Failed;
                return Err(err);
            }
        }

        self.drive(store, run, materialized, completed, written).await
    }

    async fn drive(
        &self,
        store: &dyn ArtifactStore,
        mut run: WorkflowRun,
        mut materialized: BTreeMap<String, String>,
        mut completed: BTreeSet<String>,
        mut written: Vec<String>,
    ) -> Result<RunOutcome> {
        loop {
            let group = self.graph.ready_group(&materialized, &completed);
            if group.is_empty() {
                if completed.len() != self.graph.len() {
                    run.status = RunStatus::Failed;
                    return Err(CoachError::graph(format!(
                        "run {} stalled with {} of {} stages completed",
                        run.id,
                        completed.len(),
                        self.graph.len()
                    )));
                }
                run.status = RunStatus::Succeeded;
                return Ok(RunOutcome::Completed(RunReport {
                    run,
                    artifacts_written: written,
                    cost: self.env.ledger.total(),
                }));
            }

            debug!(
                run_id = %run.id,
                group = ?group.iter().map(|s| s.name()).collect::<Vec<_>>(),
                "executing parallel group"
            );

            let (cancel_tx, cancel_rx) = watch::channel(false);
            let mut tasks: FuturesUnordered<_> = group
                .iter()
                .map(|stage| {
                    let stage = Arc::clone(stage);
                    let ctx = StageContext::new(
                        stage.name().to_string(),
                        run.id,
                        Arc::clone(&self.env),
                        inputs_for(stage.as_ref(), &materialized),
                        None,
                        None,
                        cancel_rx.clone(),
                    );
                    let deadline = self.stage_deadline;
                    let run_id = run.id;
                    tokio::spawn(async move {
                        let name = stage.name().to_string();
                        let result = match timeout(deadline, stage.execute(&ctx)).await {
                            Ok(result) => result,
                            Err(_) => Err(CoachError::StageTimeout {
                                run_id,
                                stage: name.clone(),
                                deadline,
                            }),
                        };
                        (name, result)
                    })
                })
                .collect();

            let mut primary_error: Option<CoachError> = None;
            let mut completions: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
            let mut suspensions: Vec<(String, SuspendRequest)> = Vec::new();

            // A synchronization point: wait for every group member, whether
            // it completed, suspended, failed, or cancelled cooperatively.
            while let Some(joined) = tasks.next().await {
                let (name, result) = joined.map_err(|e| {
                    CoachError::stage_failed(run.id, "scheduler", format!("stage task panicked: {e}"))
                })?;
                match result {
                    Ok(StageOutcome::Complete(outputs)) => {
                        completions.insert(name, outputs);
                    }
                    Ok(StageOutcome::Suspend(request)) => {
                        suspensions.push((name, request));
                    }
                    Err(err) => {
                        if primary_error.is_none() {
                            warn!(run_id = %run.id, stage = %name, error = %err, "stage failed, cancelling siblings");
                            let _ = cancel_tx.send(true);
                            primary_error = Some(err);
                        } else {
                            debug!(run_id = %run.id, stage = %name, error = %err, "sibling abandoned");
                        }
                    }
                }
            }

            // Completed members keep their artifacts even when a sibling
            // failed; cancelled members persisted nothing.
            for (name, outputs) in completions {
                let stage = self.graph.stage(&name).ok_or_else(|| {
                    CoachError::graph(format!("completed stage '{name}' missing from graph"))
                })?;
                persist_outputs(
                    store,
                    &run,
                    stage.as_ref(),
                    &self.persist,
                    outputs,
                    &mut materialized,
                    &mut written,
                )
                .await?;
                completed.insert(name);
            }

            if let Some(err) = primary_error {
                run.status = RunStatus::Failed;
                return Err(err);
            }

            match suspensions.len() {
                0 => {}
                1 => {
                    let (stage_name, request) = suspensions.remove(0);
                    let stage = self.graph.stage(&stage_name).ok_or_else(|| {
                        CoachError::graph(format!("suspended stage '{stage_name}' missing from graph"))
                    })?;
                    if run.mode == RunMode::Update || !stage.interruptible() {
                        run.status = RunStatus::Failed;
                        return Err(CoachError::interrupt_protocol(format!(
                            "stage '{stage_name}' raised an interrupt it is not entitled to"
                        )));
                    }
                    run.status = RunStatus::AwaitingInput;
                    let request = InterruptRequest {
                        id: Uuid::new_v4(),
                        run_id: run.id,
                        stage: stage_name,
                        questions: request.questions,
                        state_token: request.state_token,
                        created_at: Utc::now(),
                    };
                    debug!(run_id = %run.id, stage = %request.stage, "run awaiting input");
                    return Ok(RunOutcome::Suspended(SuspendedRun {
                        run,
                        request,
                        completed_stages: completed.into_iter().collect(),
                        artifacts_written: written,
                        materialized,
                        cost_records: self.env.ledger.records(),
                    }));
                }
                _ => {
                    run.status = RunStatus::Failed;
                    return Err(CoachError::interrupt_protocol(
                        "multiple stages suspended in one parallel group",
                    ));
                }
            }
        }
    }
}

fn inputs_for(stage: &dyn Stage, materialized: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    stage
        .inputs()
        .into_iter()
        .filter_map(|name| materialized.get(&name).map(|payload| (name, payload.clone())))
        .collect()
}

async fn persist_outputs(
    store: &dyn ArtifactStore,
    run: &WorkflowRun,
    stage: &dyn Stage,
    persist: &PersistPolicy,
    outputs: Vec<(String, String)>,
    materialized: &mut BTreeMap<String, String>,
    written: &mut Vec<String>,
) -> Result<()> {
    let declared: BTreeSet<String> = stage.outputs().into_iter().collect();
    let produced: BTreeSet<String> = outputs.iter().map(|(name, _)| name.clone()).collect();
    if declared != produced {
        return Err(CoachError::stage_failed(
            run.id,
            stage.name(),
            format!("produced artifacts {produced:?} but declared {declared:?}"),
        ));
    }
    for (name, payload) in outputs {
        if persist(&name) {
            store.put(&name, &payload, run.id).await?;
            written.push(name.clone());
        }
        materialized.insert(name, payload);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::MemoryArtifactStore;
    use crate::config::ReasoningMode;
    use crate::cost::CostLedger;
    use crate::reasoning::{
        ModelCatalog, ReasoningClient, ReasoningRequest, ReasoningResponse, TokenUsage,
    };
    use async_trait::async_trait;

    struct NullReasoning;

    #[async_trait]
    impl ReasoningClient for NullReasoning {
        async fn complete(&self, request: ReasoningRequest) -> Result<ReasoningResponse> {
            Ok(ReasoningResponse {
                content: format!("echo:{}", request.role.as_str()),
                usage: TokenUsage {
                    input_tokens: 10,
                    output_tokens: 10,
                },
                model: request.model,
            })
        }
    }

    fn env(mode: RunMode) -> Arc<RunEnv> {
        Arc::new(RunEnv {
            mode,
            athlete: "Test".to_string(),
            analysis_context: String::new(),
            planning_context: String::new(),
            competitions: vec![],
            progress_note: None,
            hitl_enabled: true,
            reasoning: Arc::new(NullReasoning),
            catalog: ModelCatalog::new(ReasoningMode::Development),
            ledger: Arc::new(CostLedger::new()),
        })
    }

    /// Produces a fixed payload after an optional delay; can fail, spin
    /// until cancelled, or suspend once.
    struct TestStage {
        name: String,
        inputs: Vec<String>,
        output: String,
        behavior: Behavior,
    }

    enum Behavior {
        Emit(String, Duration),
        ConcatInputs,
        Fail,
        SpinUntilCancelled,
        SuspendOnce,
    }

    fn stage(name: &str, inputs: &[&str], output: &str, behavior: Behavior) -> Arc<dyn Stage> {
        Arc::new(TestStage {
            name: name.to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            output: output.to_string(),
            behavior,
        })
    }

    #[async_trait]
    impl Stage for TestStage {
        fn name(&self) -> &str {
            &self.name
        }

        fn inputs(&self) -> Vec<String> {
            self.inputs.clone()
        }

        fn outputs(&self) -> Vec<String> {
            vec![self.output.clone()]
        }

        fn interruptible(&self) -> bool {
            matches!(self.behavior, Behavior::SuspendOnce)
        }

        async fn execute(&self, ctx: &StageContext) -> Result<StageOutcome> {
            match &self.behavior {
                Behavior::Emit(payload, delay) => {
                    tokio::time::sleep(*delay).await;
                    ctx.env().ledger.record(ctx.stage_name(), 5, 0.001);
                    Ok(StageOutcome::Complete(vec![(
                        self.output.clone(),
                        payload.clone(),
                    )]))
                }
                Behavior::ConcatInputs => {
                    let merged: Vec<&str> =
                        ctx.inputs().values().map(String::as_str).collect();
                    Ok(StageOutcome::Complete(vec![(
                        self.output.clone(),
                        merged.join("+"),
                    )]))
                }
                Behavior::Fail => Err(CoachError::stage_failed(
                    ctx.run_id(),
                    ctx.stage_name(),
                    "synthetic failure",
                )),
                Behavior::SpinUntilCancelled => {
                    // Record usage before the cancellation point; it must
                    // survive on the ledger.
                    ctx.env().ledger.record(ctx.stage_name(), 7, 0.002);
                    for _ in 0..200 {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        if ctx.is_cancelled() {
                            break;
                        }
                    }
                    ctx.ensure_active()?;
                    Ok(StageOutcome::Complete(vec![(
                        self.output.clone(),
                        "never persisted".to_string(),
                    )]))
                }
                Behavior::SuspendOnce => {
                    if let Some(answers) = ctx.answers() {
                        Ok(StageOutcome::Complete(vec![(
                            self.output.clone(),
                            format!("answered:{}", answers.join(",")),
                        )]))
                    } else {
                        Ok(StageOutcome::Suspend(SuspendRequest {
                            questions: vec!["clarify?".to_string()],
                            state_token: "token".to_string(),
                        }))
                    }
                }
            }
        }
    }

    fn scheduler(stages: Vec<Arc<dyn Stage>>, mode: RunMode, initial: &[&str]) -> GraphScheduler {
        let graph = StageGraph::new(stages, initial).unwrap();
        GraphScheduler::new(graph, env(mode), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn merge_is_independent_of_completion_order() {
        // Staggered delays force reverse completion order; the merge must
        // still be keyed by artifact name.
        for (m_delay, p_delay, a_delay) in [(30, 20, 10), (10, 20, 30), (20, 10, 30)] {
            let stages = vec![
                stage("expert_m", &[], "m", Behavior::Emit("M".into(), Duration::from_millis(m_delay))),
                stage("expert_p", &[], "p", Behavior::Emit("P".into(), Duration::from_millis(p_delay))),
                stage("expert_a", &[], "a", Behavior::Emit("A".into(), Duration::from_millis(a_delay))),
                stage("synth", &["a", "m", "p"], "synthesis", Behavior::ConcatInputs),
                stage("format", &["synthesis"], "report", Behavior::ConcatInputs),
            ];
            let scheduler = scheduler(stages, RunMode::Full, &[]);
            let store = MemoryArtifactStore::new();
            let outcome = scheduler.execute(&store, BTreeMap::new()).await.unwrap();
            let report = outcome.report().unwrap();
            assert_eq!(report.run.status, RunStatus::Succeeded);

            // BTreeMap key order: a, m, p.
            let synthesis = store.get("synthesis").await.unwrap().unwrap();
            assert_eq!(synthesis.payload, "A+M+P");
            let final_report = store.get("report").await.unwrap().unwrap();
            assert_eq!(final_report.payload, "A+M+P");
        }
    }

    #[tokio::test]
    async fn failure_cancels_siblings_and_keeps_completed_artifacts() {
        let stages = vec![
            stage("fast", &[], "fast_out", Behavior::Emit("done".into(), Duration::from_millis(1))),
            stage("doomed", &[], "doomed_out", Behavior::Fail),
            stage("slow", &[], "slow_out", Behavior::SpinUntilCancelled),
            stage("sink", &["fast_out", "doomed_out", "slow_out"], "merged", Behavior::ConcatInputs),
        ];
        let scheduler = scheduler(stages, RunMode::Full, &[]);
        let store = MemoryArtifactStore::new();

        let err = scheduler.execute(&store, BTreeMap::new()).await.unwrap_err();
        assert_eq!(err.stage(), Some("doomed"));

        // The fast sibling finished and keeps its artifact; the cancelled
        // sibling persisted nothing.
        assert!(store.get("fast_out").await.unwrap().is_some());
        assert!(store.get("slow_out").await.unwrap().is_none());
        assert!(store.get("merged").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cancelled_stage_usage_stays_on_the_ledger() {
        let stages = vec![
            stage("doomed", &[], "doomed_out", Behavior::Fail),
            stage("slow", &[], "slow_out", Behavior::SpinUntilCancelled),
        ];
        let graph = StageGraph::new(stages, &[]).unwrap();
        let env = env(RunMode::Full);
        let ledger = Arc::clone(&env.ledger);
        let scheduler = GraphScheduler::new(graph, env, Duration::from_secs(5));
        let store = MemoryArtifactStore::new();

        scheduler.execute(&store, BTreeMap::new()).await.unwrap_err();
        let total = ledger.total();
        assert_eq!(total.total_units, 7);
    }

    #[tokio::test]
    async fn deadline_overrun_is_a_timeout_error() {
        let stages = vec![stage(
            "sleepy",
            &[],
            "out",
            Behavior::Emit("late".into(), Duration::from_millis(200)),
        )];
        let graph = StageGraph::new(stages, &[]).unwrap();
        let scheduler = GraphScheduler::new(graph, env(RunMode::Full), Duration::from_millis(20));
        let store = MemoryArtifactStore::new();

        let err = scheduler.execute(&store, BTreeMap::new()).await.unwrap_err();
        assert!(matches!(err, CoachError::StageTimeout { .. }));
        assert!(store.get("out").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn suspend_then_resume_completes_the_run() {
        let stages = vec![
            stage("early", &[], "early_out", Behavior::Emit("E".into(), Duration::from_millis(1))),
            stage("gate", &["early_out"], "gated", Behavior::SuspendOnce),
            stage("after", &["gated"], "final", Behavior::ConcatInputs),
        ];
        let scheduler = scheduler(stages, RunMode::Full, &[]);
        let store = MemoryArtifactStore::new();

        let suspended = scheduler
            .execute(&store, BTreeMap::new())
            .await
            .unwrap()
            .suspended()
            .unwrap();
        assert_eq!(suspended.run.status, RunStatus::AwaitingInput);
        assert_eq!(suspended.request.questions, vec!["clarify?"]);
        // Nothing downstream of the gate ran.
        assert!(store.get("gated").await.unwrap().is_none());
        assert!(store.get("final").await.unwrap().is_none());

        let response = InterruptResponse {
            request_id: suspended.request.id,
            answers: vec!["yes".to_string()],
        };
        let report = scheduler
            .resume(&store, &suspended, &response)
            .await
            .unwrap()
            .report()
            .unwrap();
        assert_eq!(report.run.status, RunStatus::Succeeded);
        assert_eq!(report.run.id, suspended.run.id);
        assert_eq!(
            store.get("gated").await.unwrap().unwrap().payload,
            "answered:yes"
        );
        assert_eq!(
            store.get("final").await.unwrap().unwrap().payload,
            "answered:yes"
        );
    }

    #[tokio::test]
    async fn mismatched_resume_key_leaves_state_unchanged() {
        let stages = vec![stage("gate", &[], "gated", Behavior::SuspendOnce)];
        let scheduler = scheduler(stages, RunMode::Full, &[]);
        let store = MemoryArtifactStore::new();

        let suspended = scheduler
            .execute(&store, BTreeMap::new())
            .await
            .unwrap()
            .suspended()
            .unwrap();

        let bad = InterruptResponse {
            request_id: Uuid::new_v4(),
            answers: vec![],
        };
        let err = scheduler.resume(&store, &suspended, &bad).await.unwrap_err();
        assert!(matches!(err, CoachError::InterruptProtocol { .. }));
        assert_eq!(suspended.run.status, RunStatus::AwaitingInput);

        // The original response still works afterwards.
        let good = InterruptResponse {
            request_id: suspended.request.id,
            answers: vec!["fine".to_string()],
        };
        let outcome = scheduler.resume(&store, &suspended, &good).await.unwrap();
        assert!(outcome.report().is_some());
    }

    /// A gate that suspends on every invocation, answers or not.
    struct StubbornGate;

    #[async_trait]
    impl Stage for StubbornGate {
        fn name(&self) -> &str {
            "stubborn"
        }

        fn inputs(&self) -> Vec<String> {
            vec![]
        }

        fn outputs(&self) -> Vec<String> {
            vec!["out".to_string()]
        }

        fn interruptible(&self) -> bool {
            true
        }

        async fn execute(&self, _ctx: &StageContext) -> Result<StageOutcome> {
            Ok(StageOutcome::Suspend(SuspendRequest {
                questions: vec!["again?".to_string()],
                state_token: String::new(),
            }))
        }
    }

    #[tokio::test]
    async fn re_suspension_on_resume_is_a_protocol_error() {
        let graph = StageGraph::new(vec![Arc::new(StubbornGate) as Arc<dyn Stage>], &[]).unwrap();
        let scheduler = GraphScheduler::new(graph, env(RunMode::Full), Duration::from_secs(5));
        let store = MemoryArtifactStore::new();

        let suspended = scheduler
            .execute(&store, BTreeMap::new())
            .await
            .unwrap()
            .suspended()
            .unwrap();
        let response = InterruptResponse {
            request_id: suspended.request.id,
            answers: vec!["answer".to_string()],
        };
        let err = scheduler
            .resume(&store, &suspended, &response)
            .await
            .unwrap_err();
        assert!(matches!(err, CoachError::InterruptProtocol { .. }));
    }

    #[tokio::test]
    async fn update_mode_rejects_interrupts() {
        let graph = StageGraph::new(vec![Arc::new(StubbornGate) as Arc<dyn Stage>], &[]).unwrap();
        let scheduler = GraphScheduler::new(graph, env(RunMode::Update), Duration::from_secs(5));
        let store = MemoryArtifactStore::new();

        let err = scheduler.execute(&store, BTreeMap::new()).await.unwrap_err();
        assert!(matches!(err, CoachError::InterruptProtocol { .. }));
    }

    #[tokio::test]
    async fn missing_initial_artifact_is_rejected_up_front() {
        let stages = vec![stage("integrator", &["seed"], "out", Behavior::ConcatInputs)];
        let scheduler = scheduler(stages, RunMode::Update, &["seed"]);
        let store = MemoryArtifactStore::new();

        let err = scheduler.execute(&store, BTreeMap::new()).await.unwrap_err();
        assert!(err.to_string().contains("initial artifact 'seed'"));
    }
}
