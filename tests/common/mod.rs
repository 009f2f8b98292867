//! Shared fixtures for the integration suites: a scripted reasoning client,
//! a static telemetry source, and config/engine builders.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::path::Path;
use std::sync::Arc;

use cadence::artifact::FsArtifactStore;
use cadence::config::{
    AthleteConfig, CoachConfig, Competition, ContextConfig, ExtractionConfig, OutputConfig,
    ReasoningConfig, TelemetryConfig, WeeklyProgressConfig,
};
use cadence::engine::CoachEngine;
use cadence::error::Result;
use cadence::reasoning::{
    ReasoningClient, ReasoningRequest, ReasoningResponse, StageRole, TokenUsage,
};
use cadence::telemetry::{
    ActivityRecord, DailyMetrics, ExtractionWindow, TelemetryClient, TelemetrySnapshot,
};

/// Tokens reported by every scripted reasoning call.
pub const SCRIPTED_INPUT_TOKENS: u64 = 100;
pub const SCRIPTED_OUTPUT_TOKENS: u64 = 50;

/// Reasoning calls made by each graph variant (extraction and data
/// integration are not reasoning stages).
pub const FULL_GRAPH_CALLS: usize = 11;
pub const UPDATE_GRAPH_CALLS: usize = 2;

type Handler = Box<dyn Fn(&ReasoningRequest) -> String + Send + Sync>;

/// Deterministic reasoning backend driven by a per-request handler.
pub struct ScriptedReasoningClient {
    handler: Handler,
}

impl ScriptedReasoningClient {
    pub fn with_handler(
        handler: impl Fn(&ReasoningRequest) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
        }
    }

    /// The default script: experts return "M"/"P"/"A", synthesis merges the
    /// expert sections it was given, formatters pass their content through
    /// untouched. This makes merge behavior observable end to end.
    pub fn scripted() -> Self {
        Self::with_handler(default_script)
    }

    /// Like [`scripted`], but the first synthesis call asks a clarifying
    /// question instead of answering.
    pub fn scripted_with_clarification() -> Self {
        Self::with_handler(|request| {
            if request.role == StageRole::Synthesis
                && !request.prompt.contains("Clarifications supplied by the athlete:")
            {
                "CLARIFY: Was the volume spike in week 3 a race or a training camp?".to_string()
            } else {
                default_script(request)
            }
        })
    }
}

fn section_value<'a>(prompt: &'a str, key: &str) -> &'a str {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix(&format!("{key}: ")))
        .unwrap_or("")
}

fn default_script(request: &ReasoningRequest) -> String {
    match request.role {
        StageRole::Summarizer => "domain summary".to_string(),
        StageRole::MetricsExpert => "M".to_string(),
        StageRole::PhysiologyExpert => "P".to_string(),
        StageRole::ActivityExpert => "A".to_string(),
        StageRole::Synthesis => format!(
            "{}+{}+{}",
            section_value(&request.prompt, "metrics_result"),
            section_value(&request.prompt, "physiology_result"),
            section_value(&request.prompt, "activity_result"),
        ),
        StageRole::SeasonPlanner => "season plan: base, build, peak".to_string(),
        StageRole::WeeklyPlanner => "weekly plan: easy, intervals, long ride".to_string(),
        // Pass the content section through so report artifacts expose
        // exactly what the formatter received.
        StageRole::Formatter => request
            .prompt
            .split_once("\n\n")
            .map(|(_, content)| content.to_string())
            .unwrap_or_default(),
    }
}

#[async_trait]
impl ReasoningClient for ScriptedReasoningClient {
    async fn complete(&self, request: ReasoningRequest) -> Result<ReasoningResponse> {
        Ok(ReasoningResponse {
            content: (self.handler)(&request),
            usage: TokenUsage {
                input_tokens: SCRIPTED_INPUT_TOKENS,
                output_tokens: SCRIPTED_OUTPUT_TOKENS,
            },
            model: request.model,
        })
    }
}

/// Fixed telemetry: a couple of recent sessions and wellness days.
pub struct StaticTelemetryClient;

#[async_trait]
impl TelemetryClient for StaticTelemetryClient {
    async fn extract(&self, _window: ExtractionWindow) -> Result<TelemetrySnapshot> {
        let today = Utc::now().date_naive();
        Ok(TelemetrySnapshot {
            activities: vec![
                ActivityRecord {
                    date: today - Duration::days(2),
                    activity_type: "run".to_string(),
                    distance_km: 14.0,
                    duration_hours: 1.2,
                    elevation_gain_m: 120.0,
                    avg_heart_rate: Some(148.0),
                    max_heart_rate: Some(172.0),
                    training_load: Some(95.0),
                },
                ActivityRecord {
                    date: today - Duration::days(4),
                    activity_type: "ride".to_string(),
                    distance_km: 62.0,
                    duration_hours: 2.3,
                    elevation_gain_m: 540.0,
                    avg_heart_rate: Some(135.0),
                    max_heart_rate: Some(166.0),
                    training_load: Some(130.0),
                },
            ],
            daily_metrics: vec![DailyMetrics {
                date: today - Duration::days(1),
                resting_heart_rate: Some(44.0),
                sleep_hours: Some(7.8),
                hrv_ms: Some(82.0),
                body_battery: Some(71.0),
            }],
        })
    }
}

pub fn test_config(output_dir: &Path, hitl_enabled: bool) -> CoachConfig {
    CoachConfig {
        athlete: AthleteConfig {
            name: "Mara Voss".to_string(),
        },
        context: ContextConfig {
            analysis: "targeting a fall marathon".to_string(),
            planning: "three quality sessions per week".to_string(),
        },
        extraction: ExtractionConfig {
            hitl_enabled,
            ..ExtractionConfig::default()
        },
        competitions: vec![Competition {
            name: "City Marathon".to_string(),
            date: "2026-10-11".to_string(),
            race_type: "marathon".to_string(),
            priority: "A".to_string(),
            target_time: "2:58".to_string(),
        }],
        weekly_progress: WeeklyProgressConfig {
            notes: "legs felt heavy after the long ride".to_string(),
        },
        telemetry: TelemetryConfig::default(),
        reasoning: ReasoningConfig::default(),
        output: OutputConfig {
            directory: output_dir.to_path_buf(),
        },
    }
}

pub fn engine_with(
    output_dir: &Path,
    hitl_enabled: bool,
    reasoning: ScriptedReasoningClient,
) -> (CoachEngine, Arc<FsArtifactStore>) {
    let store = Arc::new(FsArtifactStore::new(output_dir));
    let engine = CoachEngine::new(
        test_config(output_dir, hitl_enabled),
        Arc::clone(&store) as Arc<dyn cadence::artifact::ArtifactStore>,
        Arc::new(StaticTelemetryClient),
        Arc::new(reasoning),
    );
    (engine, store)
}
