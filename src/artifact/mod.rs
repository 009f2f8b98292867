//! Artifact store: named, versioned stage outputs under a run-scoped
//! namespace.
//!
//! Writes append; history is never overwritten. Freshness is decided in one
//! place ([`classify`]) so cross-run reuse stays auditable instead of being
//! scattered file-existence checks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::workflow::RunMode;

pub mod fs;
pub mod memory;

pub use fs::FsArtifactStore;
pub use memory::MemoryArtifactStore;

/// Artifact names eligible for cross-run reuse in update mode.
pub const REUSABLE_ARTIFACTS: [&str; 4] = [
    "metrics_result",
    "activity_result",
    "physiology_result",
    "season_plan",
];

/// The persisted logical namespace. Every other stage output is run-internal
/// working state and never reaches the store.
pub const PERSISTED_ARTIFACTS: [&str; 7] = [
    "metrics_result",
    "activity_result",
    "physiology_result",
    "season_plan",
    "analysis_report",
    "plan_report",
    "run_summary",
];

pub fn is_persistent(name: &str) -> bool {
    PERSISTED_ARTIFACTS.contains(&name)
}

/// Logical artifact names with fixed meaning across the engine.
pub mod names {
    pub const TELEMETRY_CONTEXT: &str = "telemetry_context";
    pub const METRICS_SUMMARY: &str = "metrics_summary";
    pub const PHYSIOLOGY_SUMMARY: &str = "physiology_summary";
    pub const ACTIVITY_SUMMARY: &str = "activity_summary";
    pub const METRICS_RESULT: &str = "metrics_result";
    pub const PHYSIOLOGY_RESULT: &str = "physiology_result";
    pub const ACTIVITY_RESULT: &str = "activity_result";
    pub const SYNTHESIS_RESULT: &str = "synthesis_result";
    pub const SEASON_PLAN: &str = "season_plan";
    pub const ANALYSIS_REPORT: &str = "analysis_report";
    pub const INTEGRATED_CONTEXT: &str = "integrated_context";
    pub const WEEKLY_PLAN: &str = "weekly_plan";
    pub const PLAN_REPORT: &str = "plan_report";
    pub const RUN_SUMMARY: &str = "run_summary";
}

/// A single current-or-historical artifact version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub payload: String,
    pub produced_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

/// Freshness classification relative to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Freshness {
    /// Produced by the current run.
    Fresh,
    /// Prior-run output eligible for reuse under update mode.
    Reusable,
    /// Cross-run artifact that must not be silently reused.
    Stale,
}

/// The single audit point for cross-run reuse rules.
pub fn classify(artifact: &Artifact, current_run: Uuid, mode: RunMode) -> Freshness {
    if artifact.produced_by == current_run {
        Freshness::Fresh
    } else if mode == RunMode::Update && REUSABLE_ARTIFACTS.contains(&artifact.name.as_str()) {
        Freshness::Reusable
    } else {
        Freshness::Stale
    }
}

/// Persistence boundary for stage outputs.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Current version of a named artifact, if any.
    async fn get(&self, name: &str) -> Result<Option<Artifact>>;

    /// Append a new current version, superseding (never deleting) the prior.
    async fn put(&self, name: &str, payload: &str, run_id: Uuid) -> Result<Artifact>;

    /// All versions of a name, oldest first, current last.
    async fn history(&self, name: &str) -> Result<Vec<Artifact>>;

    /// Classify the current version of `name` relative to a run.
    async fn classify(&self, name: &str, current_run: Uuid, mode: RunMode) -> Result<Freshness> {
        match self.get(name).await? {
            Some(artifact) => Ok(classify(&artifact, current_run, mode)),
            None => Ok(Freshness::Stale),
        }
    }

    /// Reusable names absent from the store, for the update precondition.
    async fn missing_reusable(&self) -> Result<Vec<String>> {
        let mut missing = Vec::new();
        for name in REUSABLE_ARTIFACTS {
            if self.get(name).await?.is_none() {
                missing.push(name.to_string());
            }
        }
        Ok(missing)
    }
}
