//! File-backed telemetry source.
//!
//! Reads a snapshot exported by provider tooling and filters it to the
//! requested window. This keeps provider protocols outside the crate while
//! giving the CLI a working extraction path.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::path::PathBuf;

use crate::error::{CoachError, Result};

use super::{ExtractionWindow, TelemetryClient, TelemetrySnapshot};

pub struct FileTelemetryClient {
    path: PathBuf,
}

impl FileTelemetryClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TelemetryClient for FileTelemetryClient {
    async fn extract(&self, window: ExtractionWindow) -> Result<TelemetrySnapshot> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| CoachError::Storage {
                message: format!("failed to read telemetry snapshot: {e}"),
                path: Some(self.path.clone()),
                source: Some(Box::new(e)),
            })?;
        let snapshot: TelemetrySnapshot =
            serde_json::from_str(&content).map_err(|e| CoachError::Storage {
                message: format!("invalid telemetry snapshot: {e}"),
                path: Some(self.path.clone()),
                source: Some(Box::new(e)),
            })?;

        let today = Utc::now().date_naive();
        let activity_cutoff = today - Duration::days(window.activities_days as i64);
        let metrics_cutoff = today - Duration::days(window.metrics_days as i64);
        Ok(TelemetrySnapshot {
            activities: snapshot
                .activities
                .into_iter()
                .filter(|a| a.date > activity_cutoff)
                .collect(),
            daily_metrics: snapshot
                .daily_metrics
                .into_iter()
                .filter(|m| m.date > metrics_cutoff)
                .collect(),
        })
    }
}
