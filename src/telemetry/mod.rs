//! Telemetry extraction boundary.
//!
//! The engine never talks to a fitness provider directly; it consumes a
//! [`TelemetryClient`] that returns time-windowed activity and wellness
//! records. Provider implementations live outside this crate.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod context;
pub mod file;

pub use context::{prepare_context, PreparedContext, WeeklyAggregate};
pub use file::FileTelemetryClient;

/// Time window for one extraction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionWindow {
    pub activities_days: u32,
    pub metrics_days: u32,
}

impl ExtractionWindow {
    pub fn new(activities_days: u32, metrics_days: u32) -> Self {
        Self {
            activities_days,
            metrics_days,
        }
    }

    /// Fixed short window used by update runs.
    pub fn update(days: u32) -> Self {
        Self {
            activities_days: days,
            metrics_days: days,
        }
    }
}

/// One recorded activity session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub date: NaiveDate,
    pub activity_type: String,
    pub distance_km: f64,
    pub duration_hours: f64,
    #[serde(default)]
    pub elevation_gain_m: f64,
    #[serde(default)]
    pub avg_heart_rate: Option<f64>,
    #[serde(default)]
    pub max_heart_rate: Option<f64>,
    #[serde(default)]
    pub training_load: Option<f64>,
}

/// Daily wellness metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyMetrics {
    pub date: NaiveDate,
    #[serde(default)]
    pub resting_heart_rate: Option<f64>,
    #[serde(default)]
    pub sleep_hours: Option<f64>,
    #[serde(default)]
    pub hrv_ms: Option<f64>,
    #[serde(default)]
    pub body_battery: Option<f64>,
}

/// Everything one extraction returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub activities: Vec<ActivityRecord>,
    pub daily_metrics: Vec<DailyMetrics>,
}

impl TelemetrySnapshot {
    pub fn is_empty(&self) -> bool {
        self.activities.is_empty() && self.daily_metrics.is_empty()
    }
}

/// Boundary to the external telemetry provider.
#[async_trait]
pub trait TelemetryClient: Send + Sync {
    async fn extract(&self, window: ExtractionWindow) -> Result<TelemetrySnapshot>;
}
