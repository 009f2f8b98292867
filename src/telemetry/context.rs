//! Context preparation for the reasoning stages.
//!
//! Hybrid sliding window: the last `recent_window_days` keep full activity
//! detail, everything older inside the trends window is collapsed into
//! weekly aggregates so the prepared context stays inside a token budget.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ActivityRecord, DailyMetrics, TelemetrySnapshot};

/// Aggregated training metrics for a single week.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyAggregate {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub total_activities: usize,
    pub total_distance_km: f64,
    pub total_duration_hours: f64,
    pub total_elevation_gain_m: f64,
    pub activities_by_type: BTreeMap<String, usize>,
    pub distance_by_type: BTreeMap<String, f64>,
    pub avg_heart_rate: Option<f64>,
    pub max_heart_rate: Option<f64>,
    pub total_training_load: Option<f64>,
    pub longest_activity_distance_km: Option<f64>,
    pub avg_resting_hr: Option<f64>,
    pub avg_sleep_hours: Option<f64>,
}

/// Prepared context payload serialized into the `telemetry_context` artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedContext {
    /// Full detail inside the recent window.
    pub recent_activities: Vec<ActivityRecord>,
    /// Weekly aggregates across the trends window.
    pub weekly_trends: Vec<WeeklyAggregate>,
    /// Latest wellness markers.
    pub current_metrics: Option<DailyMetrics>,
    pub preparation_date: NaiveDate,
    pub recent_window_days: u32,
    pub trends_window_days: u32,
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Build the sliding-window context from a raw snapshot.
pub fn prepare_context(
    snapshot: &TelemetrySnapshot,
    as_of: NaiveDate,
    recent_window_days: u32,
    trends_window_days: u32,
) -> PreparedContext {
    let recent_cutoff = as_of - Duration::days(recent_window_days as i64);
    let trends_cutoff = as_of - Duration::days(trends_window_days as i64);

    let mut recent_activities: Vec<ActivityRecord> = snapshot
        .activities
        .iter()
        .filter(|a| a.date > recent_cutoff)
        .cloned()
        .collect();
    recent_activities.sort_by_key(|a| a.date);

    // Group trend-window activities by ISO week start.
    let mut weeks: BTreeMap<NaiveDate, Vec<&ActivityRecord>> = BTreeMap::new();
    for activity in &snapshot.activities {
        if activity.date > trends_cutoff && activity.date <= recent_cutoff {
            weeks.entry(week_start(activity.date)).or_default().push(activity);
        }
    }

    let mut metrics_by_week: BTreeMap<NaiveDate, Vec<&DailyMetrics>> = BTreeMap::new();
    for metrics in &snapshot.daily_metrics {
        if metrics.date > trends_cutoff && metrics.date <= recent_cutoff {
            metrics_by_week
                .entry(week_start(metrics.date))
                .or_default()
                .push(metrics);
        }
    }

    let weekly_trends = weeks
        .into_iter()
        .map(|(start, activities)| {
            let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
            let mut distance_by_type: BTreeMap<String, f64> = BTreeMap::new();
            for a in &activities {
                *by_type.entry(a.activity_type.clone()).or_default() += 1;
                *distance_by_type.entry(a.activity_type.clone()).or_default() += a.distance_km;
            }

            let heart_rates: Vec<f64> = activities.iter().filter_map(|a| a.avg_heart_rate).collect();
            let loads: Vec<f64> = activities.iter().filter_map(|a| a.training_load).collect();
            let week_metrics = metrics_by_week.remove(&start).unwrap_or_default();
            let resting: Vec<f64> = week_metrics
                .iter()
                .filter_map(|m| m.resting_heart_rate)
                .collect();
            let sleep: Vec<f64> = week_metrics.iter().filter_map(|m| m.sleep_hours).collect();

            WeeklyAggregate {
                week_start: start,
                week_end: start + Duration::days(6),
                total_activities: activities.len(),
                total_distance_km: activities.iter().map(|a| a.distance_km).sum(),
                total_duration_hours: activities.iter().map(|a| a.duration_hours).sum(),
                total_elevation_gain_m: activities.iter().map(|a| a.elevation_gain_m).sum(),
                activities_by_type: by_type,
                distance_by_type,
                avg_heart_rate: mean(&heart_rates),
                max_heart_rate: activities
                    .iter()
                    .filter_map(|a| a.max_heart_rate)
                    .fold(None, |acc: Option<f64>, hr| {
                        Some(acc.map_or(hr, |prev| prev.max(hr)))
                    }),
                total_training_load: (!loads.is_empty()).then(|| loads.iter().sum()),
                longest_activity_distance_km: activities
                    .iter()
                    .map(|a| a.distance_km)
                    .fold(None, |acc: Option<f64>, d| {
                        Some(acc.map_or(d, |prev| prev.max(d)))
                    }),
                avg_resting_hr: mean(&resting),
                avg_sleep_hours: mean(&sleep),
            }
        })
        .collect();

    let current_metrics = snapshot
        .daily_metrics
        .iter()
        .max_by_key(|m| m.date)
        .cloned();

    PreparedContext {
        recent_activities,
        weekly_trends,
        current_metrics,
        preparation_date: as_of,
        recent_window_days,
        trends_window_days,
    }
}
