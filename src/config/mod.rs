//! Coach configuration loaded from a YAML or JSON file.
//!
//! Parsing is a boundary concern: the engine consumes the typed
//! [`CoachConfig`] and never touches the file format again.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CoachError, Result};

/// Top-level configuration for one athlete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachConfig {
    pub athlete: AthleteConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub competitions: Vec<Competition>,
    #[serde(default)]
    pub weekly_progress: WeeklyProgressConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where the exported telemetry snapshot lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_snapshot_path")]
    pub snapshot: PathBuf,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            snapshot: default_snapshot_path(),
        }
    }
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("./telemetry.json")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AthleteConfig {
    pub name: String,
}

/// Free-text context handed to the reasoning stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub planning: String,
}

/// Telemetry extraction windows and run behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Days of activity history for a full run.
    #[serde(default = "default_activities_days")]
    pub activities_days: u32,
    /// Days of wellness-metric history for a full run.
    #[serde(default = "default_metrics_days")]
    pub metrics_days: u32,
    /// Fixed short window for update runs.
    #[serde(default = "default_update_days")]
    pub update_days: u32,
    /// Days of detailed context vs aggregated trends.
    #[serde(default = "default_recent_days")]
    pub context_recent_days: u32,
    #[serde(default = "default_trends_days")]
    pub context_trends_days: u32,
    /// Whether the synthesizer may pause a full run for clarification.
    #[serde(default = "default_true")]
    pub hitl_enabled: bool,
    /// Deadline applied to every stage invocation.
    #[serde(with = "humantime_serde", default = "default_stage_timeout")]
    pub stage_timeout: Duration,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            activities_days: default_activities_days(),
            metrics_days: default_metrics_days(),
            update_days: default_update_days(),
            context_recent_days: default_recent_days(),
            context_trends_days: default_trends_days(),
            hitl_enabled: default_true(),
            stage_timeout: default_stage_timeout(),
        }
    }
}

fn default_activities_days() -> u32 {
    7
}

fn default_metrics_days() -> u32 {
    14
}

fn default_update_days() -> u32 {
    14
}

fn default_recent_days() -> u32 {
    14
}

fn default_trends_days() -> u32 {
    180
}

fn default_true() -> bool {
    true
}

fn default_stage_timeout() -> Duration {
    Duration::from_secs(300)
}

/// Competition or goal-event metadata, full runs only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Competition {
    pub name: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub race_type: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default)]
    pub target_time: String,
}

fn default_priority() -> String {
    "B".to_string()
}

/// Progress notes feeding update runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeeklyProgressConfig {
    #[serde(default)]
    pub notes: String,
}

/// Reasoning backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key; never the key itself.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub mode: ReasoningMode,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            mode: ReasoningMode::default(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_api_key_env() -> String {
    "CADENCE_API_KEY".to_string()
}

/// Model assignment table selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningMode {
    Standard,
    CostEffective,
    #[default]
    Development,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl CoachConfig {
    /// Load a configuration file, dispatching on extension.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoachError::Config {
            message: format!("failed to read config file: {e}"),
            path: Some(path.to_path_buf()),
            source: Some(Box::new(e)),
        })?;

        let config: CoachConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| CoachError::Config {
                    message: format!("invalid YAML config: {e}"),
                    path: Some(path.to_path_buf()),
                    source: Some(Box::new(e)),
                })?
            }
            Some("json") => serde_json::from_str(&content).map_err(|e| CoachError::Config {
                message: format!("invalid JSON config: {e}"),
                path: Some(path.to_path_buf()),
                source: Some(Box::new(e)),
            })?,
            other => {
                return Err(CoachError::config_at(
                    format!("unsupported config format: {:?}", other.unwrap_or("none")),
                    path,
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.athlete.name.trim().is_empty() {
            return Err(CoachError::config("athlete name is required"));
        }
        if self.extraction.update_days == 0 {
            return Err(CoachError::config("extraction.update_days must be positive"));
        }
        if self.extraction.stage_timeout.is_zero() {
            return Err(CoachError::config(
                "extraction.stage_timeout must be positive",
            ));
        }
        Ok(())
    }

    /// Progress note for update runs, when one was supplied.
    pub fn progress_notes(&self) -> Option<&str> {
        let trimmed = self.weekly_progress.notes.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Starter config written by `cadence init-config`.
pub const CONFIG_TEMPLATE: &str = r#"athlete:
  name: "Athlete"

context:
  analysis: ""
  planning: ""

extraction:
  activities_days: 7
  metrics_days: 14
  update_days: 14
  hitl_enabled: true
  stage_timeout: 5m

competitions: []

weekly_progress:
  notes: ""

telemetry:
  snapshot: ./telemetry.json

reasoning:
  mode: development

output:
  directory: ./data
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_yaml_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "coach.yaml", "athlete:\n  name: Mara\n");
        let config = CoachConfig::load(&path).unwrap();
        assert_eq!(config.athlete.name, "Mara");
        assert_eq!(config.extraction.update_days, 14);
        assert_eq!(config.extraction.stage_timeout, Duration::from_secs(300));
        assert!(config.extraction.hitl_enabled);
        assert!(config.progress_notes().is_none());
    }

    #[test]
    fn loads_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "coach.json",
            r#"{"athlete": {"name": "Mara"}, "weekly_progress": {"notes": "tired legs"}}"#,
        );
        let config = CoachConfig::load(&path).unwrap();
        assert_eq!(config.progress_notes(), Some("tired legs"));
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "coach.toml", "athlete = {}");
        let err = CoachConfig::load(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn rejects_blank_athlete_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "coach.yaml", "athlete:\n  name: \"  \"\n");
        assert!(CoachConfig::load(&path).is_err());
    }

    #[test]
    fn parses_humantime_stage_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "coach.yaml",
            "athlete:\n  name: Mara\nextraction:\n  stage_timeout: 90s\n",
        );
        let config = CoachConfig::load(&path).unwrap();
        assert_eq!(config.extraction.stage_timeout, Duration::from_secs(90));
    }

    #[test]
    fn template_parses_back() {
        let config: CoachConfig = serde_yaml::from_str(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.athlete.name, "Athlete");
    }
}
