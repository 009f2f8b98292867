//! Black-box reasoning boundary.
//!
//! Stages never build prompts against a concrete vendor API; they submit a
//! [`ReasoningRequest`] for their role and get text plus token usage back.
//! Model assignment and pricing live in the role catalog so cost estimates
//! are computed in one place.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::ReasoningMode;
use crate::error::Result;

pub mod http;

pub use http::HttpReasoningClient;

/// Which stage family a request comes from; selects the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageRole {
    Summarizer,
    MetricsExpert,
    PhysiologyExpert,
    ActivityExpert,
    Synthesis,
    SeasonPlanner,
    WeeklyPlanner,
    Formatter,
}

impl StageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summarizer => "summarizer",
            Self::MetricsExpert => "metrics_expert",
            Self::PhysiologyExpert => "physiology_expert",
            Self::ActivityExpert => "activity_expert",
            Self::Synthesis => "synthesis",
            Self::SeasonPlanner => "season_planner",
            Self::WeeklyPlanner => "weekly_planner",
            Self::Formatter => "formatter",
        }
    }
}

/// Model pricing and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub max_output_tokens: usize,
    pub cost_per_1k_input: f64,
    pub cost_per_1k_output: f64,
}

/// Request handed to the reasoning backend.
#[derive(Debug, Clone, Serialize)]
pub struct ReasoningRequest {
    pub role: StageRole,
    pub system: Option<String>,
    pub prompt: String,
    pub model: String,
    pub max_tokens: usize,
}

/// Token usage reported by the backend.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Response from the reasoning backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub model: String,
}

/// Boundary to the reasoning backend.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    async fn complete(&self, request: ReasoningRequest) -> Result<ReasoningResponse>;
}

/// Per-mode model assignment with pricing.
pub struct ModelCatalog {
    mode: ReasoningMode,
}

static MODEL_SPECS: Lazy<HashMap<&'static str, ModelSpec>> = Lazy::new(|| {
    let mut specs = HashMap::new();
    specs.insert(
        "deep-analysis",
        ModelSpec {
            name: "claude-opus-4".to_string(),
            max_output_tokens: 8192,
            cost_per_1k_input: 0.015,
            cost_per_1k_output: 0.075,
        },
    );
    specs.insert(
        "balanced",
        ModelSpec {
            name: "claude-sonnet-4".to_string(),
            max_output_tokens: 8192,
            cost_per_1k_input: 0.003,
            cost_per_1k_output: 0.015,
        },
    );
    specs.insert(
        "fast",
        ModelSpec {
            name: "claude-haiku-3-5".to_string(),
            max_output_tokens: 4096,
            cost_per_1k_input: 0.0008,
            cost_per_1k_output: 0.004,
        },
    );
    specs
});

impl ModelCatalog {
    pub fn new(mode: ReasoningMode) -> Self {
        Self { mode }
    }

    /// The model spec assigned to a role under the current mode.
    pub fn model_for(&self, role: StageRole) -> &'static ModelSpec {
        let tier = match self.mode {
            ReasoningMode::Standard => match role {
                StageRole::Summarizer | StageRole::Formatter => "fast",
                _ => "deep-analysis",
            },
            ReasoningMode::CostEffective => match role {
                StageRole::Synthesis | StageRole::SeasonPlanner => "balanced",
                _ => "fast",
            },
            ReasoningMode::Development => "balanced",
        };
        &MODEL_SPECS[tier]
    }

    /// Dollar estimate for one call's usage against a role's model.
    pub fn estimate_cost(&self, role: StageRole, usage: TokenUsage) -> f64 {
        let spec = self.model_for(role);
        let input = (usage.input_tokens as f64 / 1000.0) * spec.cost_per_1k_input;
        let output = (usage.output_tokens as f64 / 1000.0) * spec.cost_per_1k_output;
        input + output
    }

    pub fn request(&self, role: StageRole, system: Option<String>, prompt: String) -> ReasoningRequest {
        let spec = self.model_for(role);
        ReasoningRequest {
            role,
            system,
            prompt,
            model: spec.name.clone(),
            max_tokens: spec.max_output_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_mode_routes_experts_to_deep_analysis() {
        let catalog = ModelCatalog::new(ReasoningMode::Standard);
        assert_eq!(
            catalog.model_for(StageRole::MetricsExpert).name,
            "claude-opus-4"
        );
        assert_eq!(catalog.model_for(StageRole::Formatter).name, "claude-haiku-3-5");
    }

    #[test]
    fn cost_effective_mode_prefers_fast_models() {
        let catalog = ModelCatalog::new(ReasoningMode::CostEffective);
        assert_eq!(
            catalog.model_for(StageRole::Summarizer).name,
            "claude-haiku-3-5"
        );
        assert_eq!(
            catalog.model_for(StageRole::Synthesis).name,
            "claude-sonnet-4"
        );
    }

    #[test]
    fn cost_estimate_scales_with_usage() {
        let catalog = ModelCatalog::new(ReasoningMode::Development);
        let small = catalog.estimate_cost(
            StageRole::Synthesis,
            TokenUsage {
                input_tokens: 1000,
                output_tokens: 500,
            },
        );
        let large = catalog.estimate_cost(
            StageRole::Synthesis,
            TokenUsage {
                input_tokens: 2000,
                output_tokens: 1000,
            },
        );
        assert!(small > 0.0);
        assert!((large - small * 2.0).abs() < 1e-12);
    }
}
