//! Data integration: assembles the season plan, fresh telemetry, and any
//! progress note into the single context record the weekly planner consumes.
//! Pure assembly, no reasoning call.

use async_trait::async_trait;
use serde_json::json;

use crate::artifact::names;
use crate::error::{CoachError, Result};
use crate::workflow::{Stage, StageContext, StageOutcome};

pub struct DataIntegrator;

impl DataIntegrator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DataIntegrator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for DataIntegrator {
    fn name(&self) -> &str {
        "data_integrator"
    }

    fn inputs(&self) -> Vec<String> {
        vec![
            names::SEASON_PLAN.to_string(),
            names::TELEMETRY_CONTEXT.to_string(),
        ]
    }

    fn outputs(&self) -> Vec<String> {
        vec![names::INTEGRATED_CONTEXT.to_string()]
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutcome> {
        ctx.ensure_active()?;
        let env = ctx.env();

        let telemetry: serde_json::Value = serde_json::from_str(ctx.input(names::TELEMETRY_CONTEXT)?)
            .map_err(|e| {
                CoachError::stage_failed(
                    ctx.run_id(),
                    ctx.stage_name(),
                    format!("telemetry context is not valid JSON: {e}"),
                )
            })?;

        let integrated = json!({
            "athlete": env.athlete,
            "season_plan": ctx.input(names::SEASON_PLAN)?,
            "telemetry": telemetry,
            "progress_note": env.progress_note.as_ref().map(|note| json!({
                "body": note.body,
                "window_days": note.window_days,
            })),
        });

        let payload = serde_json::to_string_pretty(&integrated).map_err(|e| {
            CoachError::stage_failed(
                ctx.run_id(),
                ctx.stage_name(),
                format!("failed to encode integrated context: {e}"),
            )
        })?;

        Ok(StageOutcome::Complete(vec![(
            names::INTEGRATED_CONTEXT.to_string(),
            payload,
        )]))
    }
}
