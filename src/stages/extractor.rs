//! Root stage of the full graph: pulls telemetry and prepares the
//! sliding-window context consumed by every downstream stage.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

use crate::artifact::names;
use crate::error::{CoachError, Result};
use crate::telemetry::{prepare_context, ExtractionWindow, TelemetryClient};
use crate::workflow::{Stage, StageContext, StageOutcome};

#[derive(Debug, Clone, Copy)]
pub struct ExtractorParams {
    pub window: ExtractionWindow,
    pub recent_window_days: u32,
    pub trends_window_days: u32,
    pub as_of: NaiveDate,
}

pub struct Extractor {
    telemetry: Arc<dyn TelemetryClient>,
    params: ExtractorParams,
}

impl Extractor {
    pub fn new(telemetry: Arc<dyn TelemetryClient>, params: ExtractorParams) -> Self {
        Self { telemetry, params }
    }
}

#[async_trait]
impl Stage for Extractor {
    fn name(&self) -> &str {
        "extractor"
    }

    fn inputs(&self) -> Vec<String> {
        vec![]
    }

    fn outputs(&self) -> Vec<String> {
        vec![names::TELEMETRY_CONTEXT.to_string()]
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutcome> {
        ctx.ensure_active()?;
        let snapshot = self.telemetry.extract(self.params.window).await?;
        let prepared = prepare_context(
            &snapshot,
            self.params.as_of,
            self.params.recent_window_days,
            self.params.trends_window_days,
        );
        let payload = serde_json::to_string_pretty(&prepared).map_err(|e| {
            CoachError::stage_failed(
                ctx.run_id(),
                ctx.stage_name(),
                format!("failed to encode telemetry context: {e}"),
            )
        })?;
        Ok(StageOutcome::Complete(vec![(
            names::TELEMETRY_CONTEXT.to_string(),
            payload,
        )]))
    }
}
