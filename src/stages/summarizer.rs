//! Per-domain telemetry summarizers, the first fan-out of the full graph.

use async_trait::async_trait;

use crate::artifact::names;
use crate::error::Result;
use crate::reasoning::StageRole;
use crate::workflow::{Stage, StageContext, StageOutcome};

use super::Domain;

pub struct Summarizer {
    domain: Domain,
    name: String,
}

impl Summarizer {
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            name: format!("{}_summarizer", domain.as_str()),
        }
    }

    fn focus(&self) -> &'static str {
        match self.domain {
            Domain::Metrics => {
                "training load, fitness/fatigue trends, and performance metrics"
            }
            Domain::Physiology => {
                "resting heart rate, HRV, sleep, and recovery markers"
            }
            Domain::Activity => {
                "individual sessions: distribution, intensity, and execution quality"
            }
        }
    }
}

#[async_trait]
impl Stage for Summarizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> Vec<String> {
        vec![names::TELEMETRY_CONTEXT.to_string()]
    }

    fn outputs(&self) -> Vec<String> {
        vec![self.domain.summary_artifact().to_string()]
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutcome> {
        let telemetry = ctx.input(names::TELEMETRY_CONTEXT)?;
        let prompt = format!(
            "Summarize the telemetry below for {}, focusing on {}.\n\n\
             Telemetry context:\n{telemetry}",
            ctx.env().athlete,
            self.focus(),
        );
        let summary = ctx
            .reason(
                StageRole::Summarizer,
                Some("You condense endurance-training telemetry for expert review.".to_string()),
                prompt,
            )
            .await?;
        Ok(StageOutcome::Complete(vec![(
            self.domain.summary_artifact().to_string(),
            summary,
        )]))
    }
}
