//! Per-domain expert analyzers, the second fan-out of the full graph. Their
//! outputs are the reusable analysis artifacts update runs depend on.

use async_trait::async_trait;

use crate::error::Result;
use crate::reasoning::StageRole;
use crate::workflow::{Stage, StageContext, StageOutcome};

use super::Domain;

pub struct ExpertAnalyzer {
    domain: Domain,
    name: String,
}

impl ExpertAnalyzer {
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            name: format!("{}_expert", domain.as_str()),
        }
    }

    fn role(&self) -> StageRole {
        match self.domain {
            Domain::Metrics => StageRole::MetricsExpert,
            Domain::Physiology => StageRole::PhysiologyExpert,
            Domain::Activity => StageRole::ActivityExpert,
        }
    }

    fn charter(&self) -> &'static str {
        match self.domain {
            Domain::Metrics => {
                "You are a performance-metrics coach. Assess load progression, \
                 fitness trajectory, and readiness to absorb more training."
            }
            Domain::Physiology => {
                "You are an exercise physiologist. Assess recovery status, \
                 adaptation signals, and overtraining risk."
            }
            Domain::Activity => {
                "You are a session-analysis coach. Assess workout execution, \
                 intensity distribution, and technique-relevant patterns."
            }
        }
    }
}

#[async_trait]
impl Stage for ExpertAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> Vec<String> {
        vec![self.domain.summary_artifact().to_string()]
    }

    fn outputs(&self) -> Vec<String> {
        vec![self.domain.result_artifact().to_string()]
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutcome> {
        let summary = ctx.input(self.domain.summary_artifact())?;
        let env = ctx.env();
        let prompt = format!(
            "Athlete: {}\nAnalysis context: {}\n\nDomain summary:\n{summary}\n\n\
             Produce your expert analysis for this domain.",
            env.athlete, env.analysis_context,
        );
        let analysis = ctx
            .reason(self.role(), Some(self.charter().to_string()), prompt)
            .await?;
        Ok(StageOutcome::Complete(vec![(
            self.domain.result_artifact().to_string(),
            analysis,
        )]))
    }
}
