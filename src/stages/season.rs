//! Season planning: periodization framework from the expert analyses,
//! independent of the synthesizer.

use async_trait::async_trait;

use crate::artifact::names;
use crate::error::Result;
use crate::reasoning::StageRole;
use crate::workflow::{Stage, StageContext, StageOutcome};

pub struct SeasonPlanner;

impl SeasonPlanner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SeasonPlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for SeasonPlanner {
    fn name(&self) -> &str {
        "season_planner"
    }

    fn inputs(&self) -> Vec<String> {
        vec![
            names::METRICS_RESULT.to_string(),
            names::PHYSIOLOGY_RESULT.to_string(),
            names::ACTIVITY_RESULT.to_string(),
        ]
    }

    fn outputs(&self) -> Vec<String> {
        vec![names::SEASON_PLAN.to_string()]
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutcome> {
        let env = ctx.env();
        let competitions = env
            .competitions
            .iter()
            .map(|c| format!("- {} ({}, priority {}, {})", c.name, c.date, c.priority, c.race_type))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Athlete: {}\nPlanning context: {}\n\nCompetitions:\n{competitions}\n\n\
             Expert findings:\n\
             metrics_result: {}\n\
             physiology_result: {}\n\
             activity_result: {}\n\n\
             Build a season periodization framework working back from the \
             priority competitions.",
            env.athlete,
            env.planning_context,
            ctx.input(names::METRICS_RESULT)?,
            ctx.input(names::PHYSIOLOGY_RESULT)?,
            ctx.input(names::ACTIVITY_RESULT)?,
        );
        let plan = ctx
            .reason(
                StageRole::SeasonPlanner,
                Some("You are a periodization strategist for endurance athletes.".to_string()),
                prompt,
            )
            .await?;
        Ok(StageOutcome::Complete(vec![(
            names::SEASON_PLAN.to_string(),
            plan,
        )]))
    }
}
