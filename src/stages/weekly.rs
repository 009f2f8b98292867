//! Weekly planning: the near-term plan from the integrated context, the
//! expert analyses, and the athlete's progress note.

use async_trait::async_trait;

use crate::artifact::names;
use crate::error::Result;
use crate::reasoning::StageRole;
use crate::workflow::{Stage, StageContext, StageOutcome};

pub struct WeeklyPlanner;

impl WeeklyPlanner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WeeklyPlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for WeeklyPlanner {
    fn name(&self) -> &str {
        "weekly_planner"
    }

    fn inputs(&self) -> Vec<String> {
        vec![
            names::INTEGRATED_CONTEXT.to_string(),
            names::METRICS_RESULT.to_string(),
            names::PHYSIOLOGY_RESULT.to_string(),
            names::ACTIVITY_RESULT.to_string(),
        ]
    }

    fn outputs(&self) -> Vec<String> {
        vec![names::WEEKLY_PLAN.to_string()]
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutcome> {
        let env = ctx.env();
        let mut prompt = format!(
            "Athlete: {}\nPlanning context: {}\n\n\
             Integrated context:\n{}\n\n\
             Expert findings:\n\
             metrics_result: {}\n\
             physiology_result: {}\n\
             activity_result: {}\n",
            env.athlete,
            env.planning_context,
            ctx.input(names::INTEGRATED_CONTEXT)?,
            ctx.input(names::METRICS_RESULT)?,
            ctx.input(names::PHYSIOLOGY_RESULT)?,
            ctx.input(names::ACTIVITY_RESULT)?,
        );
        if let Some(note) = &env.progress_note {
            prompt.push_str(&format!(
                "\nProgress update from the athlete (last {} days):\n{}\n",
                note.window_days, note.body
            ));
        }
        prompt.push_str(
            "\nWrite the coming week's training plan, day by day, consistent \
             with the season plan phase and the recovery signals above.",
        );

        let plan = ctx
            .reason(
                StageRole::WeeklyPlanner,
                Some("You are a week-by-week workout planner for endurance athletes.".to_string()),
                prompt,
            )
            .await?;
        Ok(StageOutcome::Complete(vec![(
            names::WEEKLY_PLAN.to_string(),
            plan,
        )]))
    }
}
