//! Synthesis: the synchronization point over the three expert analyses, and
//! the only stage that may raise the interrupt gate.
//!
//! The reasoning call may answer with clarifying questions (lines starting
//! with `CLARIFY:`) when the telemetry is ambiguous. With the gate enabled
//! and no answers yet, those questions suspend the run; the draft response
//! travels in the state token and seeds the resume prompt. On resume the
//! stage always completes.

use async_trait::async_trait;

use crate::artifact::names;
use crate::error::Result;
use crate::reasoning::StageRole;
use crate::workflow::{Stage, StageContext, StageOutcome, SuspendRequest};

pub struct Synthesizer;

impl Synthesizer {
    pub fn new() -> Self {
        Self
    }

    fn base_prompt(&self, ctx: &StageContext) -> Result<String> {
        let metrics = ctx.input(names::METRICS_RESULT)?;
        let physiology = ctx.input(names::PHYSIOLOGY_RESULT)?;
        let activity = ctx.input(names::ACTIVITY_RESULT)?;
        let env = ctx.env();
        Ok(format!(
            "Athlete: {}\nAnalysis context: {}\n\n\
             Expert findings:\n\
             metrics_result: {metrics}\n\
             physiology_result: {physiology}\n\
             activity_result: {activity}\n\n\
             Synthesize these into one coherent training assessment. If the \
             telemetry is too ambiguous to assess confidently, reply with one \
             question per line prefixed `CLARIFY:` instead.",
            env.athlete, env.analysis_context,
        ))
    }
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new()
    }
}

fn clarifications(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| line.trim().strip_prefix("CLARIFY:"))
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect()
}

#[async_trait]
impl Stage for Synthesizer {
    fn name(&self) -> &str {
        "synthesizer"
    }

    fn inputs(&self) -> Vec<String> {
        vec![
            names::METRICS_RESULT.to_string(),
            names::PHYSIOLOGY_RESULT.to_string(),
            names::ACTIVITY_RESULT.to_string(),
        ]
    }

    fn outputs(&self) -> Vec<String> {
        vec![names::SYNTHESIS_RESULT.to_string()]
    }

    fn interruptible(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutcome> {
        let mut prompt = self.base_prompt(ctx)?;

        if let Some(answers) = ctx.answers() {
            // Resume cycle: clarification is spent, force a full synthesis.
            if let Some(draft) = ctx.state_token() {
                prompt.push_str("\n\nEarlier draft response:\n");
                prompt.push_str(draft);
            }
            prompt.push_str("\n\nClarifications supplied by the athlete:\n");
            for answer in answers {
                prompt.push_str(answer);
                prompt.push('\n');
            }
            prompt.push_str("\nClarification is no longer available; produce the synthesis now.");
            let content = ctx
                .reason(StageRole::Synthesis, None, prompt)
                .await?;
            return Ok(StageOutcome::Complete(vec![(
                names::SYNTHESIS_RESULT.to_string(),
                content,
            )]));
        }

        let content = ctx.reason(StageRole::Synthesis, None, prompt).await?;
        let questions = clarifications(&content);
        if ctx.env().hitl_enabled && !questions.is_empty() {
            return Ok(StageOutcome::Suspend(SuspendRequest {
                questions,
                state_token: content,
            }));
        }

        Ok(StageOutcome::Complete(vec![(
            names::SYNTHESIS_RESULT.to_string(),
            content,
        )]))
    }
}
