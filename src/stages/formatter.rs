//! Report formatting: turns raw synthesis or weekly-plan text into the
//! human-facing report artifacts.

use async_trait::async_trait;

use crate::artifact::names;
use crate::error::Result;
use crate::reasoning::StageRole;
use crate::workflow::{Stage, StageContext, StageOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// `analysis_report` from the synthesis, full graph only.
    Analysis,
    /// `plan_report` from the weekly plan, both graph variants.
    Plan,
}

pub struct Formatter {
    kind: ReportKind,
}

impl Formatter {
    pub fn new(kind: ReportKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl Stage for Formatter {
    fn name(&self) -> &str {
        match self.kind {
            ReportKind::Analysis => "analysis_formatter",
            ReportKind::Plan => "plan_formatter",
        }
    }

    fn inputs(&self) -> Vec<String> {
        match self.kind {
            ReportKind::Analysis => vec![names::SYNTHESIS_RESULT.to_string()],
            ReportKind::Plan => vec![names::WEEKLY_PLAN.to_string()],
        }
    }

    fn outputs(&self) -> Vec<String> {
        match self.kind {
            ReportKind::Analysis => vec![names::ANALYSIS_REPORT.to_string()],
            ReportKind::Plan => vec![names::PLAN_REPORT.to_string()],
        }
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutcome> {
        let (input_name, output_name, shape) = match self.kind {
            ReportKind::Analysis => (
                names::SYNTHESIS_RESULT,
                names::ANALYSIS_REPORT,
                "a training analysis report",
            ),
            ReportKind::Plan => (
                names::WEEKLY_PLAN,
                names::PLAN_REPORT,
                "a weekly training plan document",
            ),
        };

        let prompt = format!(
            "Format the following content for {} as {shape} in clean Markdown \
             with clear section headings. Preserve every recommendation \
             verbatim; change presentation only.\n\n{}",
            ctx.env().athlete,
            ctx.input(input_name)?,
        );
        let report = ctx.reason(StageRole::Formatter, None, prompt).await?;
        Ok(StageOutcome::Complete(vec![(
            output_name.to_string(),
            report,
        )]))
    }
}
