//! Concrete stage variants and graph assembly.
//!
//! Stage names double as progress identifiers; artifact names are the fixed
//! logical namespace from [`crate::artifact::names`].

use std::sync::Arc;

use crate::artifact::names;
use crate::error::Result;
use crate::telemetry::TelemetryClient;
use crate::workflow::{Stage, StageGraph};

mod expert;
mod extractor;
mod formatter;
mod integrator;
mod season;
mod summarizer;
mod synthesizer;
mod weekly;

pub use expert::ExpertAnalyzer;
pub use extractor::{Extractor, ExtractorParams};
pub use formatter::{Formatter, ReportKind};
pub use integrator::DataIntegrator;
pub use season::SeasonPlanner;
pub use summarizer::Summarizer;
pub use synthesizer::Synthesizer;
pub use weekly::WeeklyPlanner;

/// Telemetry domains fanned out across summarizers and experts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Metrics,
    Physiology,
    Activity,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Metrics, Domain::Physiology, Domain::Activity];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metrics => "metrics",
            Self::Physiology => "physiology",
            Self::Activity => "activity",
        }
    }

    pub fn summary_artifact(&self) -> &'static str {
        match self {
            Self::Metrics => names::METRICS_SUMMARY,
            Self::Physiology => names::PHYSIOLOGY_SUMMARY,
            Self::Activity => names::ACTIVITY_SUMMARY,
        }
    }

    pub fn result_artifact(&self) -> &'static str {
        match self {
            Self::Metrics => names::METRICS_RESULT,
            Self::Physiology => names::PHYSIOLOGY_RESULT,
            Self::Activity => names::ACTIVITY_RESULT,
        }
    }
}

/// The full graph: extraction, three-way summarize/analyze fan-out,
/// synthesis with the interrupt gate, season and weekly planning, and both
/// report formatters.
pub fn full_graph(
    telemetry: Arc<dyn TelemetryClient>,
    params: ExtractorParams,
) -> Result<StageGraph> {
    let mut stages: Vec<Arc<dyn Stage>> = vec![Arc::new(Extractor::new(telemetry, params))];
    for domain in Domain::ALL {
        stages.push(Arc::new(Summarizer::new(domain)));
        stages.push(Arc::new(ExpertAnalyzer::new(domain)));
    }
    stages.push(Arc::new(Synthesizer::new()));
    stages.push(Arc::new(SeasonPlanner::new()));
    stages.push(Arc::new(Formatter::new(ReportKind::Analysis)));
    stages.push(Arc::new(DataIntegrator::new()));
    stages.push(Arc::new(WeeklyPlanner::new()));
    stages.push(Arc::new(Formatter::new(ReportKind::Plan)));

    StageGraph::new(stages, &[])
}

/// The update subgraph: the three-stage chain only. Prior analysis and the
/// fresh short-window telemetry arrive as initial artifacts.
pub fn update_graph() -> Result<StageGraph> {
    let stages: Vec<Arc<dyn Stage>> = vec![
        Arc::new(DataIntegrator::new()),
        Arc::new(WeeklyPlanner::new()),
        Arc::new(Formatter::new(ReportKind::Plan)),
    ];

    StageGraph::new(
        stages,
        &[
            names::TELEMETRY_CONTEXT,
            names::METRICS_RESULT,
            names::PHYSIOLOGY_RESULT,
            names::ACTIVITY_RESULT,
            names::SEASON_PLAN,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoachError;
    use crate::telemetry::{ExtractionWindow, TelemetrySnapshot};
    use crate::workflow::Stage;
    use async_trait::async_trait;

    struct NoTelemetry;

    #[async_trait]
    impl TelemetryClient for NoTelemetry {
        async fn extract(&self, _window: ExtractionWindow) -> crate::error::Result<TelemetrySnapshot> {
            Err(CoachError::storage("unused in graph-shape tests"))
        }
    }

    fn params() -> ExtractorParams {
        ExtractorParams {
            window: ExtractionWindow::new(7, 14),
            recent_window_days: 14,
            trends_window_days: 180,
            as_of: "2026-08-07".parse().unwrap(),
        }
    }

    #[test]
    fn full_graph_validates_and_has_all_stages() {
        let graph = full_graph(Arc::new(NoTelemetry), params()).unwrap();
        assert_eq!(graph.len(), 13);
        assert!(graph.stage("synthesizer").unwrap().interruptible());
    }

    #[test]
    fn update_graph_is_the_three_stage_chain() {
        let graph = update_graph().unwrap();
        let names: Vec<&str> = graph.stages().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["data_integrator", "weekly_planner", "plan_formatter"]);
    }

    #[test]
    fn update_graph_contains_no_interruptible_stage() {
        let graph = update_graph().unwrap();
        assert!(graph.stages().iter().all(|s| !s.interruptible()));
    }
}
