//! Mode selection: full regeneration vs the lightweight update chain.

use tracing::debug;

use crate::artifact::ArtifactStore;
use crate::error::{CoachError, Result};

use super::RunMode;

/// Choose the graph variant for a run.
///
/// Without the update flag the full graph runs unconditionally. With it, the
/// store must already hold every reusable artifact from a prior full run;
/// otherwise the run fails fast here, before any stage executes, rather than
/// degrading to guessing missing analysis.
pub async fn select_mode(update_plan: bool, store: &dyn ArtifactStore) -> Result<RunMode> {
    if !update_plan {
        return Ok(RunMode::Full);
    }

    let missing = store.missing_reusable().await?;
    if missing.is_empty() {
        debug!("prior analysis artifacts present, selecting update subgraph");
        Ok(RunMode::Update)
    } else {
        Err(CoachError::MissingPrerequisites { missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactStore, MemoryArtifactStore, REUSABLE_ARTIFACTS};
    use uuid::Uuid;

    #[tokio::test]
    async fn full_mode_needs_no_preconditions() {
        let store = MemoryArtifactStore::new();
        assert_eq!(select_mode(false, &store).await.unwrap(), RunMode::Full);
    }

    #[tokio::test]
    async fn update_mode_fails_fast_without_prior_analysis() {
        let store = MemoryArtifactStore::new();
        let err = select_mode(true, &store).await.unwrap_err();
        match err {
            CoachError::MissingPrerequisites { missing } => {
                assert_eq!(missing.len(), 4);
            }
            other => panic!("expected precondition error, got {other}"),
        }
    }

    #[tokio::test]
    async fn update_mode_selected_when_all_reusables_present() {
        let store = MemoryArtifactStore::new();
        let run = Uuid::new_v4();
        for name in REUSABLE_ARTIFACTS {
            store.put(name, "prior analysis", run).await.unwrap();
        }
        assert_eq!(select_mode(true, &store).await.unwrap(), RunMode::Update);
    }

    #[tokio::test]
    async fn partial_prior_analysis_reports_only_the_missing_names() {
        let store = MemoryArtifactStore::new();
        let run = Uuid::new_v4();
        store.put("metrics_result", "m", run).await.unwrap();
        store.put("season_plan", "s", run).await.unwrap();

        let err = select_mode(true, &store).await.unwrap_err();
        match err {
            CoachError::MissingPrerequisites { missing } => {
                assert_eq!(missing, vec!["activity_result", "physiology_result"]);
            }
            other => panic!("expected precondition error, got {other}"),
        }
    }
}
