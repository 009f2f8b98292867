//! Explicit, statically declared stage graph.
//!
//! Edges are derived from declared artifact names, checked at construction:
//! no input may reference an artifact nothing produces, no two stages may
//! produce the same artifact, and the result must be acyclic.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::{CoachError, Result};

use super::stage::Stage;

pub struct StageGraph {
    stages: Vec<Arc<dyn Stage>>,
    initial_artifacts: BTreeSet<String>,
}

impl std::fmt::Debug for StageGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageGraph")
            .field(
                "stages",
                &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("initial_artifacts", &self.initial_artifacts)
            .finish()
    }
}

impl StageGraph {
    /// Validate and build. `initial_artifacts` are names materialized by the
    /// caller before execution (fresh telemetry and reusable prior analysis
    /// in update mode).
    pub fn new(stages: Vec<Arc<dyn Stage>>, initial_artifacts: &[&str]) -> Result<Self> {
        let initial: BTreeSet<String> = initial_artifacts.iter().map(|s| s.to_string()).collect();

        let mut producers: HashMap<String, String> = HashMap::new();
        let mut names: BTreeSet<String> = BTreeSet::new();
        for stage in &stages {
            if !names.insert(stage.name().to_string()) {
                return Err(CoachError::graph(format!(
                    "duplicate stage name '{}'",
                    stage.name()
                )));
            }
            for output in stage.outputs() {
                if initial.contains(&output) {
                    return Err(CoachError::graph(format!(
                        "stage '{}' produces '{}', which is already an initial artifact",
                        stage.name(),
                        output
                    )));
                }
                if let Some(previous) = producers.insert(output.clone(), stage.name().to_string()) {
                    return Err(CoachError::graph(format!(
                        "artifact '{output}' produced by both '{previous}' and '{}'",
                        stage.name()
                    )));
                }
            }
        }

        for stage in &stages {
            for input in stage.inputs() {
                if !producers.contains_key(&input) && !initial.contains(&input) {
                    return Err(CoachError::graph(format!(
                        "stage '{}' consumes undeclared artifact '{input}'",
                        stage.name()
                    )));
                }
            }
        }

        // Cycle check over stage-to-stage edges.
        let mut dag: DiGraph<&str, ()> = DiGraph::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();
        for stage in &stages {
            index.insert(stage.name(), dag.add_node(stage.name()));
        }
        for stage in &stages {
            for input in stage.inputs() {
                if let Some(producer) = producers.get(&input) {
                    dag.add_edge(index[producer.as_str()], index[stage.name()], ());
                }
            }
        }
        toposort(&dag, None).map_err(|cycle| {
            CoachError::graph(format!(
                "dependency cycle through stage '{}'",
                dag[cycle.node_id()]
            ))
        })?;

        Ok(Self {
            stages,
            initial_artifacts: initial,
        })
    }

    pub fn stages(&self) -> &[Arc<dyn Stage>] {
        &self.stages
    }

    pub fn stage(&self, name: &str) -> Option<&Arc<dyn Stage>> {
        self.stages.iter().find(|s| s.name() == name)
    }

    pub fn initial_artifacts(&self) -> &BTreeSet<String> {
        &self.initial_artifacts
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// The next parallel group: every not-yet-completed stage whose inputs
    /// are all materialized. Sorted by stage name so group composition is
    /// deterministic.
    pub fn ready_group(
        &self,
        materialized: &BTreeMap<String, String>,
        completed: &BTreeSet<String>,
    ) -> Vec<Arc<dyn Stage>> {
        let mut ready: Vec<Arc<dyn Stage>> = self
            .stages
            .iter()
            .filter(|stage| !completed.contains(stage.name()))
            .filter(|stage| {
                stage
                    .inputs()
                    .iter()
                    .all(|input| materialized.contains_key(input))
            })
            .cloned()
            .collect();
        ready.sort_by(|a, b| a.name().cmp(b.name()));
        ready
    }
}
