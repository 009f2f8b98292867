//! cadence: AI endurance-training coach.
//!
//! Pulls fitness telemetry, runs a graph of reasoning stages over it, and
//! produces human-readable season and weekly plans. The core is the workflow
//! orchestration engine in [`workflow`]: an explicit typed DAG of stages
//! executed as parallel groups, with a suspend/resume interrupt gate, an
//! append-only artifact store with cross-run reuse rules, and per-run cost
//! accounting. A full run regenerates everything; an update run replays only
//! the planning chain against reusable prior analysis.

pub mod artifact;
pub mod cli;
pub mod config;
pub mod cost;
pub mod engine;
pub mod error;
pub mod reasoning;
pub mod stages;
pub mod telemetry;
pub mod workflow;

pub use config::CoachConfig;
pub use engine::CoachEngine;
pub use error::{CoachError, ErrorKind};
