//! Command implementations behind the binary entry point.
//!
//! This layer owns everything the engine deliberately excludes: config file
//! resolution, interactive interrupt answering on stdin, result printing,
//! and exit-code mapping.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::artifact::FsArtifactStore;
use crate::config::{CoachConfig, CONFIG_TEMPLATE};
use crate::engine::CoachEngine;
use crate::error::{CoachError, Result};
use crate::reasoning::HttpReasoningClient;
use crate::telemetry::FileTelemetryClient;
use crate::workflow::{InterruptRequest, InterruptResponse, RunOutcome, RunReport};

pub struct CoachCommand {
    pub config: PathBuf,
    pub update_plan: bool,
    pub output_dir: Option<PathBuf>,
}

/// Write a starter configuration file.
pub fn init_config(path: &PathBuf) -> Result<()> {
    if path.exists() {
        return Err(CoachError::config_at("config file already exists", path));
    }
    std::fs::write(path, CONFIG_TEMPLATE)
        .map_err(|e| CoachError::config_at(format!("failed to write template: {e}"), path))?;
    println!("Config template created: {}", path.display());
    println!("Edit it with your settings, then run: cadence --config {}", path.display());
    Ok(())
}

/// Run a coaching workflow end to end, answering interrupts interactively.
pub async fn run_coach(cmd: CoachCommand) -> Result<()> {
    let mut config = CoachConfig::load(&cmd.config)?;
    if let Some(dir) = cmd.output_dir {
        config.output.directory = dir;
    }

    let api_key = std::env::var(&config.reasoning.api_key_env).map_err(|_| {
        CoachError::config(format!(
            "reasoning API key not found in ${}",
            config.reasoning.api_key_env
        ))
    })?;
    let reasoning = Arc::new(HttpReasoningClient::new(
        config.reasoning.base_url.clone(),
        api_key,
    )?);
    let telemetry = Arc::new(FileTelemetryClient::new(config.telemetry.snapshot.clone()));
    let store = Arc::new(FsArtifactStore::new(config.output.directory.clone()));

    info!(
        athlete = %config.athlete.name,
        output = %config.output.directory.display(),
        update_plan = cmd.update_plan,
        "starting cadence"
    );

    let engine = CoachEngine::new(config, store, telemetry, reasoning);

    match engine.run(cmd.update_plan).await? {
        RunOutcome::Completed(report) => {
            print_report(&report);
            Ok(())
        }
        RunOutcome::Suspended(suspended) => {
            let answers = collect_answers(&suspended.request)?;
            let response = InterruptResponse {
                request_id: suspended.request.id,
                answers,
            };
            match engine.resume(response).await? {
                RunOutcome::Completed(report) => {
                    print_report(&report);
                    Ok(())
                }
                RunOutcome::Suspended(_) => Err(CoachError::interrupt_protocol(
                    "run suspended again after resume",
                )),
            }
        }
    }
}

/// Prompt the athlete for each clarifying question on stdin.
fn collect_answers(request: &InterruptRequest) -> Result<Vec<String>> {
    let stdin = std::io::stdin();
    let mut answers = Vec::with_capacity(request.questions.len());
    println!("\nThe coach needs clarification before finishing the analysis:");
    for question in &request.questions {
        println!("\n  {question}");
        print!("  > ");
        std::io::stdout()
            .flush()
            .map_err(|e| CoachError::storage_with("failed to flush stdout", e))?;
        let mut answer = String::new();
        stdin
            .lock()
            .read_line(&mut answer)
            .map_err(|e| CoachError::storage_with("failed to read answer", e))?;
        answers.push(answer.trim().to_string());
    }
    Ok(answers)
}

fn print_report(report: &RunReport) {
    println!("\nRun {} ({}) succeeded.", report.run.id, report.run.mode.as_str());
    println!("Artifacts written:");
    for name in &report.artifacts_written {
        println!("  - {name}");
    }
    println!(
        "Cost: ${:.4} across {} calls ({} tokens)",
        report.cost.total_cost_usd, report.cost.calls, report.cost.total_units
    );
}
