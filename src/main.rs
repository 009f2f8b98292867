use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, error};

/// AI endurance-training coach
#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Orchestrates telemetry analysis and training-plan generation", long_about = None)]
#[command(group(clap::ArgGroup::new("entry").required(true).args(["config", "init_config"])))]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to configuration file (YAML or JSON)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Create a configuration template file instead of running
    #[arg(long)]
    init_config: Option<PathBuf>,

    /// Run the lightweight weekly plan update (requires a prior full run)
    #[arg(long)]
    update_plan: bool,

    /// Override the output directory from the config
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    debug!("cadence started with verbosity level: {}", cli.verbose);

    let result = if let Some(path) = cli.init_config {
        cadence::cli::init_config(&path)
    } else if let Some(config) = cli.config {
        cadence::cli::run_coach(cadence::cli::CoachCommand {
            config,
            update_plan: cli.update_plan,
            output_dir: cli.output_dir,
        })
        .await
    } else {
        // clap's arg group guarantees one of the two is present.
        unreachable!("clap enforces --config or --init-config")
    };

    if let Err(e) = result {
        error!("run failed: {e}");
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}
