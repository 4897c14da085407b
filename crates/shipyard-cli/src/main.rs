//! Shipyard - deployment orchestrator
//!
//! Usage:
//!   shipyard deploy           # build, converge, roll out, verify
//!   shipyard build            # build and push images only
//!   shipyard infrastructure   # converge the stack only
//!   shipyard application      # force a rolling update of both services
//!   shipyard health           # probe the public entry point (needs a settled stack)
//!   shipyard info             # show the target and current stack state

mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shipyard_core::prelude::*;

#[derive(Parser)]
#[command(name = "shipyard")]
#[command(about = "Build, provision and roll out the blog application", long_about = None)]
struct Cli {
    /// Path to shipyard.toml (default: ./shipyard.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Deployment environment (overrides ENVIRONMENT)
    #[arg(long, global = true)]
    environment: Option<String>,

    /// AWS region (overrides AWS_REGION)
    #[arg(long, global = true)]
    region: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Run every stage: build, infrastructure, application, health
    Deploy,
    /// Build and publish container images
    Build,
    /// Create or update the infrastructure stack
    Infrastructure,
    /// Trigger a rolling update of both services
    Application,
    /// Probe the application's health endpoints
    Health,
    /// Show deployment target, image names and stack state
    Info,
}

impl Commands {
    fn stages(self) -> &'static [Stage] {
        match self {
            Commands::Deploy => &Stage::ALL,
            Commands::Build => &[Stage::Build],
            Commands::Infrastructure => &[Stage::Infrastructure],
            Commands::Application => &[Stage::Application],
            Commands::Health => &[Stage::Health],
            Commands::Info => &[],
        }
    }
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable summary
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

fn main() {
    // Logs go to stderr; stdout carries only the report.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shipyard=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let format = cli.format;

    let code = match run(cli) {
        Ok(outcome) => outcome.exit_code(),
        Err(err) => render::print_error(&err, format),
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> anyhow::Result<Outcome> {
    let overrides = SettingsOverrides {
        environment: cli.environment,
        region: cli.region,
    };
    let context = DeployContext::from_environment(cli.config, overrides)?;
    let pipeline = context.pipeline();

    if let Commands::Info = cli.command {
        let report = pipeline.info()?;
        render::print_info(&report, cli.format)?;
        return Ok(Outcome::Success);
    }

    let stages = cli.command.stages();
    tracing::debug!(
        ?stages,
        project = %context.project_root().display(),
        config = ?context.config_path(),
        "checking prerequisites"
    );
    context.verify_prerequisites(stages)?;
    let report = pipeline.run(stages)?;
    let outcome = report.outcome();
    render::print_pipeline(&report, &outcome, &pipeline.settings().health.scheme, cli.format)?;
    Ok(outcome)
}
