//! RouteQA CLI - Main Entry Point
//!
//! Runs the QA verification pipeline against a configured environment:
//! route testing, console capture, heuristic verification, report
//! bundling, memory anchoring, and governance logging.

use clap::Parser;
use routeqa_common::config::RunConfig;
use std::path::PathBuf;

mod output;
mod pipeline;

/// RouteQA - headless-browser route verification pipeline
#[derive(Parser)]
#[command(name = "routeqa")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the run configuration document
    #[arg(short, long, default_value = "routeqa.yaml")]
    config: PathBuf,

    /// Environment to test against
    #[arg(short, long, default_value = "development", env = "ROUTEQA_ENV")]
    environment: String,

    /// Branch label stamped into reports and anchors
    #[arg(short, long, default_value = "local", env = "ROUTEQA_BRANCH")]
    branch: String,

    /// Skip memory anchoring
    #[arg(long)]
    no_memory: bool,

    /// Skip governance logging
    #[arg(long)]
    no_governance: bool,

    /// Print a commented starter configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    if cli.print_config {
        print!("{}", RunConfig::default_document());
        return Ok(());
    }

    let options = pipeline::PipelineOptions {
        config_path: cli.config,
        environment: cli.environment,
        branch_label: cli.branch,
        memory_enabled: !cli.no_memory,
        governance_enabled: !cli.no_governance,
    };

    let success = pipeline::run(&options).await;
    if !success {
        std::process::exit(1);
    }
    Ok(())
}
