//! Tollgate - execution-input wait/resume service
//!
//! Main entry point for the Tollgate CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{check, config, instances, merge};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Tollgate - execution input for suspended pipeline nodes
#[derive(Parser)]
#[command(name = "tollgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Instance database (default: from config, else the platform data directory)
    #[arg(long, global = true, env = "TOLLGATE_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge user input into an execution-input template
    Merge(merge::MergeArgs),

    /// Check that required variables were provided
    Check(check::CheckArgs),

    /// Inspect and manage stored execution-input instances
    Instances(instances::InstancesArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

const CONSOLE_FILTER: &str = "tollgate=info,tollgate_input=info,tollgate_config=info,warn";
const VERBOSE_FILTER: &str = "tollgate=debug,tollgate_input=debug,tollgate_config=debug,info";
const FILE_FILTER: &str = "tollgate=trace,tollgate_input=trace,tollgate_config=trace,info";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = tollgate_config::load_config(None)?;
    let logging = loaded.config.logging.clone().unwrap_or_default();

    // Console (human-readable) + rotating file log
    let filter = match (&logging.filter, cli.verbose) {
        (_, true) => VERBOSE_FILTER.to_string(),
        (Some(filter), false) => filter.clone(),
        (None, false) => CONSOLE_FILTER.to_string(),
    };

    let log_dir = logging
        .directory
        .clone()
        .or_else(|| tollgate_config::xdg_config_dir().map(|d| d.join("logs")))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "tollgate.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    let json_file = logging.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking.clone())
            .with_filter(tracing_subscriber::EnvFilter::new(FILE_FILTER))
    });
    let plain_file = (!logging.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(non_blocking.clone())
            .with_filter(tracing_subscriber::EnvFilter::new(FILE_FILTER))
    });
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(json_file)
        .with(plain_file)
        .init();

    for warning in &loaded.warnings {
        tracing::warn!(warning = %warning, "Config layer skipped");
    }

    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(|| loaded.config.database_path());

    // Create context for commands
    let ctx = commands::Context {
        config: loaded,
        db_path,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    // Dispatch to command handlers
    match cli.command {
        Commands::Merge(args) => merge::run(args, &ctx).await,
        Commands::Check(args) => check::run(args, &ctx).await,
        Commands::Instances(args) => instances::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
