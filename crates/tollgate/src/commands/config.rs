//! Config command - configuration management.

use anyhow::Result;
use clap::{Args, Subcommand};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show resolved configuration and where it came from
    Show,

    /// Write a config file with the default wait settings
    Init {
        /// Create project-local config (./tollgate.toml) instead of user config
        #[arg(long)]
        local: bool,
    },

    /// Show configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Init { local } => cmd_init(local),
        ConfigCommand::Path => cmd_path(),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = &ctx.config;
    let wait = loaded.config.wait_or_default();

    if ctx.json_output {
        let report = serde_json::json!({
            "sources": loaded.loaded_from(),
            "database": ctx.db_path,
            "wait": wait,
            "warnings": loaded.warnings,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("# Tollgate Configuration\n");

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    println!("Database: {}", ctx.db_path.display());
    println!();
    println!("Wait:");
    println!("  default timeout:    {}s", wait.default_timeout_secs);
    println!("  max retries:        {}", wait.max_retries);
    println!("  retry backoff:      {}ms", wait.retry_backoff_ms);
    println!("  resume concurrency: {}", wait.resume_concurrency);

    for warning in &loaded.warnings {
        println!();
        println!("warning: {warning}");
    }
    Ok(())
}

fn cmd_init(local: bool) -> Result<()> {
    let path = if local {
        std::path::PathBuf::from("tollgate.toml")
    } else {
        tollgate_config::xdg_config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
    };

    if path.exists() {
        println!("Config file already exists: {}", path.display());
        return Ok(());
    }

    let config = tollgate_config::TollgateConfig {
        wait: Some(tollgate_config::WaitSection::default()),
        ..Default::default()
    };
    tollgate_config::save_config(&config, &path)?;
    println!("Created {}", path.display());
    Ok(())
}

fn cmd_path() -> Result<()> {
    match tollgate_config::xdg_config_path() {
        Some(path) => println!("{}", path.display()),
        None => println!("Could not determine config directory"),
    }
    Ok(())
}
