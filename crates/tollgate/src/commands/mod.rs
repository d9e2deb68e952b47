//! CLI command handlers.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use tollgate_config::LoadedConfig;

pub mod check;
pub mod config;
pub mod instances;
pub mod merge;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration and the layers it came from.
    pub config: LoadedConfig,
    /// Instance database path.
    pub db_path: PathBuf,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

/// Read a YAML document from a file, or stdin when the path is `-`.
pub fn read_document(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        return std::io::read_to_string(std::io::stdin()).context("failed to read stdin");
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
