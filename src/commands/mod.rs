// src/commands/mod.rs
//! Command handlers for the vfsport CLI

mod repo;
mod tools;
mod transfer;

pub use repo::{cmd_add, cmd_init, cmd_ls, cmd_publish, cmd_sibling};
pub use tools::{cmd_convert_digest, cmd_translate};
pub use transfer::{cmd_export, cmd_import, cmd_inspect, ExportArgs, ImportArgs};

use anyhow::{Context, Result};
use std::io::IsTerminal;
use std::path::Path;
use vfsport::config::{DEFAULT_CONFIG_FILE, EngineConfig};
use vfsport::progress::{CliProgress, LogProgress, ProgressTracker};

/// Load the engine configuration
///
/// An explicitly named file must exist; the default file is optional.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display())),
        None => Ok(EngineConfig::load_or_default(Path::new(DEFAULT_CONFIG_FILE))?),
    }
}

/// Progress bar on a terminal, log lines otherwise
fn progress_for(operation: &str) -> Box<dyn ProgressTracker> {
    if std::io::stderr().is_terminal() {
        Box::new(CliProgress::new(operation, 0))
    } else {
        Box::new(LogProgress::new(operation, 0))
    }
}
