use crate::cli::{Cli, Commands};
use crate::BootstrapConfig;
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use tracing::debug;

mod check;
mod run;

pub fn execute(cli: Cli) -> Result<()> {
    // Resolve where the run starts - this is the root entry point
    let start = match cli.directory {
        Some(dir) => dir,
        None => env::current_dir().context("Failed to determine the current directory")?,
    };
    let start = absolute(start)?;

    let (config, source) = BootstrapConfig::locate(&start, cli.config.as_deref())?;
    match &source {
        Some(path) => debug!(path = %path.display(), "loaded config"),
        None => debug!("using built-in config"),
    }

    match cli.command {
        None => run::execute(&start, &config),
        Some(Commands::Check) => check::execute(&start, &config),
    }
}

fn absolute(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = env::current_dir().context("Failed to determine the current directory")?;
    Ok(cwd.join(path))
}
