use clap::Parser;
use repo_bootstrap::cli::Cli;
use repo_bootstrap::{commands, ui};
use std::process::ExitCode;

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing; logs go to stderr so stdout stays the report
    let default_filter = if cli.verbose {
        "repo_bootstrap=debug"
    } else {
        "repo_bootstrap=warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    // Execute command
    match commands::execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            ui::error(format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}
