use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// One-time setup for a git-lfs repository
///
/// Run from a branch whose name contains the bootstrap marker. repo-bootstrap
/// checks git and git-lfs versions, makes sure a git identity is configured,
/// resets and cleans the working tree, applies local settings, unpacks the
/// LFS pack archive when one is checked in, then checks out the default
/// branch and prunes the LFS cache.
///
/// WARNING: uncommitted changes and untracked files are deleted.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run as if started in DIR instead of the current directory
    #[arg(short = 'C', long = "directory", value_name = "DIR", global = true)]
    pub directory: Option<PathBuf>,

    /// Configuration file (defaults to the nearest bootstrap.toml)
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "REPO_BOOTSTRAP_CONFIG",
        global = true
    )]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check tool versions and the current branch without changing anything
    Check,
}
