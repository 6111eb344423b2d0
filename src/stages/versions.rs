use anyhow::{Context, Result};
use std::io;
use tracing::info;

use crate::config::Requirements;
use crate::error::BootstrapError;
use crate::repository::Repository;
use crate::version::ToolVersion;

/// Installed versions that passed the minimum-version gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolVersions {
    pub git: ToolVersion,
    pub git_lfs: ToolVersion,
}

/// Verify git and git-lfs are installed at or above the required versions.
///
/// Always fatal on failure: later stages depend on behaviour only present at
/// these versions.
pub fn check(repo: &Repository, requirements: &Requirements) -> Result<ToolVersions> {
    let git = tool_version(repo, "git", &["--version"], requirements.git)?;
    let git_lfs = tool_version(repo, "git-lfs", &["lfs", "version"], requirements.git_lfs)?;

    info!(%git, %git_lfs, "tool versions satisfied");
    Ok(ToolVersions { git, git_lfs })
}

fn tool_version(
    repo: &Repository,
    tool: &str,
    args: &[&str],
    minimum: ToolVersion,
) -> Result<ToolVersion> {
    let invocation = repo.git(args.iter().copied());
    let missing = || BootstrapError::ToolMissing {
        tool: tool.to_string(),
        minimum,
    };

    let output = match repo.runner().capture(&invocation) {
        Ok(output) => output,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(missing().into()),
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to run `{invocation}`"));
        }
    };

    // `git lfs` without the extension installed exits nonzero
    if !output.success() {
        return Err(missing().into());
    }

    let found = ToolVersion::find(&output.stdout).ok_or_else(|| {
        BootstrapError::UnparsableVersion {
            command: invocation.command_line(),
            output: output.stdout.trim().to_string(),
        }
    })?;

    if !found.satisfies(&minimum) {
        return Err(BootstrapError::ToolOutdated {
            tool: tool.to_string(),
            found,
            minimum,
        }
        .into());
    }

    Ok(found)
}
