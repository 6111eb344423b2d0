use anyhow::Result;
use tracing::info;

use crate::error::BootstrapError;
use crate::repository::Repository;
use crate::ui;

/// Require the checked-out branch name to contain `marker`.
pub fn verify_branch(repo: &Repository, marker: &str) -> Result<String> {
    let branch = repo.current_branch()?;
    if !branch.contains(marker) {
        return Err(BootstrapError::WrongBranch {
            branch,
            marker: marker.to_string(),
        }
        .into());
    }
    Ok(branch)
}

/// Discard every local modification, untracked file and ignored file.
///
/// Destructive on purpose: this is what makes a re-run after an abort start
/// from the same baseline.
pub fn reset_and_clean(repo: &Repository) -> Result<()> {
    ui::warn(format!(
        "Discarding local changes and untracked files in {}",
        repo.root().display()
    ));
    repo.run(["reset", "--hard", "HEAD"])?;
    // Doubled -f also removes nested repositories left by aborted submodule setup
    repo.run(["clean", "-ffdx"])?;
    info!(root = %repo.root().display(), "working tree reset");
    Ok(())
}
