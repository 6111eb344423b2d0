use anyhow::Result;
use tracing::{debug, info};

use crate::repository::Repository;

/// Settings passed to `git lfs prune` so that nothing is retained for being
/// recent; only objects referenced by the current checkout survive.
const PRUNE_WITHOUT_RETENTION: [&str; 4] = [
    "lfs.fetchrecentrefsdays=0",
    "lfs.fetchrecentremoterefs=false",
    "lfs.fetchrecentcommitsdays=0",
    "lfs.pruneoffsetdays=0",
];

/// Force-checkout `branch`, discarding any remaining local differences.
pub fn checkout(repo: &Repository, branch: &str) -> Result<()> {
    repo.run(["checkout", "--force", branch])?;
    info!(branch, "checked out");
    Ok(())
}

/// Initialise submodules recursively when `.gitmodules` exists.
///
/// The superproject checkout is passed as `--reference` so objects it already
/// has are shared instead of downloaded again. Returns whether anything ran.
pub fn init_submodules(repo: &Repository) -> Result<bool> {
    if !repo.path(".gitmodules").is_file() {
        debug!("no .gitmodules, skipping submodules");
        return Ok(false);
    }

    let reference = repo.root().to_string_lossy().into_owned();
    repo.run([
        "submodule",
        "update",
        "--init",
        "--recursive",
        "--reference",
        reference.as_str(),
    ])?;
    Ok(true)
}

/// Delete every cached LFS object not needed by the current checkout.
pub fn prune_lfs(repo: &Repository) -> Result<()> {
    let mut args = Vec::with_capacity(PRUNE_WITHOUT_RETENTION.len() * 2 + 2);
    for setting in PRUNE_WITHOUT_RETENTION {
        args.push("-c");
        args.push(setting);
    }
    args.extend(["lfs", "prune"]);
    repo.run(args)
}
