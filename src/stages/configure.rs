use anyhow::Result;
use tracing::{debug, info};

use crate::config::Setting;
use crate::repository::Repository;

/// Settings enabled together when the filesystem supports the untracked cache.
const UNTRACKED_CACHE_PAIR: [(&str, &str); 2] =
    [("core.untrackedCache", "true"), ("feature.manyFiles", "true")];

/// Result of the configuration stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedSettings {
    pub settings: Vec<Setting>,
    pub untracked_cache: bool,
}

/// Install the git-lfs hooks and filters for this repository only.
pub fn install_lfs(repo: &Repository) -> Result<()> {
    repo.run(["lfs", "install", "--local", "--force"])
}

/// Apply `settings` to the local repository configuration, in order.
///
/// Each setting is its own `git config --local` call and any failure aborts
/// the run. With `untracked_cache` enabled, `git update-index
/// --test-untracked-cache` decides whether `core.untrackedCache` and
/// `feature.manyFiles` are applied, both or neither.
pub fn apply(
    repo: &Repository,
    settings: &[Setting],
    untracked_cache: bool,
) -> Result<AppliedSettings> {
    let mut applied = Vec::with_capacity(settings.len() + UNTRACKED_CACHE_PAIR.len());

    for setting in settings {
        debug!(key = %setting.key, value = %setting.value, "setting");
        repo.set_local_config(&setting.key, &setting.value)?;
        applied.push(setting.clone());
    }

    let cache_supported = untracked_cache && probe_untracked_cache(repo)?;
    if cache_supported {
        for (key, value) in UNTRACKED_CACHE_PAIR {
            repo.set_local_config(key, value)?;
            applied.push(Setting::new(key, value));
        }
    }

    info!(count = applied.len(), untracked_cache = cache_supported, "local settings applied");
    Ok(AppliedSettings {
        settings: applied,
        untracked_cache: cache_supported,
    })
}

fn probe_untracked_cache(repo: &Repository) -> Result<bool> {
    let supported = repo.probe(["update-index", "--test-untracked-cache"])?;
    debug!(supported, "untracked cache probe");
    Ok(supported)
}
