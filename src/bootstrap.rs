use anyhow::Result;
use chrono::Local;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

use crate::config::BootstrapConfig;
use crate::prompt::Prompter;
use crate::repository::Repository;
use crate::runner::CommandRunner;
use crate::stages::configure::AppliedSettings;
use crate::stages::identity::IdentityOutcome;
use crate::stages::versions::ToolVersions;
use crate::stages::{assets, configure, finalize, guard, identity, versions};
use crate::ui::{self, Progress};

/// Everything a completed run did.
#[derive(Debug, Clone)]
pub struct Summary {
    pub root: PathBuf,
    pub versions: ToolVersions,
    pub branch: String,
    pub identity: IdentityOutcome,
    pub settings: AppliedSettings,
    /// Entries unpacked from the pack archive, `None` when there was none
    pub extracted: Option<usize>,
    pub submodules: bool,
    pub pruned: bool,
    pub elapsed: Duration,
}

/// Result of the read-only preflight.
#[derive(Debug, Clone)]
pub struct Preflight {
    pub root: PathBuf,
    pub versions: ToolVersions,
    pub branch: String,
}

/// Runs the bootstrap stages front to back.
///
/// There is no resume and no rollback. A failure aborts at once, and since
/// the reset/clean stage re-establishes a known baseline, the recovery is
/// to run again from the start.
pub struct Bootstrapper<'a> {
    runner: &'a dyn CommandRunner,
    prompter: &'a mut dyn Prompter,
    config: &'a BootstrapConfig,
}

impl<'a> Bootstrapper<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        prompter: &'a mut dyn Prompter,
        config: &'a BootstrapConfig,
    ) -> Self {
        Self {
            runner,
            prompter,
            config,
        }
    }

    pub fn run(&mut self, start: &Path) -> Result<Summary> {
        let started = Instant::now();
        ui::status(
            "Bootstrap",
            format!("started at {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
        );

        let versions = check_versions(self.runner, self.config, start)?;
        let repo = Repository::discover(start, self.runner)?;
        info!(root = %repo.root().display(), "bootstrapping");

        let progress = Progress::new("Identity", "git user.name / user.email");
        let identity = identity::ensure(&repo, &mut *self.prompter)?;
        progress.success("Identity", None);

        let progress = Progress::new("Guarding", "working tree");
        let branch = guard::verify_branch(&repo, &self.config.branch_marker)?;
        guard::reset_and_clean(&repo)?;
        progress.success("Reset", Some(format!("on {branch}")));

        let progress = Progress::new("Configuring", "local repository settings");
        configure::install_lfs(&repo)?;
        let settings = configure::apply(&repo, &self.config.settings, self.config.untracked_cache)?;
        let detail = if settings.untracked_cache {
            format!("({} settings, untracked cache on)", settings.settings.len())
        } else {
            format!("({} settings, untracked cache off)", settings.settings.len())
        };
        progress.success("Configured", Some(detail));

        let progress = Progress::new("Assets", "LFS pack archive");
        let extracted = assets::materialize(&repo, &self.config.assets)?;
        match extracted {
            Some(count) => progress.success("Extracted", Some(format!("({count} entries)"))),
            None => progress.skip(format!("{} not present", self.config.assets.archive.display())),
        }

        let progress = Progress::new("Checkout", self.config.default_branch.clone());
        finalize::checkout(&repo, &self.config.default_branch)?;
        progress.success("Checked out", None);

        let progress = Progress::new("Submodules", "recursive init");
        let submodules = finalize::init_submodules(&repo)?;
        if submodules {
            progress.success("Submodules", None);
        } else {
            progress.skip("no .gitmodules");
        }

        let progress = Progress::new("Pruning", "cached LFS objects");
        let pruned = if self.config.prune.enabled {
            finalize::prune_lfs(&repo)?;
            progress.success("Pruned", None);
            true
        } else {
            progress.skip("disabled in config");
            false
        };

        let elapsed = started.elapsed();
        ui::success(
            "Finished",
            format!("bootstrap in {:.2} seconds", elapsed.as_secs_f64()),
        );

        Ok(Summary {
            root: repo.root().to_path_buf(),
            versions,
            branch,
            identity,
            settings,
            extracted,
            submodules,
            pruned,
            elapsed,
        })
    }
}

/// Version check and branch guard only; changes nothing.
pub fn preflight(
    runner: &dyn CommandRunner,
    config: &BootstrapConfig,
    start: &Path,
) -> Result<Preflight> {
    let versions = check_versions(runner, config, start)?;
    let repo = Repository::discover(start, runner)?;
    let branch = guard::verify_branch(&repo, &config.branch_marker)?;
    ui::success("Branch", format!("{branch} (contains '{}')", config.branch_marker));

    Ok(Preflight {
        root: repo.root().to_path_buf(),
        versions,
        branch,
    })
}

// Runs before the repository root is known, so it uses the start directory
fn check_versions(
    runner: &dyn CommandRunner,
    config: &BootstrapConfig,
    start: &Path,
) -> Result<ToolVersions> {
    let progress = Progress::new("Checking", "git and git-lfs versions");
    let here = Repository::new(start, runner);
    let found = versions::check(&here, &config.requirements)?;
    progress.success(
        "Checked",
        Some(format!("(git {}, git-lfs {})", found.git, found.git_lfs)),
    );
    Ok(found)
}
