use anyhow::{bail, Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::BootstrapError;
use crate::runner::{CommandOutput, CommandRunner, Invocation};

/// Handle on the repository being bootstrapped
///
/// Holds the repository's top-level directory and the runner used to talk to
/// git. Every stage takes this handle explicitly instead of relying on the
/// process working directory.
pub struct Repository<'r> {
    root: PathBuf,
    runner: &'r dyn CommandRunner,
}

impl fmt::Debug for Repository<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository").field("root", &self.root).finish()
    }
}

impl<'r> Repository<'r> {
    pub fn new(root: impl Into<PathBuf>, runner: &'r dyn CommandRunner) -> Self {
        Self {
            root: root.into(),
            runner,
        }
    }

    /// Resolve the top-level directory of the repository containing `start`.
    pub fn discover(start: &Path, runner: &'r dyn CommandRunner) -> Result<Self> {
        let invocation = Invocation::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(start);
        let output = runner
            .capture(&invocation)
            .with_context(|| format!("Failed to run `{invocation}` in {start:?}"))?;

        let root = output.stdout.trim();
        if !output.success() || root.is_empty() {
            return Err(BootstrapError::NotARepository {
                path: start.to_path_buf(),
            }
            .into());
        }

        debug!(root, "discovered repository");
        Ok(Self::new(root, runner))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn runner(&self) -> &'r dyn CommandRunner {
        self.runner
    }

    /// Resolve a repository-relative path.
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// Build a `git` invocation rooted at the repository top level.
    pub fn git<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation::new("git").args(args).current_dir(&self.root)
    }

    /// Run a git command that must succeed.
    pub fn run<I, S>(&self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let invocation = self.git(args);
        let code = self
            .runner
            .status(&invocation)
            .with_context(|| format!("Failed to run `{invocation}`"))?;
        ensure_success(&invocation, code, String::new())
    }

    /// Run a git command and capture its output; a nonzero exit is not an error.
    pub fn read<I, S>(&self, args: I) -> Result<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let invocation = self.git(args);
        self.runner
            .capture(&invocation)
            .with_context(|| format!("Failed to run `{invocation}`"))
    }

    /// Run a git command that must succeed, passing each stdout line to `on_line`.
    pub fn stream<I, S>(&self, args: I, on_line: &mut dyn FnMut(&str)) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let invocation = self.git(args);
        let code = self
            .runner
            .stream(&invocation, on_line)
            .with_context(|| format!("Failed to run `{invocation}`"))?;
        ensure_success(&invocation, code, String::new())
    }

    /// Run a git command whose exit code is the answer to a yes/no question.
    pub fn probe<I, S>(&self, args: I) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(self.read(args)?.success())
    }

    /// Resolve a path inside the git directory, following a `.git` file in
    /// linked worktrees and submodule checkouts.
    pub fn git_path(&self, name: &str) -> Result<PathBuf> {
        let invocation = self.git(["rev-parse", "--git-path", name]);
        let output = self
            .runner
            .capture(&invocation)
            .with_context(|| format!("Failed to run `{invocation}`"))?;
        ensure_success(&invocation, output.code, output.stderr)?;

        let resolved = output.stdout.trim();
        if resolved.is_empty() {
            bail!("`{invocation}` printed no path");
        }
        // Relative answers are relative to the working directory, the root
        Ok(self.path(resolved))
    }

    pub fn current_branch(&self) -> Result<String> {
        let invocation = self.git(["rev-parse", "--abbrev-ref", "HEAD"]);
        let output = self
            .runner
            .capture(&invocation)
            .with_context(|| format!("Failed to run `{invocation}`"))?;
        ensure_success(&invocation, output.code, output.stderr)?;
        Ok(output.stdout.trim().to_string())
    }

    /// Read a global git setting; `None` when unset or blank.
    pub fn global_config(&self, key: &str) -> Result<Option<String>> {
        self.get_config("--global", key)
    }

    #[cfg(test)]
    pub(crate) fn local_config(&self, key: &str) -> Result<Option<String>> {
        self.get_config("--local", key)
    }

    pub fn set_global_config(&self, key: &str, value: &str) -> Result<()> {
        self.set_config("--global", key, value)
    }

    pub fn set_local_config(&self, key: &str, value: &str) -> Result<()> {
        self.set_config("--local", key, value)
    }

    fn get_config(&self, scope: &str, key: &str) -> Result<Option<String>> {
        let invocation = self.git(["config", scope, "--get", key]);
        let output = self
            .runner
            .capture(&invocation)
            .with_context(|| format!("Failed to run `{invocation}`"))?;

        // git config exits 1 when the key is not set
        match output.code {
            0 => {
                let value = output.stdout.trim();
                Ok((!value.is_empty()).then(|| value.to_string()))
            }
            1 => Ok(None),
            code => ensure_success(&invocation, code, output.stderr).map(|_| None),
        }
    }

    fn set_config(&self, scope: &str, key: &str, value: &str) -> Result<()> {
        let invocation = self.git(["config", scope, key, value]);
        let output = self
            .runner
            .capture(&invocation)
            .with_context(|| format!("Failed to run `{invocation}`"))?;
        ensure_success(&invocation, output.code, output.stderr)
    }
}

fn ensure_success(invocation: &Invocation, code: i32, stderr: String) -> Result<()> {
    if code == 0 {
        return Ok(());
    }

    Err(BootstrapError::CommandFailed {
        command: invocation.command_line(),
        code,
        stderr,
    }
    .into())
}
