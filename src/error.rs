use crate::version::ToolVersion;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a bootstrap run.
///
/// Precondition failures (missing or outdated tools, wrong branch) and
/// external command failures are all fatal; callers propagate them with `?`
/// and `main` turns them into exit status 1.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("`{tool}` is not installed or not on PATH; install {tool} {minimum} or newer")]
    ToolMissing { tool: String, minimum: ToolVersion },

    #[error("could not read a version number from `{command}` output: {output:?}")]
    UnparsableVersion { command: String, output: String },

    #[error("{tool} {found} is older than the required {minimum}; upgrade {tool} and re-run")]
    ToolOutdated {
        tool: String,
        found: ToolVersion,
        minimum: ToolVersion,
    },

    #[error("{path:?} is not inside a git repository")]
    NotARepository { path: PathBuf },

    #[error(
        "current branch '{branch}' does not contain '{marker}'; \
         switch to a {marker} branch (for example `git checkout -b {marker}/setup`) and re-run"
    )]
    WrongBranch { branch: String, marker: String },

    #[error("`{command}` failed with exit status {code}{}", format_stderr(.stderr))]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("no {field} entered; a git identity needs both user.name and user.email")]
    EmptyIdentity { field: &'static str },

    #[error("checksum mismatch for {path:?}: expected {expected}, found {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("unsupported archive format for {path:?}; expected .tar, .tar.gz, .tgz, .tar.xz or .txz")]
    UnsupportedArchive { path: PathBuf },
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}
