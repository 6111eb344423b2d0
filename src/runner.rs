//! Process execution behind a narrow trait.
//!
//! Stage logic never touches `std::process` directly. It goes through a
//! [`CommandRunner`], which lets tests swap in a scripted runner and keeps
//! the sequential bootstrap logic independent of real child processes.

use std::fmt;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::debug;

/// A program, its arguments, and the directory to run it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Program and arguments joined by spaces, without the directory.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                line.push_str(&format!("{arg:?}"));
            } else {
                line.push_str(arg);
            }
        }
        line
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Invoke external tools.
///
/// Every method blocks until the child exits. An `Err` means the program
/// could not be started at all (`NotFound` when it is not on PATH); a
/// nonzero exit is reported through the returned code, never as `Err`.
pub trait CommandRunner {
    /// Run with piped output and return everything the command printed.
    fn capture(&self, invocation: &Invocation) -> io::Result<CommandOutput>;

    /// Run and hand each line of stdout to `on_line` as it arrives.
    /// Stderr is inherited so the tool's own diagnostics reach the terminal.
    fn stream(&self, invocation: &Invocation, on_line: &mut dyn FnMut(&str)) -> io::Result<i32>;

    /// Run with inherited stdio and return the exit code.
    fn status(&self, invocation: &Invocation) -> io::Result<i32>;
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

fn exit_code(status: ExitStatus) -> i32 {
    // Killed by a signal
    status.code().unwrap_or(-1)
}

// Tool output is not guaranteed to be UTF-8; decode it the way `capture` does
fn forward_lines(mut reader: impl BufRead, on_line: &mut dyn FnMut(&str)) -> io::Result<()> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        on_line(&String::from_utf8_lossy(&buf));
    }
}

impl CommandRunner for SystemRunner {
    fn capture(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
        debug!(command = %invocation, "capturing");
        let output = invocation
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        let result = CommandOutput {
            code: exit_code(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(command = %invocation, code = result.code, "captured");
        Ok(result)
    }

    fn stream(&self, invocation: &Invocation, on_line: &mut dyn FnMut(&str)) -> io::Result<i32> {
        debug!(command = %invocation, "streaming");
        let mut child = invocation
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let read = match child.stdout.take() {
            Some(stdout) => forward_lines(BufReader::new(stdout), on_line),
            None => Ok(()),
        };
        // Reap the child even when reading its output failed
        let status = child.wait();
        read?;

        let code = exit_code(status?);
        debug!(command = %invocation, code, "streamed");
        Ok(code)
    }

    fn status(&self, invocation: &Invocation) -> io::Result<i32> {
        debug!(command = %invocation, "running");
        let status = invocation.to_command().stdin(Stdio::null()).status()?;
        let code = exit_code(status);
        debug!(command = %invocation, code, "finished");
        Ok(code)
    }
}
