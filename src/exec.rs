//! Command execution seam for the pipeline.
//!
//! Every external collaborator (static checks, test runner, installers, the
//! bundle script) is consumed as a process with an exit-code contract. This
//! module provides the abstraction that the rest of the crate runs commands
//! through, plus the system implementation with a per-command timeout to
//! prevent a hung collaborator from stalling the pipeline indefinitely.

use crate::error::{PipelineError, Result};
use camino::Utf8PathBuf;
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// A fully resolved command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Working directory, or the pipeline's own when `None`.
    pub cwd: Option<Utf8PathBuf>,
    /// Maximum wall-clock time the command may run for.
    pub timeout: Duration,
}

impl CommandSpec {
    /// Build a spec from an argv-style command line.
    ///
    /// The first element is the program; the rest are its arguments. An
    /// empty argv yields a spec with an empty program name, which fails at
    /// spawn time with a regular I/O error.
    #[must_use]
    pub fn from_argv(argv: &[String], timeout: Duration) -> Self {
        let mut parts = argv.iter();
        let program = parts.next().cloned().unwrap_or_default();
        Self {
            program,
            args: parts.cloned().collect(),
            cwd: None,
            timeout,
        }
    }

    /// Render the command line for diagnostics.
    #[must_use]
    pub fn display_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Abstraction for running external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor {
    /// Runs a command and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the
    /// command, or [`PipelineError::Timeout`] if the command exceeds its
    /// configured timeout.
    fn run(&self, spec: &CommandSpec) -> Result<Output>;
}

/// Executes commands on the host system with a timeout.
///
/// Commands that exceed their timeout are killed and reported as
/// [`PipelineError::Timeout`] rather than left to block the pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, spec: &CommandSpec) -> Result<Output> {
        log::debug!("running: {}", spec.display_line());

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir.as_std_path());
        }

        let mut child = cmd.spawn()?;

        // The pipes are drained on their own threads; a child writing more
        // than the pipe buffer would otherwise block and be misreported as
        // a timeout.
        let stdout_reader = child.stdout.take().map(spawn_reader);
        let stderr_reader = child.stderr.take().map(spawn_reader);

        match child.wait_timeout(spec.timeout)? {
            Some(status) => Ok(Output {
                status,
                stdout: join_reader(stdout_reader)?,
                stderr: join_reader(stderr_reader)?,
            }),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                Err(PipelineError::Timeout {
                    program: spec.program.clone(),
                    limit_secs: spec.timeout.as_secs(),
                })
            }
        }
    }
}

fn spawn_reader<R>(mut reader: R) -> std::thread::JoinHandle<std::io::Result<Vec<u8>>>
where
    R: std::io::Read + Send + 'static,
{
    std::thread::spawn(move || {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        Ok(buffer)
    })
}

fn join_reader(
    handle: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
) -> Result<Vec<u8>> {
    let Some(handle) = handle else {
        return Ok(Vec::new());
    };
    let bytes = handle
        .join()
        .map_err(|_| std::io::Error::other("output reader thread panicked"))??;
    Ok(bytes)
}

/// Combine a command's stdout and stderr into a trimmed diagnostic string.
#[must_use]
pub fn diagnostics(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut text = String::new();
    if !stdout.trim().is_empty() {
        text.push_str(stdout.trim());
    }
    if !stderr.trim().is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(stderr.trim());
    }
    text
}
