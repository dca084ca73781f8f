//! Shared test utilities for the pipeline crate.
//!
//! Exposed under the `test-support` feature so that integration tests can
//! exercise pipeline logic without invoking real system commands.

use crate::error::{PipelineError, Result};
use crate::exec::{CommandExecutor, CommandSpec};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// Creates a successful command `Output` with the given stdout text.
#[must_use]
pub fn output_with_stdout(stdout: &str) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Creates a failed command `Output` with a specific exit code.
#[must_use]
pub fn failure_output_with_code(code: i32, stderr: &str) -> Output {
    Output {
        status: exit_status(code),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The program expected to be executed.
    pub program: String,
    /// The arguments expected to be passed.
    pub args: Vec<String>,
    /// The result to return when this invocation arrives.
    pub result: Result<Output>,
}

impl ExpectedCall {
    /// Creates an expected call from borrowed argv parts.
    #[must_use]
    pub fn new(program: &str, args: &[&str], result: Result<Output>) -> Self {
        Self {
            program: program.to_owned(),
            args: args.iter().map(|arg| (*arg).to_owned()).collect(),
            result,
        }
    }
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Holds a queue of expected invocations and returns the predefined result
/// for each. A mismatched or surplus invocation yields
/// [`PipelineError::StubMismatch`] rather than panicking, so that
/// best-effort cleanup paths (which swallow errors) can be exercised without
/// aborting the test.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        let remaining = self.expected.borrow();
        assert!(
            remaining.is_empty(),
            "expected no further command invocations, but {} remain",
            remaining.len()
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, spec: &CommandSpec) -> Result<Output> {
        let Some(call) = self.expected.borrow_mut().pop_front() else {
            return Err(PipelineError::StubMismatch {
                message: format!("unexpected invocation of '{}'", spec.display_line()),
            });
        };

        if call.program != spec.program || call.args != spec.args {
            return Err(PipelineError::StubMismatch {
                message: format!(
                    "expected '{} {}', got '{}'",
                    call.program,
                    call.args.join(" "),
                    spec.display_line()
                ),
            });
        }

        call.result
    }
}
