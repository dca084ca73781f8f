//! Unit-test stage runner.
//!
//! The unit-test suite is an external collaborator with an exit-code
//! contract. A failing run halts the pipeline; there are no retries.

use crate::error::{PipelineError, Result};
use crate::exec::{CommandExecutor, CommandSpec, diagnostics};
use crate::mode::{CommandLine, RenderVars};
use std::time::Duration;

/// Maximum number of output lines carried into the failure summary.
const SUMMARY_LINES: usize = 20;

/// Run the unit-test suite.
///
/// # Errors
///
/// Returns [`PipelineError::Test`] when the suite exits non-zero, carrying
/// the tail of its combined output as the summary. Spawn failures and
/// timeouts propagate unchanged.
pub fn run_tests(
    executor: &dyn CommandExecutor,
    command: &CommandLine,
    vars: &RenderVars<'_>,
    timeout: Duration,
) -> Result<()> {
    let spec = CommandSpec::from_argv(&vars.render_argv(command), timeout);
    let output = executor.run(&spec)?;
    if output.status.success() {
        return Ok(());
    }
    Err(PipelineError::Test {
        summary: tail_lines(&diagnostics(&output), SUMMARY_LINES),
    })
}

/// Keep at most the last `limit` lines of `text`.
fn tail_lines(text: &str, limit: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(limit);
    lines
        .iter()
        .skip(start)
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
}
