//! Stage sequencing for the verification pipeline.
//!
//! Stages run in a fixed order: lint, type-check, unit tests, the
//! installation-mode matrix, and finally the self-contained bundle. Any
//! stage failure halts all subsequent stages; there is no partial
//! continuation and nothing is retried.

use crate::bundle::{self, BundleSummary};
use crate::config::Config;
use crate::error::Result;
use crate::exec::CommandExecutor;
use crate::gates::{GateStage, run_gate_stage};
use crate::matrix::{MatrixSettings, ModeOutcome, run_matrix};
use crate::mode::RenderVars;
use crate::output::write_stderr_line;
use crate::testsuite::run_tests;
use serde::Serialize;
use std::fmt;
use std::io::Write;

/// One stage of the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionStage {
    /// Import-order, lint, and prohibited-character checks.
    Lint,
    /// Static type-checking.
    TypeCheck,
    /// The unit-test suite.
    UnitTest,
    /// The installation-mode matrix.
    InstallVerify,
    /// Bundle build and direct invocation.
    BundleVerify,
}

impl fmt::Display for ExecutionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lint => "lint",
            Self::TypeCheck => "type-check",
            Self::UnitTest => "unit-test",
            Self::InstallVerify => "install-verify",
            Self::BundleVerify => "bundle-verify",
        };
        write!(f, "{name}")
    }
}

/// Operational toggles for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Skip the lint and type-check stages.
    pub skip_gates: bool,
    /// Skip the unit-test stage.
    pub skip_tests: bool,
    /// Restrict the matrix to the named modes; empty means all.
    pub mode_filter: Vec<String>,
    /// Leave virtual environments in place for inspection.
    pub keep_env: bool,
    /// Suppress progress output.
    pub quiet: bool,
}

/// Record of a fully successful pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Name of the verified package.
    pub package: String,
    /// Stages that ran and passed, in execution order.
    pub stages_passed: Vec<ExecutionStage>,
    /// Per-mode outcomes from the installation matrix.
    pub modes: Vec<ModeOutcome>,
    /// Bundle facts, present once the bundle stage has passed.
    pub bundle: Option<BundleSummary>,
}

/// Run the whole pipeline against the given configuration.
///
/// # Errors
///
/// Returns the first failing stage's or mode's error; later stages are not
/// attempted.
pub fn run_pipeline(
    executor: &dyn CommandExecutor,
    config: &Config,
    options: &PipelineOptions,
    stderr: &mut dyn Write,
) -> Result<PipelineReport> {
    let modes = config.select_modes(&options.mode_filter)?;
    let timeout = config.command_timeout();
    let vars = RenderVars {
        package: &config.package,
        source: &config.source_root,
        env: None,
    };

    let mut report = PipelineReport {
        package: config.package.clone(),
        stages_passed: Vec::new(),
        modes: Vec::new(),
        bundle: None,
    };

    if options.skip_gates {
        if !options.quiet {
            write_stderr_line(stderr, "Skipping static gates.");
        }
    } else {
        for stage in [GateStage::Lint, GateStage::TypeCheck] {
            announce(options, stderr, &format!("Running {stage} checks..."));
            run_gate_stage(executor, &config.checks, stage, &vars, timeout)?;
            report.stages_passed.push(match stage {
                GateStage::Lint => ExecutionStage::Lint,
                GateStage::TypeCheck => ExecutionStage::TypeCheck,
            });
        }
    }

    if options.skip_tests {
        if !options.quiet {
            write_stderr_line(stderr, "Skipping unit tests.");
        }
    } else {
        announce(options, stderr, "Running unit tests...");
        run_tests(executor, &config.test_command, &vars, timeout)?;
        report.stages_passed.push(ExecutionStage::UnitTest);
    }

    announce(options, stderr, "Verifying installation modes...");
    let settings = MatrixSettings {
        package: &config.package,
        source_root: &config.source_root,
        timeout,
        venv_command: &config.isolation.create_command,
        elevation_command: &config.isolation.elevation_command,
        keep_env: options.keep_env,
        quiet: options.quiet,
    };
    report.modes = run_matrix(executor, &settings, &modes, stderr)?;
    report.stages_passed.push(ExecutionStage::InstallVerify);

    announce(options, stderr, "Building and verifying bundle...");
    let bundle = bundle::build(executor, &config.bundle, &vars, timeout)?;
    bundle::verify(executor, &bundle, &config.bundle.invoke_args, &vars, timeout)?;
    report.bundle = Some(BundleSummary::from(&bundle));
    report.stages_passed.push(ExecutionStage::BundleVerify);

    Ok(report)
}

fn announce(options: &PipelineOptions, stderr: &mut dyn Write, message: &str) {
    if !options.quiet {
        write_stderr_line(stderr, message);
    }
}
