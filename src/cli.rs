//! CLI argument definitions for the pipeline binary.
//!
//! This module defines the command-line interface using clap. It is
//! separated from the main entrypoint to keep the binary small and focused
//! on orchestration. The configuration file carries the declarative stage
//! and mode lists; the CLI only carries operational toggles.

use camino::Utf8PathBuf;
use clap::Parser;

/// Verify that a package installs, runs, and uninstalls across modes.
#[derive(Parser, Debug)]
#[command(name = "gauntlet")]
#[command(version, about)]
#[command(long_about = concat!(
    "Verify that a command-line package installs, runs, and uninstalls ",
    "correctly across every supported installation mode.\n\n",
    "The pipeline runs static gates (import order, lint, a tab scan, and two ",
    "type-checkers), the unit-test suite, an ordered matrix of installation ",
    "modes (system-wide, per-user, editable, and virtualenv, with elevated ",
    "invocation checks where configured), and finally builds and invokes a ",
    "self-contained bundle. The first failure halts the run.\n\n",
    "Configuration lives in a TOML file; a minimal file only names the ",
    "package and accepts the default matrix for pip-installable tools.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Run the full pipeline with the default configuration file:\n",
    "    $ gauntlet\n\n",
    "  Run only the virtualenv mode, keeping its environment afterwards:\n",
    "    $ gauntlet --mode virtualenv --keep-env\n\n",
    "  Skip the gates and tests during local iteration:\n",
    "    $ gauntlet --skip-gates --skip-tests\n\n",
    "  Preview the resolved configuration without side effects:\n",
    "    $ gauntlet --dry-run\n",
))]
pub struct Cli {
    /// Path to the pipeline configuration file.
    #[arg(short = 'c', long, default_value = "gauntlet.toml")]
    pub config: Utf8PathBuf,

    /// Restrict the matrix to the named mode (repeatable).
    #[arg(long = "mode", value_name = "NAME")]
    pub modes: Vec<String>,

    /// Skip the lint and type-check stages.
    #[arg(long)]
    pub skip_gates: bool,

    /// Skip the unit-test stage.
    #[arg(long)]
    pub skip_tests: bool,

    /// Leave virtual environments in place for inspection.
    #[arg(long)]
    pub keep_env: bool,

    /// Override the per-command timeout, in seconds.
    #[arg(long, value_name = "SECONDS")]
    pub timeout_secs: Option<u64>,

    /// Show the resolved configuration without running anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the pipeline report as JSON on stdout after success.
    #[arg(long)]
    pub report_json: bool,

    /// Suppress progress output.
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,

    /// Increase logging verbosity (repeatable).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Utf8PathBuf::from("gauntlet.toml"),
            modes: Vec::new(),
            skip_gates: false,
            skip_tests: false,
            keep_env: false,
            timeout_secs: None,
            dry_run: false,
            report_json: false,
            quiet: false,
            verbosity: 0,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
