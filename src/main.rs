//! Pipeline CLI entrypoint.
//!
//! This binary loads the configuration, applies the CLI's operational
//! toggles, and runs the verification pipeline, exiting non-zero on the
//! first failing stage or mode.

use clap::Parser;
use gauntlet::cli::Cli;
use gauntlet::config::Config;
use gauntlet::error::Result;
use gauntlet::exec::SystemCommandExecutor;
use gauntlet::mode::InstallationMode;
use gauntlet::output::{summary_human, write_stderr_line};
use gauntlet::pipeline::{PipelineOptions, run_pipeline};
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbosity);
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn init_logging(verbosity: u8) {
    env_logger::Builder::new()
        .filter_level(log_level(verbosity))
        .format_timestamp(None)
        .init();
}

/// Map the repeatable `-v` flag onto a log level.
const fn log_level(verbosity: u8) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<()> {
    let mut config = Config::load(&cli.config)?;
    if let Some(timeout_secs) = cli.timeout_secs {
        config.command_timeout_secs = timeout_secs;
    }

    if cli.dry_run {
        print_dry_run_info(&config, cli, stderr);
        return Ok(());
    }

    let options = PipelineOptions {
        skip_gates: cli.skip_gates,
        skip_tests: cli.skip_tests,
        mode_filter: cli.modes.clone(),
        keep_env: cli.keep_env,
        quiet: cli.quiet,
    };

    let executor = SystemCommandExecutor;
    let report = run_pipeline(&executor, &config, &options, stderr)?;

    if !cli.quiet {
        write_stderr_line(stderr, "");
        write_stderr_line(stderr, summary_human(&report));
    }

    if cli.report_json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|error| std::io::Error::other(error.to_string()))?;
        let mut stdout = std::io::stdout();
        writeln!(stdout, "{rendered}")?;
    }

    Ok(())
}

/// Prints the resolved configuration without running anything.
fn print_dry_run_info(config: &Config, cli: &Cli, stderr: &mut dyn Write) {
    write_stderr_line(stderr, "Dry run - no commands will be executed");
    write_stderr_line(stderr, "");
    write_stderr_line(stderr, format!("Package: {}", config.package));
    write_stderr_line(stderr, format!("Source root: {}", config.source_root));
    write_stderr_line(
        stderr,
        format!("Command timeout: {}s", config.command_timeout_secs),
    );
    write_stderr_line(stderr, format!("Skip gates: {}", cli.skip_gates));
    write_stderr_line(stderr, format!("Skip tests: {}", cli.skip_tests));
    write_stderr_line(stderr, format!("Verbosity level: {}", cli.verbosity));

    write_stderr_line(stderr, "");
    write_stderr_line(stderr, "Checks:");
    for check in &config.checks {
        write_stderr_line(stderr, format!("  - {} ({})", check.name, check.stage));
    }

    write_stderr_line(stderr, "");
    write_stderr_line(stderr, "Modes:");
    let selected = match config.select_modes(&cli.modes) {
        Ok(modes) => modes,
        Err(error) => {
            write_stderr_line(stderr, format!("  (invalid mode filter: {error})"));
            Vec::new()
        }
    };
    for mode in &selected {
        write_stderr_line(stderr, mode_line(mode));
    }

    write_stderr_line(stderr, "");
    write_stderr_line(stderr, format!("Bundle output: {}", config.bundle.output));
}

fn mode_line(mode: &InstallationMode) -> String {
    let elevated = if mode.elevated { ", elevated" } else { "" };
    format!("  - {} (scope: {}{elevated})", mode.name, mode.scope)
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, err);
            1
        }
    }
}
