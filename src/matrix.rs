//! Installation-mode executor.
//!
//! The pipeline's central engine: given the declarative mode matrix, run
//! install, invoke, and uninstall for each mode in declaration order,
//! delegating isolation-boundary provisioning to [`crate::isolation`].
//!
//! Modes are executed strictly sequentially. Install and uninstall are not
//! reentrant, so modes sharing the ambient host state must never overlap,
//! and the uninstall of mode N must complete before mode N+1 installs. The
//! first failing mode aborts the whole matrix, but an in-flight mode whose
//! install succeeded still gets a best-effort uninstall before the error
//! propagates, so the host is not left dirty for a later rerun.

use crate::error::{PipelineError, Result};
use crate::exec::{CommandExecutor, CommandSpec, diagnostics};
use crate::isolation::IsolationContext;
use crate::mode::{CommandLine, InstallationMode, RenderVars};
use crate::output::write_stderr_line;
use camino::Utf8Path;
use serde::Serialize;
use std::io::Write;
use std::process::Output;
use std::time::Duration;

/// Settings shared by every mode in a matrix run.
#[derive(Debug, Clone, Copy)]
pub struct MatrixSettings<'a> {
    /// Name of the package under verification.
    pub package: &'a str,
    /// Root of the package's source tree.
    pub source_root: &'a Utf8Path,
    /// Per-command timeout.
    pub timeout: Duration,
    /// Command that provisions a virtual environment at `{env}`.
    pub venv_command: &'a CommandLine,
    /// Prefix that runs a command line under elevated privilege.
    pub elevation_command: &'a CommandLine,
    /// Leave virtual environments in place for inspection.
    pub keep_env: bool,
    /// Suppress progress output.
    pub quiet: bool,
}

/// Record of one successfully verified mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeOutcome {
    /// Name of the verified mode.
    pub name: String,
    /// Number of invocation checks that passed (elevated modes have two
    /// per invoke step, sharing one install).
    pub invocation_checks: usize,
}

/// Run the whole mode matrix in declaration order, failing fast.
///
/// # Errors
///
/// Returns the first failing mode's error. Modes after the failing one are
/// not attempted; modes before it are reported in progress output.
pub fn run_matrix(
    executor: &dyn CommandExecutor,
    settings: &MatrixSettings<'_>,
    modes: &[InstallationMode],
    stderr: &mut dyn Write,
) -> Result<Vec<ModeOutcome>> {
    let mut outcomes = Vec::with_capacity(modes.len());
    for mode in modes {
        let outcome = verify_mode(executor, settings, mode, stderr)?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// Verify a single mode: install, invoke, uninstall.
///
/// # Errors
///
/// Returns [`PipelineError::Install`], [`PipelineError::Invocation`], or
/// [`PipelineError::Uninstall`] naming the mode, or a propagated timeout or
/// I/O error from the underlying executor.
pub fn verify_mode(
    executor: &dyn CommandExecutor,
    settings: &MatrixSettings<'_>,
    mode: &InstallationMode,
    stderr: &mut dyn Write,
) -> Result<ModeOutcome> {
    if !settings.quiet {
        write_stderr_line(
            stderr,
            format!("Verifying mode '{}' (scope: {})...", mode.name, mode.scope),
        );
    }

    let base_vars = RenderVars {
        package: settings.package,
        source: settings.source_root,
        env: None,
    };
    let context = IsolationContext::provision(
        mode.scope,
        executor,
        settings.venv_command,
        &base_vars,
        settings.keep_env,
        settings.timeout,
    )?;
    let vars = RenderVars {
        package: settings.package,
        source: settings.source_root,
        env: context.env_root(),
    };

    install(executor, settings, mode, &vars, stderr)?;

    let invocation_checks = match invoke(executor, settings, mode, &vars) {
        Ok(count) => count,
        Err(error) => {
            // Invoke failed after a successful install: clean up before
            // propagating so the context is not left dirty.
            best_effort_uninstall(executor, settings, mode, &vars, stderr);
            return Err(error);
        }
    };

    uninstall(executor, settings, mode, &vars)?;

    if !settings.quiet {
        write_stderr_line(
            stderr,
            format!(
                "  mode '{}' passed ({invocation_checks} invocation check(s))",
                mode.name
            ),
        );
    }

    Ok(ModeOutcome {
        name: mode.name.clone(),
        invocation_checks,
    })
}

fn install(
    executor: &dyn CommandExecutor,
    settings: &MatrixSettings<'_>,
    mode: &InstallationMode,
    vars: &RenderVars<'_>,
    stderr: &mut dyn Write,
) -> Result<()> {
    let mut any_succeeded = false;
    for step in &mode.install {
        match run_step(executor, step, vars, settings.timeout) {
            Ok(StepResult::Passed) => any_succeeded = true,
            Ok(StepResult::Failed(reason)) => {
                if any_succeeded {
                    best_effort_uninstall(executor, settings, mode, vars, stderr);
                }
                return Err(PipelineError::Install {
                    mode: mode.name.clone(),
                    reason,
                });
            }
            Err(error) => {
                if any_succeeded {
                    best_effort_uninstall(executor, settings, mode, vars, stderr);
                }
                return Err(error);
            }
        }
    }
    Ok(())
}

fn invoke(
    executor: &dyn CommandExecutor,
    settings: &MatrixSettings<'_>,
    mode: &InstallationMode,
    vars: &RenderVars<'_>,
) -> Result<usize> {
    let mut checks = 0usize;
    for step in &mode.invoke {
        run_invoke_step(executor, mode, &vars.render_argv(step), settings.timeout)?;
        checks += 1;

        if mode.elevated {
            // Elevation changes the caller's privilege, not the install
            // target: the elevated check reuses the same rendered argv.
            let mut elevated = settings.elevation_command.clone();
            elevated.extend(vars.render_argv(step));
            run_invoke_step(executor, mode, &elevated, settings.timeout)?;
            checks += 1;
        }
    }
    Ok(checks)
}

fn run_invoke_step(
    executor: &dyn CommandExecutor,
    mode: &InstallationMode,
    argv: &[String],
    timeout: Duration,
) -> Result<()> {
    let spec = CommandSpec::from_argv(argv, timeout);
    let output = executor.run(&spec)?;
    if output.status.success() {
        Ok(())
    } else {
        Err(PipelineError::Invocation {
            mode: mode.name.clone(),
            reason: step_failure_reason(&spec, &output),
        })
    }
}

fn uninstall(
    executor: &dyn CommandExecutor,
    settings: &MatrixSettings<'_>,
    mode: &InstallationMode,
    vars: &RenderVars<'_>,
) -> Result<()> {
    for step in &mode.uninstall {
        match run_step(executor, step, vars, settings.timeout)? {
            StepResult::Passed => {}
            StepResult::Failed(reason) => {
                return Err(PipelineError::Uninstall {
                    mode: mode.name.clone(),
                    reason,
                });
            }
        }
    }
    Ok(())
}

/// Run every uninstall step, swallowing failures.
///
/// Used when a mode aborts mid-flight: the primary error must propagate,
/// but the context should still be restored as far as possible.
fn best_effort_uninstall(
    executor: &dyn CommandExecutor,
    settings: &MatrixSettings<'_>,
    mode: &InstallationMode,
    vars: &RenderVars<'_>,
    stderr: &mut dyn Write,
) {
    for step in &mode.uninstall {
        match run_step(executor, step, vars, settings.timeout) {
            Ok(StepResult::Passed) => {}
            Ok(StepResult::Failed(reason)) => warn_cleanup(settings, mode, &reason, stderr),
            Err(error) => warn_cleanup(settings, mode, &error.to_string(), stderr),
        }
    }
}

fn warn_cleanup(
    settings: &MatrixSettings<'_>,
    mode: &InstallationMode,
    reason: &str,
    stderr: &mut dyn Write,
) {
    log::warn!("cleanup uninstall failed for mode '{}': {reason}", mode.name);
    if !settings.quiet {
        write_stderr_line(
            stderr,
            format!(
                "Warning: cleanup uninstall failed for mode '{}': {reason}",
                mode.name
            ),
        );
    }
}

enum StepResult {
    Passed,
    Failed(String),
}

fn run_step(
    executor: &dyn CommandExecutor,
    step: &CommandLine,
    vars: &RenderVars<'_>,
    timeout: Duration,
) -> Result<StepResult> {
    let spec = CommandSpec::from_argv(&vars.render_argv(step), timeout);
    let output = executor.run(&spec)?;
    if output.status.success() {
        Ok(StepResult::Passed)
    } else {
        Ok(StepResult::Failed(step_failure_reason(&spec, &output)))
    }
}

fn step_failure_reason(spec: &CommandSpec, output: &Output) -> String {
    let status = output
        .status
        .code()
        .map_or_else(|| "terminated by signal".to_owned(), |code| format!("exit {code}"));
    let text = diagnostics(output);
    if text.is_empty() {
        format!("'{}' failed ({status})", spec.display_line())
    } else {
        format!("'{}' failed ({status}): {text}", spec.display_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Scope;
    use crate::test_utils::{
        ExpectedCall, StubExecutor, failure_output, failure_output_with_code, output_with_stdout,
        success_output,
    };
    use camino::Utf8PathBuf;

    fn settings<'a>(
        source: &'a Utf8Path,
        venv: &'a CommandLine,
        elevation: &'a CommandLine,
    ) -> MatrixSettings<'a> {
        MatrixSettings {
            package: "tool",
            source_root: source,
            timeout: Duration::from_secs(5),
            venv_command: venv,
            elevation_command: elevation,
            keep_env: false,
            quiet: true,
        }
    }

    fn argv(parts: &[&str]) -> CommandLine {
        parts.iter().map(|part| (*part).to_owned()).collect()
    }

    fn system_mode() -> InstallationMode {
        InstallationMode {
            name: "system".to_owned(),
            scope: Scope::System,
            elevated: false,
            install: vec![argv(&["install-system"])],
            invoke: vec![argv(&["{package}", "-h"])],
            uninstall: vec![argv(&["uninstall-system"])],
        }
    }

    #[test]
    fn happy_path_runs_install_invoke_uninstall_in_order() {
        let source = Utf8PathBuf::from("/src/tool");
        let venv = argv(&["python3", "-m", "venv", "{env}"]);
        let elevation = argv(&["sudo"]);
        let stub = StubExecutor::new(vec![
            ExpectedCall::new("install-system", &[], Ok(success_output())),
            ExpectedCall::new("tool", &["-h"], Ok(output_with_stdout("usage: tool [-h]"))),
            ExpectedCall::new("uninstall-system", &[], Ok(success_output())),
        ]);
        let mut stderr = Vec::new();

        let outcome = verify_mode(
            &stub,
            &settings(&source, &venv, &elevation),
            &system_mode(),
            &mut stderr,
        )
        .expect("mode should pass");
        assert_eq!(outcome.name, "system");
        assert_eq!(outcome.invocation_checks, 1);
        stub.assert_finished();
    }

    #[test]
    fn elevated_mode_checks_both_privilege_levels_with_one_install() {
        let source = Utf8PathBuf::from("/src/tool");
        let venv = argv(&["python3", "-m", "venv", "{env}"]);
        let elevation = argv(&["sudo"]);
        let mode = InstallationMode {
            elevated: true,
            ..system_mode()
        };
        let stub = StubExecutor::new(vec![
            ExpectedCall::new("install-system", &[], Ok(success_output())),
            ExpectedCall::new("tool", &["-h"], Ok(success_output())),
            ExpectedCall::new("sudo", &["tool", "-h"], Ok(success_output())),
            ExpectedCall::new("uninstall-system", &[], Ok(success_output())),
        ]);
        let mut stderr = Vec::new();

        let outcome = verify_mode(
            &stub,
            &settings(&source, &venv, &elevation),
            &mode,
            &mut stderr,
        )
        .expect("mode should pass");
        assert_eq!(outcome.invocation_checks, 2);
        stub.assert_finished();
    }

    #[test]
    fn install_failure_is_attributed_to_the_mode() {
        let source = Utf8PathBuf::from("/src/tool");
        let venv = argv(&["python3", "-m", "venv", "{env}"]);
        let elevation = argv(&["sudo"]);
        let stub = StubExecutor::new(vec![ExpectedCall::new(
            "install-system",
            &[],
            Ok(failure_output("no permission")),
        )]);
        let mut stderr = Vec::new();

        let err = verify_mode(
            &stub,
            &settings(&source, &venv, &elevation),
            &system_mode(),
            &mut stderr,
        )
        .expect_err("mode should fail");
        assert!(matches!(
            err,
            PipelineError::Install { mode, reason }
                if mode == "system" && reason.contains("no permission")
        ));
        stub.assert_finished();
    }

    #[test]
    fn invoke_failure_still_uninstalls_before_propagating() {
        let source = Utf8PathBuf::from("/src/tool");
        let venv = argv(&["python3", "-m", "venv", "{env}"]);
        let elevation = argv(&["sudo"]);
        let stub = StubExecutor::new(vec![
            ExpectedCall::new("install-system", &[], Ok(success_output())),
            ExpectedCall::new("tool", &["-h"], Ok(failure_output_with_code(2, "bad usage"))),
            // Best-effort cleanup still runs the uninstall step.
            ExpectedCall::new("uninstall-system", &[], Ok(success_output())),
        ]);
        let mut stderr = Vec::new();

        let err = verify_mode(
            &stub,
            &settings(&source, &venv, &elevation),
            &system_mode(),
            &mut stderr,
        )
        .expect_err("mode should fail");
        assert!(matches!(
            err,
            PipelineError::Invocation { mode, reason }
                if mode == "system" && reason.contains("exit 2")
        ));
        stub.assert_finished();
    }

    #[test]
    fn cleanup_uninstall_failure_does_not_mask_the_invocation_error() {
        let source = Utf8PathBuf::from("/src/tool");
        let venv = argv(&["python3", "-m", "venv", "{env}"]);
        let elevation = argv(&["sudo"]);
        let stub = StubExecutor::new(vec![
            ExpectedCall::new("install-system", &[], Ok(success_output())),
            ExpectedCall::new("tool", &["-h"], Ok(failure_output("broken entry point"))),
            ExpectedCall::new("uninstall-system", &[], Ok(failure_output("still installed"))),
        ]);
        let mut stderr = Vec::new();

        let err = verify_mode(
            &stub,
            &settings(&source, &venv, &elevation),
            &system_mode(),
            &mut stderr,
        )
        .expect_err("mode should fail");
        assert!(matches!(err, PipelineError::Invocation { .. }));
        stub.assert_finished();
    }

    #[test]
    fn uninstall_failure_after_passing_invoke_is_fatal() {
        let source = Utf8PathBuf::from("/src/tool");
        let venv = argv(&["python3", "-m", "venv", "{env}"]);
        let elevation = argv(&["sudo"]);
        let stub = StubExecutor::new(vec![
            ExpectedCall::new("install-system", &[], Ok(success_output())),
            ExpectedCall::new("tool", &["-h"], Ok(success_output())),
            ExpectedCall::new("uninstall-system", &[], Ok(failure_output("locked"))),
        ]);
        let mut stderr = Vec::new();

        let err = verify_mode(
            &stub,
            &settings(&source, &venv, &elevation),
            &system_mode(),
            &mut stderr,
        )
        .expect_err("mode should fail");
        assert!(matches!(
            err,
            PipelineError::Uninstall { mode, .. } if mode == "system"
        ));
        stub.assert_finished();
    }

    #[test]
    fn matrix_fails_fast_and_skips_later_modes() {
        let source = Utf8PathBuf::from("/src/tool");
        let venv = argv(&["python3", "-m", "venv", "{env}"]);
        let elevation = argv(&["sudo"]);
        let modes = vec![
            system_mode(),
            InstallationMode {
                name: "user".to_owned(),
                scope: Scope::User,
                elevated: false,
                install: vec![argv(&["install-user"])],
                invoke: vec![argv(&["{package}", "-h"])],
                uninstall: vec![argv(&["uninstall-user"])],
            },
        ];
        // The first mode's install fails; nothing from the second mode runs.
        let stub = StubExecutor::new(vec![ExpectedCall::new(
            "install-system",
            &[],
            Ok(failure_output("disk full")),
        )]);
        let mut stderr = Vec::new();

        let err = run_matrix(
            &stub,
            &settings(&source, &venv, &elevation),
            &modes,
            &mut stderr,
        )
        .expect_err("matrix should fail");
        assert!(matches!(
            err,
            PipelineError::Install { mode, .. } if mode == "system"
        ));
        stub.assert_finished();
    }

    #[test]
    fn shared_context_modes_uninstall_before_the_next_install() {
        let source = Utf8PathBuf::from("/src/tool");
        let venv = argv(&["python3", "-m", "venv", "{env}"]);
        let elevation = argv(&["sudo"]);
        let modes = vec![
            InstallationMode {
                name: "user".to_owned(),
                scope: Scope::User,
                elevated: false,
                install: vec![argv(&["install-user"])],
                invoke: vec![argv(&["{package}", "-h"])],
                uninstall: vec![argv(&["uninstall-user"])],
            },
            InstallationMode {
                name: "editable-user".to_owned(),
                scope: Scope::EditableUser,
                elevated: false,
                install: vec![argv(&["install-editable"])],
                invoke: vec![argv(&["{package}", "-h"])],
                uninstall: vec![argv(&["uninstall-editable"])],
            },
        ];
        // The stub enforces strict ordering: uninstall of the first mode
        // must precede the second mode's install.
        let stub = StubExecutor::new(vec![
            ExpectedCall::new("install-user", &[], Ok(success_output())),
            ExpectedCall::new("tool", &["-h"], Ok(success_output())),
            ExpectedCall::new("uninstall-user", &[], Ok(success_output())),
            ExpectedCall::new("install-editable", &[], Ok(success_output())),
            ExpectedCall::new("tool", &["-h"], Ok(success_output())),
            ExpectedCall::new("uninstall-editable", &[], Ok(success_output())),
        ]);
        let mut stderr = Vec::new();

        let outcomes = run_matrix(
            &stub,
            &settings(&source, &venv, &elevation),
            &modes,
            &mut stderr,
        )
        .expect("matrix should pass");
        assert_eq!(outcomes.len(), 2);
        stub.assert_finished();
    }

    #[test]
    fn timeout_from_the_executor_propagates_unchanged() {
        let source = Utf8PathBuf::from("/src/tool");
        let venv = argv(&["python3", "-m", "venv", "{env}"]);
        let elevation = argv(&["sudo"]);
        let stub = StubExecutor::new(vec![ExpectedCall::new(
            "install-system",
            &[],
            Err(PipelineError::Timeout {
                program: "install-system".to_owned(),
                limit_secs: 600,
            }),
        )]);
        let mut stderr = Vec::new();

        let err = verify_mode(
            &stub,
            &settings(&source, &venv, &elevation),
            &system_mode(),
            &mut stderr,
        )
        .expect_err("mode should fail");
        assert!(matches!(
            err,
            PipelineError::Timeout { program, .. } if program == "install-system"
        ));
        stub.assert_finished();
    }
}
