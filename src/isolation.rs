//! Isolation-context provisioning and teardown.
//!
//! Ambient-scoped modes run against the host filesystem and interpreter;
//! virtualenv-scoped modes get a freshly provisioned environment rooted in a
//! scratch directory that is created immediately before the mode's first
//! command and removed once its verification completes. Contexts are never
//! reused across modes of different scope.

use crate::error::{PipelineError, Result};
use crate::exec::{CommandExecutor, CommandSpec, diagnostics};
use crate::mode::{CommandLine, RenderVars, Scope};
use camino::{Utf8Path, Utf8PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// The environment a mode's commands run under.
#[derive(Debug)]
pub enum IsolationContext {
    /// The ambient host filesystem and interpreter.
    Ambient,
    /// A freshly created virtual environment.
    Virtualenv {
        /// Root directory of the environment.
        root: Utf8PathBuf,
        /// Owning handle for the scratch directory; `None` when the
        /// environment is kept for inspection after the run.
        scratch: Option<TempDir>,
    },
}

impl IsolationContext {
    /// Provision the context a scope requires.
    ///
    /// For [`Scope::Virtualenv`] this creates a scratch directory and runs
    /// the configured creation command with `{env}` bound to it. Ambient
    /// scopes provision nothing; the executor must guarantee uninstall
    /// before the shared host state is reused.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Isolation`] when the scratch directory
    /// cannot be created or the creation command fails.
    pub fn provision(
        scope: Scope,
        executor: &dyn CommandExecutor,
        create_command: &CommandLine,
        vars: &RenderVars<'_>,
        keep_env: bool,
        timeout: Duration,
    ) -> Result<Self> {
        if scope.is_ambient() {
            return Ok(Self::Ambient);
        }

        let scratch = tempfile::Builder::new()
            .prefix("gauntlet-venv-")
            .tempdir()
            .map_err(|error| PipelineError::Isolation {
                reason: format!("could not create scratch directory: {error}"),
            })?;
        let root = Utf8PathBuf::from_path_buf(scratch.path().to_path_buf()).map_err(|path| {
            PipelineError::Isolation {
                reason: format!("scratch directory path is not UTF-8: {}", path.display()),
            }
        })?;

        let env_vars = RenderVars {
            package: vars.package,
            source: vars.source,
            env: Some(&root),
        };
        let spec = CommandSpec::from_argv(&env_vars.render_argv(create_command), timeout);
        let output = executor.run(&spec)?;
        if !output.status.success() {
            return Err(PipelineError::Isolation {
                reason: format!(
                    "environment creation command failed: {}",
                    diagnostics(&output)
                ),
            });
        }

        let scratch = if keep_env {
            let kept = scratch.keep();
            log::info!("leaving virtual environment at {} for inspection", kept.display());
            None
        } else {
            Some(scratch)
        };

        Ok(Self::Virtualenv { root, scratch })
    }

    /// Root of the virtual environment, when one exists.
    #[must_use]
    pub fn env_root(&self) -> Option<&Utf8Path> {
        match self {
            Self::Ambient => None,
            Self::Virtualenv { root, .. } => Some(root.as_path()),
        }
    }
}
