//! Pipeline configuration loading and validation.
//!
//! The configuration file is the pipeline's only external surface beyond the
//! CLI toggles: an ordered, declarative list of static checks, the unit-test
//! command, the installation-mode matrix, and the bundle description. Every
//! field has a built-in default covering the canonical matrix for a
//! pip-installable package, so a minimal file only names the package.

use crate::error::{PipelineError, Result};
use crate::gates::Check;
use crate::mode::{CommandLine, InstallationMode, default_matrix};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;

/// Default per-command timeout in seconds.
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 600;

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Name of the package under verification.
    pub package: String,
    /// Root of the package's source tree.
    #[serde(default = "default_source_root")]
    pub source_root: Utf8PathBuf,
    /// Maximum wall-clock seconds any single wrapped command may run for.
    #[serde(default = "default_timeout_secs")]
    pub command_timeout_secs: u64,
    /// Ordered static checks for the lint and type-check stages.
    #[serde(default = "crate::gates::default_checks")]
    pub checks: Vec<Check>,
    /// Command that runs the unit-test suite.
    #[serde(default = "default_test_command")]
    pub test_command: CommandLine,
    /// Ordered installation-mode matrix.
    #[serde(default = "default_matrix")]
    pub modes: Vec<InstallationMode>,
    /// Isolation-environment settings.
    #[serde(default)]
    pub isolation: IsolationConfig,
    /// Self-contained bundle settings.
    #[serde(default)]
    pub bundle: BundleConfig,
}

/// Settings for provisioning isolation environments and elevation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IsolationConfig {
    /// Command that provisions a fresh virtual environment at `{env}`.
    #[serde(default = "default_venv_command")]
    pub create_command: CommandLine,
    /// Prefix prepended to a command line to run it under elevated privilege.
    #[serde(default = "default_elevation_command")]
    pub elevation_command: CommandLine,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            create_command: default_venv_command(),
            elevation_command: default_elevation_command(),
        }
    }
}

/// Settings for building and verifying the self-contained bundle.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleConfig {
    /// Steps that produce the bundle from the source tree.
    #[serde(default = "default_bundle_build")]
    pub build: Vec<CommandLine>,
    /// Path of the produced executable; deterministic for a given tree.
    #[serde(default = "default_bundle_output")]
    pub output: String,
    /// Arguments the bundle is invoked with during verification.
    #[serde(default = "default_bundle_invoke_args")]
    pub invoke_args: CommandLine,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            build: default_bundle_build(),
            output: default_bundle_output(),
            invoke_args: default_bundle_invoke_args(),
        }
    }
}

fn default_source_root() -> Utf8PathBuf {
    Utf8PathBuf::from(".")
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

fn default_test_command() -> CommandLine {
    to_argv(&["python3", "-m", "pytest", "{source}/tests"])
}

fn default_venv_command() -> CommandLine {
    to_argv(&["python3", "-m", "venv", "{env}"])
}

fn default_elevation_command() -> CommandLine {
    to_argv(&["sudo"])
}

fn default_bundle_build() -> Vec<CommandLine> {
    vec![to_argv(&["sh", "{source}/tools/generate-bundle.sh"])]
}

fn default_bundle_output() -> String {
    "{source}/builddir/{package}".to_owned()
}

fn default_bundle_invoke_args() -> CommandLine {
    to_argv(&["-h"])
}

fn to_argv(parts: &[&str]) -> CommandLine {
    parts.iter().map(|part| (*part).to_owned()).collect()
}

impl Config {
    /// Load and validate configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ConfigNotFound`] when the file is missing,
    /// or [`PipelineError::InvalidConfig`] when it cannot be parsed or is
    /// internally inconsistent.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::ConfigNotFound {
                path: path.to_owned(),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&contents).map_err(|error| PipelineError::InvalidConfig {
                path: path.to_owned(),
                reason: error.to_string(),
            })?;
        config.validate(path)?;
        Ok(config)
    }

    /// The per-command timeout as a [`Duration`].
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Resolve the modes to run, applying an optional name filter.
    ///
    /// An empty filter selects the whole matrix in declaration order; a
    /// non-empty filter keeps declaration order but drops unnamed modes.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownMode`] when the filter names a mode
    /// that does not exist in the configuration.
    pub fn select_modes(&self, filter: &[String]) -> Result<Vec<InstallationMode>> {
        if filter.is_empty() {
            return Ok(self.modes.clone());
        }
        let known: BTreeSet<&str> = self.modes.iter().map(|m| m.name.as_str()).collect();
        for name in filter {
            if !known.contains(name.as_str()) {
                return Err(PipelineError::UnknownMode { name: name.clone() });
            }
        }
        Ok(self
            .modes
            .iter()
            .filter(|mode| filter.iter().any(|name| *name == mode.name))
            .cloned()
            .collect())
    }

    fn validate(&self, path: &Utf8Path) -> Result<()> {
        if self.package.trim().is_empty() {
            return Err(PipelineError::InvalidConfig {
                path: path.to_owned(),
                reason: "package name must not be empty".to_owned(),
            });
        }

        let mut seen = BTreeSet::new();
        for mode in &self.modes {
            if !seen.insert(mode.name.as_str()) {
                return Err(PipelineError::InvalidConfig {
                    path: path.to_owned(),
                    reason: format!("duplicate mode name '{}'", mode.name),
                });
            }
            mode.validate_placeholders()?;
        }

        let mut check_names = BTreeSet::new();
        for check in &self.checks {
            if !check_names.insert(check.name.as_str()) {
                return Err(PipelineError::InvalidConfig {
                    path: path.to_owned(),
                    reason: format!("duplicate check name '{}'", check.name),
                });
            }
        }

        if self.bundle.build.is_empty() {
            return Err(PipelineError::InvalidConfig {
                path: path.to_owned(),
                reason: "bundle build command list must not be empty".to_owned(),
            });
        }

        Ok(())
    }
}
