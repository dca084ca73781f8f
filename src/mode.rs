//! Installation-mode records and command-line placeholder rendering.
//!
//! The pipeline's central data model: a typed, ordered list of modes, each
//! declaring how the package is installed, invoked, and uninstalled. The
//! command lines are declarative argv sequences carrying placeholders that
//! are substituted at execution time, once the mode's isolation context is
//! known.

use crate::error::{PipelineError, Result};
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single argv-style executable step.
pub type CommandLine = Vec<String>;

/// The isolation boundary an installation mode requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    /// System-wide install into the ambient host state.
    System,
    /// Per-user install into the ambient host state.
    User,
    /// Editable per-user install into the ambient host state.
    EditableUser,
    /// Install into a freshly provisioned virtual environment.
    Virtualenv,
}

impl Scope {
    /// Whether this scope installs into the shared ambient host state.
    #[must_use]
    pub const fn is_ambient(self) -> bool {
        !matches!(self, Self::Virtualenv)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::System => "system",
            Self::User => "user",
            Self::EditableUser => "editable-user",
            Self::Virtualenv => "virtualenv",
        };
        write!(f, "{name}")
    }
}

/// One way of installing the package under verification.
///
/// Within a given isolation context exactly one mode is installed at a time;
/// a mode's uninstall must fully reverse its install before the next mode
/// sharing that context runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationMode {
    /// Unique mode name, used in progress output and error attribution.
    pub name: String,
    /// Isolation boundary the mode requires.
    pub scope: Scope,
    /// Whether invocation is additionally checked under elevated privilege.
    ///
    /// Elevation changes the caller's privilege level, never the install
    /// target: the elevated check reuses the identical install location as
    /// its non-elevated counterpart.
    #[serde(default)]
    pub elevated: bool,
    /// Steps that install the package.
    pub install: Vec<CommandLine>,
    /// Steps that invoke the installed tool (help/version invocation).
    pub invoke: Vec<CommandLine>,
    /// Steps that fully remove the package again.
    pub uninstall: Vec<CommandLine>,
}

impl InstallationMode {
    /// Validate that `{env}` placeholders only appear in virtualenv modes.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EnvPlaceholderOutsideVirtualenv`] when an
    /// ambient-scoped mode references `{env}`.
    pub fn validate_placeholders(&self) -> Result<()> {
        if self.scope == Scope::Virtualenv {
            return Ok(());
        }
        let uses_env = self
            .install
            .iter()
            .chain(&self.invoke)
            .chain(&self.uninstall)
            .flatten()
            .any(|arg| arg.contains(ENV_PLACEHOLDER));
        if uses_env {
            return Err(PipelineError::EnvPlaceholderOutsideVirtualenv {
                mode: self.name.clone(),
            });
        }
        Ok(())
    }
}

const PACKAGE_PLACEHOLDER: &str = "{package}";
const SOURCE_PLACEHOLDER: &str = "{source}";
const ENV_PLACEHOLDER: &str = "{env}";

/// Values substituted into command-line placeholders at execution time.
#[derive(Debug, Clone, Copy)]
pub struct RenderVars<'a> {
    /// Name of the package under verification.
    pub package: &'a str,
    /// Root of the package's source tree.
    pub source: &'a Utf8Path,
    /// Root of the active virtual environment, when one exists.
    pub env: Option<&'a Utf8Path>,
}

impl RenderVars<'_> {
    /// Substitute placeholders into a single argv element.
    #[must_use]
    pub fn render_arg(&self, arg: &str) -> String {
        let mut rendered = arg
            .replace(PACKAGE_PLACEHOLDER, self.package)
            .replace(SOURCE_PLACEHOLDER, self.source.as_str());
        if let Some(env) = self.env {
            rendered = rendered.replace(ENV_PLACEHOLDER, env.as_str());
        }
        rendered
    }

    /// Substitute placeholders into a whole command line.
    #[must_use]
    pub fn render_argv(&self, argv: &[String]) -> Vec<String> {
        argv.iter().map(|arg| self.render_arg(arg)).collect()
    }
}

/// The canonical installation-mode matrix for a pip-installable package.
///
/// Modes execute in this order: the system-wide install (checked both plain
/// and elevated), the per-user install, the editable per-user install, and
/// finally a fresh virtual environment.
#[must_use]
pub fn default_matrix() -> Vec<InstallationMode> {
    vec![
        InstallationMode {
            name: "system".to_owned(),
            scope: Scope::System,
            elevated: true,
            install: vec![argv(&["sudo", "python3", "-m", "pip", "install", "{source}"])],
            invoke: vec![argv(&["{package}", "-h"])],
            uninstall: vec![argv(&[
                "sudo", "python3", "-m", "pip", "uninstall", "--yes", "{package}",
            ])],
        },
        InstallationMode {
            name: "user".to_owned(),
            scope: Scope::User,
            elevated: false,
            install: vec![argv(&[
                "python3", "-m", "pip", "install", "--user", "{source}",
            ])],
            invoke: vec![argv(&["{package}", "-h"])],
            uninstall: vec![argv(&[
                "python3", "-m", "pip", "uninstall", "--yes", "{package}",
            ])],
        },
        InstallationMode {
            name: "editable-user".to_owned(),
            scope: Scope::EditableUser,
            elevated: false,
            install: vec![argv(&[
                "python3", "-m", "pip", "install", "--user", "--editable", "{source}",
            ])],
            invoke: vec![argv(&["{package}", "-h"])],
            uninstall: vec![argv(&[
                "python3", "-m", "pip", "uninstall", "--yes", "{package}",
            ])],
        },
        InstallationMode {
            name: "virtualenv".to_owned(),
            scope: Scope::Virtualenv,
            elevated: false,
            install: vec![argv(&["{env}/bin/pip", "install", "{source}"])],
            invoke: vec![argv(&["{env}/bin/{package}", "-h"])],
            uninstall: vec![argv(&["{env}/bin/pip", "uninstall", "--yes", "{package}"])],
        },
    ]
}

fn argv(parts: &[&str]) -> CommandLine {
    parts.iter().map(|part| (*part).to_owned()).collect()
}
