//! Static-analysis gate runner.
//!
//! Gates are thin wrappers over external tools with an exit-code contract
//! (zero is a pass, anything else is a fail with stdout/stderr as the
//! diagnostics), plus one built-in check: a prohibited-character scan that
//! rejects literal tab characters in the source tree. The first failing
//! check halts the pipeline; nothing is retried.

use crate::error::{PipelineError, Result};
use crate::exec::{CommandExecutor, CommandSpec, diagnostics};
use crate::mode::{CommandLine, RenderVars};
use camino::Utf8Path;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Which pipeline stage a check belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GateStage {
    /// Import-order, lint, and prohibited-character checks.
    #[default]
    Lint,
    /// Static type-checking.
    TypeCheck,
}

impl fmt::Display for GateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lint => write!(f, "lint"),
            Self::TypeCheck => write!(f, "type-check"),
        }
    }
}

/// How a check is performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckKind {
    /// Run an external command; non-zero exit fails the check.
    Command(CommandLine),
    /// Scan the source tree for literal tab characters.
    TabScan {
        /// File-name suffixes selecting which files are scanned.
        suffixes: Vec<String>,
    },
}

/// A single named static check.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawCheck")]
pub struct Check {
    /// Unique check name, used in error attribution.
    pub name: String,
    /// Stage the check runs in.
    pub stage: GateStage,
    /// How the check is performed.
    pub kind: CheckKind,
}

/// Serialised form of a check before validation.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCheck {
    name: String,
    #[serde(default)]
    stage: GateStage,
    command: Option<CommandLine>,
    builtin: Option<BuiltinCheck>,
    suffixes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum BuiltinCheck {
    TabScan,
}

impl TryFrom<RawCheck> for Check {
    type Error = String;

    fn try_from(raw: RawCheck) -> std::result::Result<Self, String> {
        let kind = match (raw.command, raw.builtin) {
            (Some(command), None) => {
                if command.is_empty() {
                    return Err(format!("check '{}' has an empty command", raw.name));
                }
                CheckKind::Command(command)
            }
            (None, Some(BuiltinCheck::TabScan)) => CheckKind::TabScan {
                suffixes: raw.suffixes.unwrap_or_else(default_tab_suffixes),
            },
            (Some(_), Some(_)) => {
                return Err(format!(
                    "check '{}' declares both a command and a builtin",
                    raw.name
                ));
            }
            (None, None) => {
                return Err(format!(
                    "check '{}' declares neither a command nor a builtin",
                    raw.name
                ));
            }
        };
        Ok(Self {
            name: raw.name,
            stage: raw.stage,
            kind,
        })
    }
}

fn default_tab_suffixes() -> Vec<String> {
    vec![".py".to_owned()]
}

/// The default gate list: import order, lint, tab scan, and two independent
/// type-checkers.
#[must_use]
pub fn default_checks() -> Vec<Check> {
    fn argv(parts: &[&str]) -> CommandLine {
        parts.iter().map(|part| (*part).to_owned()).collect()
    }

    vec![
        Check {
            name: "import-order".to_owned(),
            stage: GateStage::Lint,
            kind: CheckKind::Command(argv(&["python3", "-m", "isort", "--check-only", "{source}"])),
        },
        Check {
            name: "lint".to_owned(),
            stage: GateStage::Lint,
            kind: CheckKind::Command(argv(&["python3", "-m", "pyflakes", "{source}"])),
        },
        Check {
            name: "tabs".to_owned(),
            stage: GateStage::Lint,
            kind: CheckKind::TabScan {
                suffixes: default_tab_suffixes(),
            },
        },
        Check {
            name: "typecheck-mypy".to_owned(),
            stage: GateStage::TypeCheck,
            kind: CheckKind::Command(argv(&["python3", "-m", "mypy", "{source}"])),
        },
        Check {
            name: "typecheck-pyright".to_owned(),
            stage: GateStage::TypeCheck,
            kind: CheckKind::Command(argv(&["pyright", "{source}"])),
        },
    ]
}

/// Run every check belonging to `stage`, in declaration order.
///
/// # Errors
///
/// Returns [`PipelineError::Gate`] for the first failing check, carrying the
/// wrapped tool's diagnostics verbatim, or the tab scan's `file:line`
/// location. Command spawn failures and timeouts propagate unchanged.
pub fn run_gate_stage(
    executor: &dyn CommandExecutor,
    checks: &[Check],
    stage: GateStage,
    vars: &RenderVars<'_>,
    timeout: Duration,
) -> Result<()> {
    for check in checks.iter().filter(|check| check.stage == stage) {
        run_check(executor, check, vars, timeout)?;
    }
    Ok(())
}

fn run_check(
    executor: &dyn CommandExecutor,
    check: &Check,
    vars: &RenderVars<'_>,
    timeout: Duration,
) -> Result<()> {
    match &check.kind {
        CheckKind::Command(argv) => {
            let spec = CommandSpec::from_argv(&vars.render_argv(argv), timeout);
            let output = executor.run(&spec)?;
            if output.status.success() {
                Ok(())
            } else {
                Err(PipelineError::Gate {
                    check: check.name.clone(),
                    diagnostics: diagnostics(&output),
                })
            }
        }
        CheckKind::TabScan { suffixes } => match scan_for_tabs(vars.source, suffixes)? {
            None => Ok(()),
            Some(location) => Err(PipelineError::Gate {
                check: check.name.clone(),
                diagnostics: location,
            }),
        },
    }
}

/// Scan the tree rooted at `root` for a literal tab character.
///
/// Only files whose names end in one of `suffixes` are inspected; hidden
/// directories and build scratch directories are skipped. Returns the
/// `file:line` location of the first offending line, traversing entries in
/// sorted order so the result is deterministic.
///
/// # Errors
///
/// Returns an error if a directory or file cannot be read.
pub fn scan_for_tabs(root: &Utf8Path, suffixes: &[String]) -> Result<Option<String>> {
    let mut entries: Vec<_> = root.read_dir_utf8()?.collect::<std::io::Result<_>>()?;
    entries.sort_by(|a, b| a.file_name().cmp(b.file_name()));

    for entry in entries {
        let name = entry.file_name();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if name.starts_with('.') || name == "target" || name == "builddir" {
                continue;
            }
            if let Some(location) = scan_for_tabs(entry.path(), suffixes)? {
                return Ok(Some(location));
            }
        } else if file_type.is_file() && suffixes.iter().any(|suffix| name.ends_with(suffix)) {
            let contents = std::fs::read(entry.path())?;
            let text = String::from_utf8_lossy(&contents);
            for (index, line) in text.lines().enumerate() {
                if line.contains('\t') {
                    return Ok(Some(format!("{}:{}", entry.path(), index + 1)));
                }
            }
        }
    }
    Ok(None)
}
