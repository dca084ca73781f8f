//! Self-contained bundle building and verification.
//!
//! The bundle is the one artifact that bypasses the installation-mode
//! matrix entirely: it is built once per pipeline run from the source tree
//! and verified by direct invocation, independent of any installed package
//! state. The produced file's SHA-256 digest is recorded so a run's output
//! can be compared against a later rebuild of the same tree.

use crate::config::BundleConfig;
use crate::error::{PipelineError, Result};
use crate::exec::{CommandExecutor, CommandSpec, diagnostics};
use crate::mode::RenderVars;
use camino::Utf8PathBuf;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::{Duration, SystemTime};

/// A built self-contained executable bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    /// Path of the produced executable.
    pub output_path: Utf8PathBuf,
    /// Wall-clock time the build completed.
    pub built_at: SystemTime,
    /// Lowercase hex SHA-256 digest of the produced file.
    pub digest: String,
}

/// Bundle facts carried into the pipeline report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleSummary {
    /// Path of the produced executable.
    pub output_path: Utf8PathBuf,
    /// Lowercase hex SHA-256 digest of the produced file.
    pub digest: String,
}

impl From<&Bundle> for BundleSummary {
    fn from(bundle: &Bundle) -> Self {
        Self {
            output_path: bundle.output_path.clone(),
            digest: bundle.digest.clone(),
        }
    }
}

/// Build the bundle from the source tree.
///
/// The output path is deterministic for a given source tree; only the
/// digest and timestamp vary with the tree's contents.
///
/// # Errors
///
/// Returns [`PipelineError::Bundle`] when a build step exits non-zero or
/// the configured output file is missing afterwards.
pub fn build(
    executor: &dyn CommandExecutor,
    config: &BundleConfig,
    vars: &RenderVars<'_>,
    timeout: Duration,
) -> Result<Bundle> {
    for step in &config.build {
        let spec = CommandSpec::from_argv(&vars.render_argv(step), timeout);
        let output = executor.run(&spec)?;
        if !output.status.success() {
            return Err(PipelineError::Bundle {
                reason: format!(
                    "build step '{}' failed: {}",
                    spec.display_line(),
                    diagnostics(&output)
                ),
            });
        }
    }

    let output_path = Utf8PathBuf::from(vars.render_arg(&config.output));
    if !output_path.exists() {
        return Err(PipelineError::Bundle {
            reason: format!("build produced no file at {output_path}"),
        });
    }

    Ok(Bundle {
        digest: file_digest(&output_path)?,
        output_path,
        built_at: SystemTime::now(),
    })
}

/// Verify the bundle by invoking it directly, with no install step.
///
/// # Errors
///
/// Returns [`PipelineError::Bundle`] when the invocation exits non-zero.
pub fn verify(
    executor: &dyn CommandExecutor,
    bundle: &Bundle,
    invoke_args: &[String],
    vars: &RenderVars<'_>,
    timeout: Duration,
) -> Result<()> {
    let mut argv = vec![bundle.output_path.to_string()];
    argv.extend(vars.render_argv(invoke_args));
    let spec = CommandSpec::from_argv(&argv, timeout);
    let output = executor.run(&spec)?;
    if output.status.success() {
        return Ok(());
    }
    Err(PipelineError::Bundle {
        reason: format!(
            "bundle invocation '{}' failed: {}",
            spec.display_line(),
            diagnostics(&output)
        ),
    })
}

/// Compute the lowercase hex SHA-256 digest of a file.
fn file_digest(path: &camino::Utf8Path) -> Result<String> {
    let contents = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&contents);
    let digest = hasher.finalize();
    Ok(digest.iter().map(|byte| format!("{byte:02x}")).collect())
}
