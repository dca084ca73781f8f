//! Error types for the verification pipeline.
//!
//! This module defines semantic error variants covering every stage of the
//! pipeline. Each variant names the failing stage or mode so that a failure
//! is attributable to exactly one place, and carries the wrapped command's
//! diagnostic output verbatim.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur during a pipeline run.
///
/// Every variant is fatal at the pipeline level; nothing is retried. Local
/// recovery is limited to best-effort uninstall of an in-flight mode before
/// the error propagates.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A static-analysis check failed.
    #[error("static gate '{check}' failed: {diagnostics}")]
    Gate {
        /// Name of the failing check.
        check: String,
        /// Diagnostic output from the check.
        diagnostics: String,
    },

    /// The unit-test suite failed.
    #[error("unit tests failed: {summary}")]
    Test {
        /// Tail of the test runner's output.
        summary: String,
    },

    /// An installation command exited non-zero.
    #[error("install failed for mode '{mode}': {reason}")]
    Install {
        /// Name of the failing installation mode.
        mode: String,
        /// Description of the failure, including command diagnostics.
        reason: String,
    },

    /// An installed tool could not be invoked.
    #[error("invocation failed for mode '{mode}': {reason}")]
    Invocation {
        /// Name of the failing installation mode.
        mode: String,
        /// Description of the failure, including command diagnostics.
        reason: String,
    },

    /// An uninstall command exited non-zero.
    #[error("uninstall failed for mode '{mode}': {reason}")]
    Uninstall {
        /// Name of the failing installation mode.
        mode: String,
        /// Description of the failure, including command diagnostics.
        reason: String,
    },

    /// A wrapped command did not finish within the configured timeout.
    #[error("command '{program}' timed out after {limit_secs} seconds")]
    Timeout {
        /// Program that was killed.
        program: String,
        /// Timeout limit that was exceeded, in seconds.
        limit_secs: u64,
    },

    /// Building or verifying the self-contained bundle failed.
    #[error("bundle verification failed: {reason}")]
    Bundle {
        /// Description of the failure.
        reason: String,
    },

    /// The configuration file was not found at the expected location.
    #[error("configuration file not found at {path}")]
    ConfigNotFound {
        /// Path where the file was expected.
        path: Utf8PathBuf,
    },

    /// The configuration file could not be parsed or is inconsistent.
    #[error("invalid configuration at {path}: {reason}")]
    InvalidConfig {
        /// Path to the offending configuration file.
        path: Utf8PathBuf,
        /// Description of the problem.
        reason: String,
    },

    /// A mode named on the command line does not exist in the configuration.
    #[error("unknown installation mode '{name}'")]
    UnknownMode {
        /// The unrecognised mode name.
        name: String,
    },

    /// A `{env}` placeholder was used outside a virtualenv-scoped mode.
    #[error("mode '{mode}' uses the {{env}} placeholder but is not virtualenv-scoped")]
    EnvPlaceholderOutsideVirtualenv {
        /// Name of the offending mode.
        mode: String,
    },

    /// An isolation environment could not be provisioned.
    #[error("failed to provision isolation environment: {reason}")]
    Isolation {
        /// Description of the provisioning failure.
        reason: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

/// Result type alias using [`PipelineError`].
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_error_names_check_and_diagnostics() {
        let err = PipelineError::Gate {
            check: "tabs".to_owned(),
            diagnostics: "src/cli.py:41".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("tabs"));
        assert!(msg.contains("src/cli.py:41"));
    }

    #[test]
    fn invocation_error_names_mode() {
        let err = PipelineError::Invocation {
            mode: "editable-user".to_owned(),
            reason: "exit status 2".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("editable-user"));
        assert!(msg.contains("exit status 2"));
    }

    #[test]
    fn timeout_error_names_program_and_limit() {
        let err = PipelineError::Timeout {
            program: "pip".to_owned(),
            limit_secs: 600,
        };
        let msg = err.to_string();
        assert!(msg.contains("pip"));
        assert!(msg.contains("600"));
    }

    #[test]
    fn env_placeholder_error_names_mode() {
        let err = PipelineError::EnvPlaceholderOutsideVirtualenv {
            mode: "system".to_owned(),
        };
        assert!(err.to_string().contains("system"));
    }
}
