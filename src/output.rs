//! Progress and summary output for the pipeline CLI.
//!
//! Progress goes to stderr so that stdout stays reserved for the optional
//! machine-readable report.

use crate::pipeline::PipelineReport;
use std::io::Write;

/// Write one line to the given stderr sink, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Format a human-readable summary of a completed pipeline run.
#[must_use]
pub fn summary_human(report: &PipelineReport) -> String {
    let mut text = format!(
        "All stages passed for package '{}' ({} stage(s), {} mode(s)).",
        report.package,
        report.stages_passed.len(),
        report.modes.len()
    );
    for outcome in &report.modes {
        text.push_str(&format!(
            "\n  - {}: {} invocation check(s)",
            outcome.name, outcome.invocation_checks
        ));
    }
    if let Some(bundle) = &report.bundle {
        text.push_str(&format!(
            "\n  - bundle: {} (sha256 {})",
            bundle.output_path, bundle.digest
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::BundleSummary;
    use crate::matrix::ModeOutcome;
    use crate::pipeline::ExecutionStage;
    use camino::Utf8PathBuf;

    #[test]
    fn write_stderr_line_appends_newline() {
        let mut sink = Vec::new();
        write_stderr_line(&mut sink, "hello");
        assert_eq!(sink, b"hello\n");
    }

    #[test]
    fn summary_lists_modes_and_bundle() {
        let report = PipelineReport {
            package: "tool".to_owned(),
            stages_passed: vec![
                ExecutionStage::Lint,
                ExecutionStage::TypeCheck,
                ExecutionStage::UnitTest,
                ExecutionStage::InstallVerify,
                ExecutionStage::BundleVerify,
            ],
            modes: vec![ModeOutcome {
                name: "system".to_owned(),
                invocation_checks: 2,
            }],
            bundle: Some(BundleSummary {
                output_path: Utf8PathBuf::from("/src/tool/builddir/tool"),
                digest: "ab".repeat(32),
            }),
        };

        let text = summary_human(&report);
        assert!(text.contains("package 'tool'"));
        assert!(text.contains("system: 2 invocation check(s)"));
        assert!(text.contains("builddir/tool"));
    }
}
