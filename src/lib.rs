//! Installation-matrix verification pipeline.
//!
//! This crate provides the core functionality for verifying that a
//! command-line package installs, runs, and uninstalls correctly across
//! every supported installation mode, after passing static-analysis and
//! unit-test gates. It is used by the `gauntlet` CLI binary and can be
//! consumed programmatically with a custom [`exec::CommandExecutor`].
//!
//! # Modules
//!
//! - [`bundle`] - Self-contained bundle building and verification
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Semantic error types attributing failures to one stage
//! - [`exec`] - Command execution seam with per-command timeouts
//! - [`gates`] - Static-analysis gate runner
//! - [`isolation`] - Isolation-context provisioning and teardown
//! - [`matrix`] - The installation-mode executor
//! - [`mode`] - Installation-mode records and placeholder rendering
//! - [`output`] - Progress and summary formatting
//! - [`pipeline`] - Stage sequencing
//! - [`testsuite`] - Unit-test stage runner

pub mod bundle;
pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod gates;
pub mod isolation;
pub mod matrix;
pub mod mode;
pub mod output;
pub mod pipeline;
pub mod testsuite;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
