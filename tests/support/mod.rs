//! Shared helpers for integration tests.

use camino::Utf8PathBuf;
use gauntlet::error::Result;
use gauntlet::exec::{CommandExecutor, CommandSpec};
use gauntlet::test_utils::success_output;
use std::cell::RefCell;
use std::process::Output;

/// Executor that lets every command succeed and records each argv.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: RefCell<Vec<Vec<String>>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded argvs, in invocation order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn run(&self, spec: &CommandSpec) -> Result<Output> {
        let mut argv = vec![spec.program.clone()];
        argv.extend(spec.args.iter().cloned());
        self.calls.borrow_mut().push(argv);
        Ok(success_output())
    }
}

/// Create a temporary directory and return it with its UTF-8 path.
pub fn temp_tree() -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
        .expect("temp path should be UTF-8");
    (dir, root)
}
