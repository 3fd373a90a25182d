//! Helpers for running the `dirwatch` binary

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// `dirwatch` with an isolated config directory
pub struct Dirwatch {
    config_home: TempDir,
}

impl Dirwatch {
    pub fn new() -> Self {
        Self {
            config_home: TempDir::new().unwrap(),
        }
    }

    pub fn config_home(&self) -> &Path {
        self.config_home.path()
    }

    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_dirwatch"))
            .args(args)
            .env("XDG_CONFIG_HOME", self.config_home.path())
            .env_remove("RUST_LOG")
            .output()
            .expect("failed to run dirwatch")
    }

    /// Run and return stdout, failing the test on a non-zero exit
    pub fn stdout(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "dirwatch {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    }
}
