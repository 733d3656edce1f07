//! Test driver for argparse integration tests.
//!
//! Spawns `argdump` with a given argv, captures stdout and stderr, and parses
//! the `key=value` dump it prints.

use std::collections::BTreeMap;
use std::process::{Command, Stdio};

/// A completed argdump run.
pub struct DumpRun {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl DumpRun {
    /// Run `binary` with `args` (not including the program name).
    pub fn spawn(binary: &str, args: &[&str]) -> std::io::Result<DumpRun> {
        Self::spawn_with_env(binary, args, &[])
    }

    /// Like `spawn`, with additional environment variables.
    pub fn spawn_with_env(
        binary: &str,
        args: &[&str],
        env: &[(&str, &str)],
    ) -> std::io::Result<DumpRun> {
        let mut cmd = Command::new(binary);
        cmd.args(args);
        // Keep log output out of stderr assertions unless a test asks for it.
        cmd.env_remove("RUST_LOG");
        for (k, v) in env {
            cmd.env(k, v);
        }
        cmd.stdin(Stdio::null());

        let output = cmd.output()?;
        Ok(DumpRun {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Assert the exit code, showing both streams on failure.
    pub fn expect_exit(self, expected_code: i32) -> DumpRun {
        assert_eq!(
            self.code, expected_code,
            "expected exit code {expected_code}, got {}\nstdout:\n{}\nstderr:\n{}",
            self.code, self.stdout, self.stderr
        );
        self
    }

    /// The stdout dump as a map.
    pub fn fields(&self) -> BTreeMap<String, String> {
        parse_dump(&self.stdout)
    }
}

/// Parse `key=value` lines; lines without `=` are skipped.
pub fn parse_dump(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
