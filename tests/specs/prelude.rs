//! Test helpers for behavioral specifications.
//!
//! Provides a high-level DSL for invoking the `oj` binary black-box and
//! asserting on its stdout/stderr/exit code.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Returns the path to a binary, checking llvm-cov target directory first.
/// This works with both standard builds and llvm-cov coverage runs.
/// Falls back to resolving relative to the test binary itself when
/// CARGO_MANIFEST_DIR is stale (e.g. compiled by a removed worktree
/// into a shared target directory).
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let llvm_cov_path = manifest_dir.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

/// Returns the path to the `oj` CLI binary.
fn oj_binary() -> PathBuf {
    binary_path("oj")
}

/// Returns the path to the `ojd` daemon binary.
pub fn ojd_binary() -> PathBuf {
    binary_path("ojd")
}

/// Returns a Command configured to run the `oj` binary.
pub fn oj_cmd() -> Command {
    Command::new(oj_binary())
}

/// Create a CLI builder for `oj` invocations.
pub fn cli() -> CliBuilder {
    CliBuilder::new()
}

/// High-level CLI builder for fluent test assertions.
pub struct CliBuilder {
    args: Vec<String>,
    dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl CliBuilder {
    fn new() -> Self {
        Self { args: Vec::new(), dir: None, envs: Vec::new() }
    }

    /// Add CLI arguments.
    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Set the working directory.
    pub fn pwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.dir = Some(path.into());
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: &str, value: impl AsRef<Path>) -> Self {
        self.envs.push((key.to_string(), value.as_ref().to_string_lossy().to_string()));
        self
    }

    /// Build the command without running it.
    pub fn command(self) -> Command {
        let mut cmd = oj_cmd();
        cmd.args(&self.args);

        if let Some(dir) = self.dir {
            cmd.current_dir(dir);
        }

        for (key, value) in self.envs {
            cmd.env(key, value);
        }

        cmd
    }

    /// Run and expect success (exit code 0).
    pub fn passes(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("command should run");
        assert!(
            output.status.success(),
            "expected command to pass, got exit code {:?}\nstdout: {}\nstderr: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    /// Run and expect failure (non-zero exit code).
    pub fn fails(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("command should run");
        assert!(
            !output.status.success(),
            "expected command to fail, but it passed\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    /// Run without any expectation on the exit code.
    pub fn run(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("command should run");
        RunAssert { output }
    }
}

/// Result of a CLI run for chaining assertions.
pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    /// Get stdout as a string.
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    /// Get stderr as a string.
    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    /// Get the process exit code, if the process did not terminate by signal.
    pub fn exit_code(&self) -> Option<i32> {
        self.output.status.code()
    }

    /// Assert the exit code equals `expected`.
    pub fn exit_code_eq(self, expected: i32) -> Self {
        assert_eq!(self.exit_code(), Some(expected), "stderr: {}", self.stderr());
        self
    }

    /// Assert stdout equals expected exactly (with diff on failure).
    pub fn stdout_eq(self, expected: &str) -> Self {
        let stdout = self.stdout();
        similar_asserts::assert_eq!(stdout, expected);
        self
    }

    /// Assert stderr equals expected exactly (with diff on failure).
    pub fn stderr_eq(self, expected: &str) -> Self {
        let stderr = self.stderr();
        similar_asserts::assert_eq!(stderr, expected);
        self
    }

    /// Assert stdout contains a substring.
    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(stdout.contains(expected), "stdout does not contain '{expected}'\nstdout: {stdout}");
        self
    }

    /// Assert stdout does not contain a substring.
    pub fn stdout_lacks(self, unexpected: &str) -> Self {
        let stdout = self.stdout();
        assert!(!stdout.contains(unexpected), "stdout should not contain '{unexpected}'\nstdout: {stdout}");
        self
    }

    /// Assert stderr contains a substring.
    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(stderr.contains(expected), "stderr does not contain '{expected}'\nstderr: {stderr}");
        self
    }

    /// Assert stderr does not contain a substring.
    pub fn stderr_lacks(self, unexpected: &str) -> Self {
        let stderr = self.stderr();
        assert!(!stderr.contains(unexpected), "stderr should not contain '{unexpected}'\nstderr: {stderr}");
        self
    }
}

// =============================================================================
// Project
// =============================================================================

/// Temporary test project directory with helper methods.
pub struct Project {
    dir: tempfile::TempDir,
    /// Isolated state directory for this test (`OJ_STATE_DIR`).
    state_dir: tempfile::TempDir,
}

impl Project {
    /// Create an empty project.
    pub fn empty() -> Self {
        Self { dir: tempfile::tempdir().unwrap(), state_dir: tempfile::tempdir().unwrap() }
    }

    /// Get the project path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Initialize a git repository with an initial commit, as every story
    /// workspace is branched from the repo's current HEAD.
    pub fn git_init(&self) {
        let run = |args: &[&str]| {
            Command::new("git")
                .args(args)
                .current_dir(self.path())
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .status()
                .expect("git should run")
        };
        run(&["init", "-q", "-b", "main"]);
        run(&["config", "user.email", "test@example.com"]);
        run(&["config", "user.name", "Test"]);
        self.file("README.md", "hello\n");
        run(&["add", "."]);
        run(&["commit", "-q", "-m", "init"]);
    }

    /// Write a file at the given path (parent directories created automatically).
    pub fn file(&self, path: impl AsRef<Path>, content: &str) {
        let full_path = self.dir.path().join(path.as_ref());
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full_path, content).unwrap();
    }

    /// Get the isolated state directory path.
    pub fn state_path(&self) -> &Path {
        self.state_dir.path()
    }

    /// Read the persisted state document, once a run has produced one.
    pub fn state_document(&self) -> String {
        std::fs::read_to_string(self.state_path().join("state.json")).expect("state.json should exist")
    }

    /// Run the `oj` command in this project's context.
    pub fn oj(&self) -> CliBuilder {
        cli().pwd(self.path()).env("OJ_STATE_DIR", self.state_path()).env("OJ_PARALLELISM", "1")
    }
}

/// A single-story manifest with no dependencies, used by tests that only
/// care about the CLI surface rather than multi-story scheduling.
pub const MINIMAL_MANIFEST: &str = r#"{
  "stories": [
    {
      "id": "s1",
      "title": "Add a health check endpoint",
      "description": "Expose GET /healthz returning 200 OK.",
      "acceptance_criteria": ["GET /healthz returns 200"],
      "depends_on": []
    }
  ]
}"#;

/// Two stories with a dependency cycle between them, used to verify the
/// orchestrator aborts startup before any state is written (§4.5, §8).
pub const CYCLIC_MANIFEST: &str = r#"{
  "stories": [
    { "id": "a", "title": "A", "description": "", "depends_on": ["b"] },
    { "id": "b", "title": "B", "description": "", "depends_on": ["a"] }
  ]
}"#;
