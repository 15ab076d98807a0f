use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::debug;

use crate::config::CoverMode;
use crate::error::{DeepcoverError, DeepcoverResult};
use crate::loader::Locator;
use crate::util::{command_line, stderr_tail};

/// When set, no `go` process runs: `go test` is skipped and the function
/// summary is read from this file.
pub const FAKE_COVER_FUNC_ENV: &str = "DEEPCOVER_FAKE_COVER_FUNC";

/// Arguments of one `go test` run with coverage.
#[derive(Debug, Clone)]
pub struct TestInvocation<'a> {
    pub locator: &'a Locator,
    pub regex: &'a str,
    pub profile: &'a Path,
    pub mode: CoverMode,
    pub packages: &'a [String],
    pub extra_args: &'a [String],
}

impl TestInvocation<'_> {
    /// `test -run <regex> -coverprofile=<p> -covermode=<m> -coverpkg=<pkgs> [extra] <pattern>`
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "test".to_string(),
            "-run".to_string(),
            self.regex.to_string(),
            format!("-coverprofile={}", self.profile.display()),
            format!("-covermode={}", self.mode),
            format!("-coverpkg={}", self.packages.join(",")),
        ];
        args.extend(self.extra_args.iter().cloned());
        args.push(self.locator.pattern.clone());
        args
    }
}

/// The external test runner and coverage summarizer.
pub trait Toolchain: Send + Sync {
    /// Run the tests, writing a coverage profile to `invocation.profile`.
    fn run_tests(&self, invocation: &TestInvocation<'_>) -> DeepcoverResult<()>;

    /// Per-function summary text of `profile`.
    fn summarize(&self, locator: &Locator, profile: &Path) -> DeepcoverResult<String>;

    fn name(&self) -> &'static str;
}

/// Toolchain backed by the `go` binary.
pub struct GoToolchain {
    go: PathBuf,
}

impl GoToolchain {
    pub fn new(go: impl Into<PathBuf>) -> Self {
        Self { go: go.into() }
    }

    fn run(&self, class: &str, locator: &Locator, args: &[String]) -> DeepcoverResult<Output> {
        let mut cmd = Command::new(&self.go);
        cmd.args(args);
        locator.apply(&mut cmd);
        debug!(command = %command_line(&cmd), "running toolchain");

        let output = cmd.output().map_err(|e| DeepcoverError::Invocation {
            command: class.to_string(),
            detail: format!("failed to spawn {}: {e}", self.go.display()),
        })?;
        if !output.status.success() {
            // `go test` reports failing tests on stdout.
            let mut tail = stderr_tail(&output.stderr);
            if tail.is_empty() {
                tail = stderr_tail(&output.stdout);
            }
            return Err(DeepcoverError::Invocation {
                command: class.to_string(),
                detail: format!("exited with {}: {tail}", output.status),
            });
        }
        Ok(output)
    }
}

impl Default for GoToolchain {
    fn default() -> Self {
        Self::new("go")
    }
}

impl Toolchain for GoToolchain {
    fn run_tests(&self, invocation: &TestInvocation<'_>) -> DeepcoverResult<()> {
        if std::env::var_os(FAKE_COVER_FUNC_ENV).is_some() {
            debug!(packages = invocation.packages.len(), "skipping go test, summary is faked");
            return Ok(());
        }
        self.run("go test", invocation.locator, &invocation.args()).map(|_| ())
    }

    fn summarize(&self, locator: &Locator, profile: &Path) -> DeepcoverResult<String> {
        if let Some(fake) = std::env::var_os(FAKE_COVER_FUNC_ENV) {
            let path = PathBuf::from(fake);
            return fs::read_to_string(&path).map_err(|e| DeepcoverError::io_path("read", &path, e));
        }
        let args =
            vec!["tool".to_string(), "cover".to_string(), format!("-func={}", profile.display())];
        let output = self.run("go tool cover", locator, &args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn name(&self) -> &'static str {
        "go"
    }
}
