//! Project test execution.
//!
//! A [`ProjectTestRunner`] finds the project's test framework, runs it
//! through a [`CommandExecutor`] with a deadline, and reduces the output to
//! pass/fail counts. The orchestrator compares the counts taken before and
//! after a rewrite with [`should_revert`].

mod executor;
mod framework;
mod report;

pub use executor::{resolve_executable, CommandExecutor, CommandOutput, CommandSpec, ProcessExecutor};
pub use framework::{detect_test_framework, test_files, FrameworkDetector, TestFramework};
pub use report::{parse_jest_json, parse_mocha_json, parse_text};

use crate::config::RefactoringConfig;
use crate::errors::{RefactronError, Result};
use serde::Serialize;
use shell_escape::unix::escape;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestFailureDetail {
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TestResult {
    pub passed: usize,
    pub failed: usize,
    pub errors: Vec<TestFailureDetail>,
    pub duration: Duration,
}

impl TestResult {
    pub fn new(passed: usize, failed: usize) -> Self {
        Self {
            passed,
            failed,
            ..Self::default()
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// True when nothing got worse: no fewer passes and no more failures.
pub fn compare_results(before: &TestResult, after: &TestResult) -> bool {
    after.passed >= before.passed && after.failed <= before.failed
}

pub fn should_revert(before: &TestResult, after: &TestResult) -> bool {
    after.failed > before.failed || after.passed < before.passed
}

pub trait TestRunner: Send + Sync {
    /// Run the whole suite, or only `tests` when given.
    fn run_tests(&self, tests: Option<&[PathBuf]>) -> Result<TestResult>;
}

pub struct ProjectTestRunner {
    root: PathBuf,
    framework: Option<TestFramework>,
    timeout: Duration,
    executor: Arc<dyn CommandExecutor>,
}

impl ProjectTestRunner {
    pub fn new(root: impl Into<PathBuf>, config: &RefactoringConfig) -> Self {
        let root = root.into();
        let framework = match &config.test_command {
            Some(command) => Some(TestFramework::Custom(command.clone())),
            None => detect_test_framework(&root),
        };
        Self {
            root,
            framework,
            timeout: config.test_timeout(),
            executor: Arc::new(ProcessExecutor),
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn framework(&self) -> Option<&TestFramework> {
        self.framework.as_ref()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn command(&self, framework: &TestFramework, tests: Option<&[PathBuf]>) -> Result<CommandSpec> {
        let files: Vec<String> = tests
            .unwrap_or_default()
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        let spec = match framework {
            TestFramework::Jest => {
                CommandSpec::new(resolve_executable(&self.root, "jest")?, &self.root, self.timeout)
                    .arg("--json")
            }
            TestFramework::Vitest => {
                CommandSpec::new(resolve_executable(&self.root, "vitest")?, &self.root, self.timeout)
                    .args(["run", "--reporter=json"])
            }
            TestFramework::Mocha => {
                CommandSpec::new(resolve_executable(&self.root, "mocha")?, &self.root, self.timeout)
                    .args(["--reporter", "json"])
            }
            TestFramework::NodeTest => {
                CommandSpec::new(resolve_executable(&self.root, "node")?, &self.root, self.timeout)
                    .args(["--test", "--test-reporter=tap"])
            }
            TestFramework::Custom(command) => {
                // The line goes through `sh -c`, so every path is quoted.
                let line = std::iter::once(command.clone())
                    .chain(files.iter().map(|f| escape(Cow::Borrowed(f.as_str())).into_owned()))
                    .collect::<Vec<_>>()
                    .join(" ");
                return Ok(CommandSpec::new("sh", &self.root, self.timeout).args(["-c".to_string(), line]));
            }
        };
        Ok(spec.args(files))
    }

    fn interpret(&self, framework: &TestFramework, output: &CommandOutput) -> Option<TestResult> {
        let structured = match framework {
            TestFramework::Jest | TestFramework::Vitest => {
                parse_jest_json(&output.stdout, output.duration)
            }
            TestFramework::Mocha => parse_mocha_json(&output.stdout, output.duration),
            TestFramework::NodeTest | TestFramework::Custom(_) => None,
        };
        structured
            .or_else(|| parse_jest_json(&output.stdout, output.duration))
            .or_else(|| parse_text(&output.stdout, output.duration))
            .or_else(|| parse_text(&output.stderr, output.duration))
    }
}

impl TestRunner for ProjectTestRunner {
    fn run_tests(&self, tests: Option<&[PathBuf]>) -> Result<TestResult> {
        let Some(framework) = &self.framework else {
            log::warn!("No test framework found in {}", self.root.display());
            return Ok(TestResult::default());
        };
        let spec = self.command(framework, tests)?;
        log::info!("Running tests: {}", spec.display());
        let output = self.executor.execute(&spec)?;

        match self.interpret(framework, &output) {
            Some(result) => {
                log::info!(
                    "{} passed, {} failed in {:.1}s",
                    result.passed,
                    result.failed,
                    result.duration.as_secs_f64()
                );
                Ok(result)
            }
            None if output.success => {
                log::warn!("Could not read results from `{}`; assuming no tests ran", spec.display());
                Ok(TestResult {
                    duration: output.duration,
                    ..TestResult::default()
                })
            }
            None => {
                let detail = output
                    .stderr
                    .lines()
                    .chain(output.stdout.lines())
                    .find(|l| !l.trim().is_empty())
                    .unwrap_or("no output");
                Err(RefactronError::test_run(format!(
                    "`{}` exited with {:?}: {}",
                    spec.display(),
                    output.exit_code,
                    detail.trim()
                )))
            }
        }
    }
}
