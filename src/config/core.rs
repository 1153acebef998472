use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::thresholds::DetectionThresholds;
use crate::errors::{RefactronError, Result};

/// Root configuration for the refactoring engine.
///
/// Every option accepts its snake_case name and the camelCase name used by
/// JavaScript tooling (`requireTests`, `safeMode`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefactoringConfig {
    #[serde(flatten)]
    pub thresholds: DetectionThresholds,

    /// Consult the external naming assistant
    #[serde(default, alias = "aiEnabled")]
    pub ai_enabled: bool,

    /// Name of the naming assistant provider
    #[serde(default, alias = "aiProvider")]
    pub ai_provider: Option<String>,

    /// Run the test suite before and after every rewrite
    #[serde(default = "default_true", alias = "requireTests")]
    pub require_tests: bool,

    /// Discard a rewrite automatically when tests regress
    #[serde(default = "default_true", alias = "autoRevert")]
    pub auto_revert: bool,

    /// Refuse to apply anything when no tests are found
    #[serde(default, alias = "safeMode")]
    pub safe_mode: bool,

    /// Roll a whole batch back when any step fails
    #[serde(default = "default_true", alias = "atomicRefactoring")]
    pub atomic_refactoring: bool,

    /// Test command timeout in seconds
    #[serde(
        default = "default_test_timeout",
        alias = "testTimeout",
        alias = "test_timeout"
    )]
    pub test_timeout_secs: u64,

    /// Explicit test command, overriding framework detection
    #[serde(default, alias = "testCommand")]
    pub test_command: Option<String>,
}

impl Default for RefactoringConfig {
    fn default() -> Self {
        Self {
            thresholds: DetectionThresholds::default(),
            ai_enabled: false,
            ai_provider: None,
            require_tests: true,
            auto_revert: true,
            safe_mode: false,
            atomic_refactoring: true,
            test_timeout_secs: default_test_timeout(),
            test_command: None,
        }
    }
}

impl RefactoringConfig {
    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_secs)
    }

    /// Reject out-of-range values. The first problem found is reported.
    pub fn validate(&self) -> Result<()> {
        let mut problems = self.thresholds.problems();
        if self.test_timeout_secs == 0 {
            problems.push(("test_timeout_secs", "must be at least 1 second".to_string()));
        }
        if let Some(command) = &self.test_command {
            if command.trim().is_empty() {
                problems.push(("test_command", "must not be empty".to_string()));
            }
        }
        match problems.into_iter().next() {
            Some((field, message)) => Err(RefactronError::config_with_field(
                format!("{} {}", field, message),
                field,
            )),
            None => {
                if self.ai_enabled && self.ai_provider.is_none() {
                    log::warn!("ai_enabled is set without ai_provider; heuristic naming will be used");
                }
                Ok(())
            }
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_test_timeout() -> u64 {
    300
}
