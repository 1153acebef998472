//! Unified error type for refactoring operations.
//!
//! Every failure the engine can report is a [`RefactronError`] variant:
//! - `Syntax`: source or proposed code fails to parse
//! - `NamingConflict`: a rename target collides with an existing binding
//! - `ValidationFailed`: aggregate of syntax and naming issues
//! - `TransformationFailed`: a transformer could not perform its rewrite
//! - `TestFailure`: tests regressed after a rewrite (drives automatic revert)
//! - `NoTestsFound`: no test framework or tests were discovered
//! - `TestRun`: the test command could not be executed or timed out
//! - `Config`, `Io`, `Unknown`
//!
//! Each error exposes a machine-readable [`ErrorCode`], structured context,
//! and recovery suggestions so callers can act on it without parsing messages.
//!
//! # Error Codes
//!
//! - R001-R009: I/O errors
//! - R010-R019: Syntax errors
//! - R020-R029: Naming conflicts
//! - R030-R039: Validation errors
//! - R040-R049: Transformation errors
//! - R050-R059: Test errors
//! - R060-R069: Configuration errors
//! - R099: Unknown errors
//!
//! # Example
//!
//! ```rust
//! use refactron::errors::{ErrorCode, RefactronError};
//!
//! let err = RefactronError::naming_conflict("value", "local 'f'");
//! assert_eq!(err.code(), ErrorCode::NAMING_CONFLICT);
//! assert!(err.is_recoverable());
//! ```

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Structured error code for documentation and programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ErrorCode(&'static str);

impl ErrorCode {
    /// I/O error - generic
    pub const IO_GENERIC: ErrorCode = ErrorCode("R001");

    /// Syntax error in source or proposed code
    pub const SYNTAX: ErrorCode = ErrorCode("R010");

    /// Candidate name collides with an existing binding
    pub const NAMING_CONFLICT: ErrorCode = ErrorCode("R020");
    /// Candidate name is reserved or not a valid identifier
    pub const NAMING_RESERVED: ErrorCode = ErrorCode("R021");

    /// Validation failed with one or more issues
    pub const VALIDATION_FAILED: ErrorCode = ErrorCode("R030");

    /// Transformer could not perform the rewrite
    pub const TRANSFORMATION_FAILED: ErrorCode = ErrorCode("R040");
    /// Requested refactoring type or strategy has no transformer
    pub const UNSUPPORTED_STRATEGY: ErrorCode = ErrorCode("R041");
    /// Consolidation found no repeated conditional logic
    pub const NO_REPEATED_CONDITION: ErrorCode = ErrorCode("R042");
    /// Transformer could not locate its target node
    pub const TARGET_NOT_FOUND: ErrorCode = ErrorCode("R043");

    /// Tests regressed after a rewrite
    pub const TEST_FAILURE: ErrorCode = ErrorCode("R050");
    /// No tests were discovered for the project
    pub const NO_TESTS_FOUND: ErrorCode = ErrorCode("R051");
    /// Test command could not be executed
    pub const TEST_RUN: ErrorCode = ErrorCode("R052");
    /// Test command exceeded its timeout
    pub const TEST_TIMEOUT: ErrorCode = ErrorCode("R053");

    /// Configuration error - invalid value
    pub const CONFIG_INVALID: ErrorCode = ErrorCode("R060");

    /// Unexpected failure caught at the orchestrator boundary
    pub const UNKNOWN: ErrorCode = ErrorCode("R099");

    /// Get the error code string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for refactoring operations.
#[derive(Debug, Clone, Error)]
pub enum RefactronError {
    /// Input or output code fails to parse.
    #[error("[{code}] Syntax error in {}: {message}{}", display_path(.file), format_position(.line, .column))]
    Syntax {
        code: ErrorCode,
        message: String,
        file: PathBuf,
        line: Option<usize>,
        column: Option<usize>,
    },

    /// A rename would collide with an existing or reserved name.
    #[error("[{code}] Naming conflict: '{name}' in {scope}: {message}")]
    NamingConflict {
        code: ErrorCode,
        name: String,
        scope: String,
        message: String,
    },

    /// Static validation rejected the proposed code.
    #[error("[{code}] Validation failed with {} issue(s){}", issue_count(.issues), format_issues(.issues))]
    ValidationFailed { code: ErrorCode, issues: Vec<String> },

    /// A transformer could not perform its rewrite.
    #[error("[{code}] {refactoring} transformation failed: {message}")]
    TransformationFailed {
        code: ErrorCode,
        refactoring: String,
        message: String,
    },

    /// Tests regressed after applying a rewrite.
    #[error(
        "[{code}] Tests regressed: {passed_before} passed/{failed_before} failed before, \
         {passed_after} passed/{failed_after} failed after"
    )]
    TestFailure {
        code: ErrorCode,
        passed_before: usize,
        failed_before: usize,
        passed_after: usize,
        failed_after: usize,
    },

    /// No tests were discovered for the project.
    #[error("[{code}] No tests found: {message}")]
    NoTestsFound { code: ErrorCode, message: String },

    /// The test command could not be executed or did not finish in time.
    #[error("[{code}] Test run error: {message}")]
    TestRun { code: ErrorCode, message: String },

    /// Configuration errors.
    #[error("[{code}] Configuration error: {message}{}", format_field(.field))]
    Config {
        code: ErrorCode,
        message: String,
        field: Option<String>,
    },

    /// I/O errors.
    #[error("[{code}] I/O error: {message}{}", format_path(.path))]
    Io {
        code: ErrorCode,
        message: String,
        path: Option<PathBuf>,
    },

    /// Unexpected failure caught at the orchestrator boundary.
    #[error("[{code}] Unexpected error: {message}")]
    Unknown { code: ErrorCode, message: String },
}

fn display_path(path: &std::path::Path) -> std::path::Display<'_> {
    path.display()
}

fn format_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" (path: {})", p.display()))
        .unwrap_or_default()
}

fn format_field(field: &Option<String>) -> String {
    field
        .as_ref()
        .map(|f| format!(" (field: {})", f))
        .unwrap_or_default()
}

fn format_position(line: &Option<usize>, column: &Option<usize>) -> String {
    match (line, column) {
        (Some(l), Some(c)) => format!(" at line {}, column {}", l, c),
        (Some(l), None) => format!(" at line {}", l),
        _ => String::new(),
    }
}

fn issue_count(issues: &[String]) -> usize {
    issues.len()
}

fn format_issues(issues: &[String]) -> String {
    let mut out = String::new();
    for (i, issue) in issues.iter().take(3).enumerate() {
        out.push_str(&format!("\n  {}. {}", i + 1, issue));
    }
    if issues.len() > 3 {
        out.push_str(&format!("\n  ... and {} more", issues.len() - 3));
    }
    out
}

/// Result type alias using [`RefactronError`].
pub type Result<T> = std::result::Result<T, RefactronError>;

impl RefactronError {
    // ==========================================================================
    // Constructor Methods
    // ==========================================================================

    /// Create a syntax error with an optional position.
    #[must_use]
    pub fn syntax(
        message: impl Into<String>,
        file: impl Into<PathBuf>,
        line: Option<usize>,
        column: Option<usize>,
    ) -> Self {
        Self::Syntax {
            code: ErrorCode::SYNTAX,
            message: message.into(),
            file: file.into(),
            line,
            column,
        }
    }

    /// Create a naming conflict for `name` within `scope`.
    #[must_use]
    pub fn naming_conflict(name: impl Into<String>, scope: impl Into<String>) -> Self {
        let name = name.into();
        Self::NamingConflict {
            code: ErrorCode::NAMING_CONFLICT,
            message: format!("'{}' is already bound in this scope", name),
            name,
            scope: scope.into(),
        }
    }

    /// Create a naming error for a reserved word or invalid identifier.
    #[must_use]
    pub fn reserved_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NamingConflict {
            code: ErrorCode::NAMING_RESERVED,
            name: name.into(),
            scope: "global".to_string(),
            message: reason.into(),
        }
    }

    /// Create a validation error aggregating several issue messages.
    #[must_use]
    pub fn validation_failed(issues: Vec<String>) -> Self {
        Self::ValidationFailed {
            code: ErrorCode::VALIDATION_FAILED,
            issues,
        }
    }

    /// Create a generic transformation failure.
    #[must_use]
    pub fn transformation(refactoring: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransformationFailed {
            code: ErrorCode::TRANSFORMATION_FAILED,
            refactoring: refactoring.into(),
            message: message.into(),
        }
    }

    /// Create a transformation failure with a specific code.
    #[must_use]
    pub fn transformation_with_code(
        code: ErrorCode,
        refactoring: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::TransformationFailed {
            code,
            refactoring: refactoring.into(),
            message: message.into(),
        }
    }

    /// Create a failure for a target node that could not be located.
    #[must_use]
    pub fn target_not_found(refactoring: impl Into<String>, message: impl Into<String>) -> Self {
        Self::transformation_with_code(ErrorCode::TARGET_NOT_FOUND, refactoring, message)
    }

    /// Create a regression error from before/after counts.
    #[must_use]
    pub fn test_failure(
        passed_before: usize,
        failed_before: usize,
        passed_after: usize,
        failed_after: usize,
    ) -> Self {
        Self::TestFailure {
            code: ErrorCode::TEST_FAILURE,
            passed_before,
            failed_before,
            passed_after,
            failed_after,
        }
    }

    /// Create a no-tests error.
    #[must_use]
    pub fn no_tests(message: impl Into<String>) -> Self {
        Self::NoTestsFound {
            code: ErrorCode::NO_TESTS_FOUND,
            message: message.into(),
        }
    }

    /// Create a test execution error.
    #[must_use]
    pub fn test_run(message: impl Into<String>) -> Self {
        Self::TestRun {
            code: ErrorCode::TEST_RUN,
            message: message.into(),
        }
    }

    /// Create a test timeout error.
    #[must_use]
    pub fn test_timeout(seconds: u64) -> Self {
        Self::TestRun {
            code: ErrorCode::TEST_TIMEOUT,
            message: format!("test command did not finish within {}s", seconds),
        }
    }

    /// Create a configuration error for a specific field.
    #[must_use]
    pub fn config_with_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::CONFIG_INVALID,
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::CONFIG_INVALID,
            message: message.into(),
            field: None,
        }
    }

    /// Create an I/O error.
    #[must_use]
    pub fn io(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Io {
            code: ErrorCode::IO_GENERIC,
            message: message.into(),
            path,
        }
    }

    /// Create an unknown error.
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            code: ErrorCode::UNKNOWN,
            message: message.into(),
        }
    }

    // ==========================================================================
    // Accessor Methods
    // ==========================================================================

    /// Get the error code.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Syntax { code, .. }
            | Self::NamingConflict { code, .. }
            | Self::ValidationFailed { code, .. }
            | Self::TransformationFailed { code, .. }
            | Self::TestFailure { code, .. }
            | Self::NoTestsFound { code, .. }
            | Self::TestRun { code, .. }
            | Self::Config { code, .. }
            | Self::Io { code, .. }
            | Self::Unknown { code, .. } => *code,
        }
    }

    /// Get the error category name.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "SyntaxError",
            Self::NamingConflict { .. } => "NamingConflict",
            Self::ValidationFailed { .. } => "ValidationFailed",
            Self::TransformationFailed { .. } => "TransformationFailed",
            Self::TestFailure { .. } => "TestFailure",
            Self::NoTestsFound { .. } => "NoTestsFound",
            Self::TestRun { .. } => "TestRun",
            Self::Config { .. } => "Config",
            Self::Io { .. } => "Io",
            Self::Unknown { .. } => "UnknownError",
        }
    }

    /// Structured key/value context for logs and reports.
    #[must_use]
    pub fn context(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Syntax {
                file, line, column, ..
            } => {
                let mut ctx = vec![("file", file.display().to_string())];
                if let Some(l) = line {
                    ctx.push(("line", l.to_string()));
                }
                if let Some(c) = column {
                    ctx.push(("column", c.to_string()));
                }
                ctx
            }
            Self::NamingConflict { name, scope, .. } => {
                vec![("name", name.clone()), ("scope", scope.clone())]
            }
            Self::ValidationFailed { issues, .. } => vec![("issues", issues.len().to_string())],
            Self::TransformationFailed { refactoring, .. } => {
                vec![("refactoring", refactoring.clone())]
            }
            Self::TestFailure {
                passed_before,
                failed_before,
                passed_after,
                failed_after,
                ..
            } => vec![
                ("passed_before", passed_before.to_string()),
                ("failed_before", failed_before.to_string()),
                ("passed_after", passed_after.to_string()),
                ("failed_after", failed_after.to_string()),
            ],
            Self::Config { field, .. } => field
                .as_ref()
                .map(|f| vec![("field", f.clone())])
                .unwrap_or_default(),
            Self::Io { path, .. } => path
                .as_ref()
                .map(|p| vec![("path", p.display().to_string())])
                .unwrap_or_default(),
            Self::NoTestsFound { .. } | Self::TestRun { .. } | Self::Unknown { .. } => Vec::new(),
        }
    }

    /// Suggested next steps for a human or calling tool.
    #[must_use]
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Syntax { .. } => vec![
                "Fix the syntax error in the source before refactoring",
                "Check that the file extension matches the language",
            ],
            Self::NamingConflict { .. } => vec![
                "Choose a different name",
                "Rename the conflicting binding first",
            ],
            Self::ValidationFailed { .. } => vec!["Review the listed issues and regenerate the suggestion"],
            Self::TransformationFailed { code, .. } if *code == ErrorCode::UNSUPPORTED_STRATEGY => {
                vec!["Apply this refactoring manually"]
            }
            Self::TransformationFailed { code, .. } if *code == ErrorCode::NO_REPEATED_CONDITION => {
                vec!["Use the guard-clause or extract-variable strategy instead"]
            }
            Self::TransformationFailed { .. } => vec![
                "Re-run analysis so locations match the current source",
                "Apply the refactoring manually",
            ],
            Self::TestFailure { .. } => vec![
                "The change was reverted; inspect the failing tests",
                "Apply the refactoring manually and adjust tests if the change is intended",
            ],
            Self::NoTestsFound { .. } => vec![
                "Add tests covering the code being refactored",
                "Disable safe mode to proceed without tests",
            ],
            Self::TestRun { code, .. } if *code == ErrorCode::TEST_TIMEOUT => {
                vec!["Increase test_timeout_secs", "Run a narrower subset of tests"]
            }
            Self::TestRun { .. } => vec![
                "Check that the test command is installed",
                "Set test_command explicitly in .refactron.toml",
            ],
            Self::Config { .. } => vec!["Fix the value in .refactron.toml"],
            Self::Io { .. } => vec!["Check file permissions and paths"],
            Self::Unknown { .. } => vec!["Report this as a bug with the input source"],
        }
    }

    // ==========================================================================
    // Classification Methods
    // ==========================================================================

    /// Whether the pipeline can continue with the next suggestion after this error.
    ///
    /// Unknown errors abort the remaining batch; everything else only aborts
    /// the suggestion being processed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Unknown { .. })
    }

    /// Whether this error represents a test-triggered revert rather than a fault.
    #[must_use]
    pub fn is_test_regression(&self) -> bool {
        matches!(self, Self::TestFailure { .. })
    }
}

// =============================================================================
// Serde Serialization for Structured Logging
// =============================================================================

impl Serialize for RefactronError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let context: std::collections::BTreeMap<&str, String> = self.context().into_iter().collect();
        let mut state = serializer.serialize_struct("RefactronError", 5)?;
        state.serialize_field("code", &self.code().as_str())?;
        state.serialize_field("category", &self.category())?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("context", &context)?;
        state.serialize_field("recovery", &self.recovery_suggestions())?;
        state.end()
    }
}

impl From<std::io::Error> for RefactronError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string(), None)
    }
}

impl From<anyhow::Error> for RefactronError {
    fn from(err: anyhow::Error) -> Self {
        Self::test_run(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = RefactronError::syntax("Unexpected token", "app.js", Some(3), Some(7));
        let display = err.to_string();
        assert!(display.contains("R010"));
        assert!(display.contains("app.js"));
        assert!(display.contains("line 3, column 7"));
        assert_eq!(err.category(), "SyntaxError");
    }

    #[test]
    fn test_naming_conflict_context() {
        let err = RefactronError::naming_conflict("value", "local 'f'");
        let ctx = err.context();
        assert!(ctx.contains(&("name", "value".to_string())));
        assert!(ctx.contains(&("scope", "local 'f'".to_string())));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_validation_display_truncates() {
        let err = RefactronError::validation_failed(vec![
            "one".into(),
            "two".into(),
            "three".into(),
            "four".into(),
        ]);
        let display = err.to_string();
        assert!(display.contains("4 issue(s)"));
        assert!(display.contains("and 1 more"));
    }

    #[test]
    fn test_unknown_is_not_recoverable() {
        assert!(!RefactronError::unknown("boom").is_recoverable());
    }

    #[test]
    fn test_timeout_has_specific_code_and_recovery() {
        let err = RefactronError::test_timeout(300);
        assert_eq!(err.code(), ErrorCode::TEST_TIMEOUT);
        assert!(err
            .recovery_suggestions()
            .iter()
            .any(|s| s.contains("test_timeout_secs")));
    }

    #[test]
    fn test_error_serialization() {
        let err = RefactronError::transformation_with_code(
            ErrorCode::NO_REPEATED_CONDITION,
            "simplify_conditional",
            "no repeated conditional logic",
        );
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"code\":\"R042\""));
        assert!(json.contains("\"category\":\"TransformationFailed\""));
        assert!(json.contains("guard-clause"));
    }

    #[test]
    fn test_test_failure_is_regression() {
        let err = RefactronError::test_failure(10, 0, 8, 2);
        assert!(err.is_test_regression());
        assert!(err.to_string().contains("8 passed/2 failed after"));
    }
}
