//! Static safety checks for proposed code.
//!
//! Two independent checks run on every proposal and their issues are
//! accumulated rather than stopping at the first: the code must reparse, and
//! no scope may declare the same lexical name twice. Passing both only means
//! the code is well formed; behavior is checked by running the tests.

use crate::ast::{parse_source, ScopeTable, SyntaxTree};
use crate::core::{Location, Position};
use crate::errors::{ErrorCode, RefactronError};
use crate::suggestions::RefactoringSuggestion;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use stillwater::{NonEmptyVec, Validation};

pub const UNVERIFIED_BEHAVIOR_WARNING: &str =
    "Behavior preservation is unverified until the project's tests pass on the new code";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Syntax,
    NamingConflict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub code: ErrorCode,
    pub message: String,
    pub location: Option<Location>,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "[{}] {} at {}", self.code, self.message, location),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub safe: bool,
    pub issues: Vec<ValidationIssue>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// The aggregate error for an unsafe result.
    pub fn to_error(&self) -> Option<RefactronError> {
        if self.safe {
            None
        } else {
            Some(RefactronError::validation_failed(
                self.issues.iter().map(|i| i.to_string()).collect(),
            ))
        }
    }
}

type Check = Validation<(), NonEmptyVec<ValidationIssue>>;

fn fail(issue: ValidationIssue) -> Check {
    Validation::Failure(NonEmptyVec::new(issue, Vec::new()))
}

fn check_syntax(parsed: &Result<SyntaxTree, RefactronError>) -> Check {
    match parsed {
        Ok(_) => Validation::Success(()),
        Err(RefactronError::Syntax {
            message,
            file,
            line,
            column,
            ..
        }) => {
            let location = line.map(|l| {
                let at = Position::new(l, column.unwrap_or(0));
                Location::new(file.clone(), at, at)
            });
            fail(ValidationIssue {
                kind: IssueKind::Syntax,
                code: ErrorCode::SYNTAX,
                message: format!("code does not parse: {}", message),
                location,
            })
        }
        Err(other) => fail(ValidationIssue {
            kind: IssueKind::Syntax,
            code: other.code(),
            message: other.to_string(),
            location: None,
        }),
    }
}

fn check_naming_conflicts(parsed: &Result<SyntaxTree, RefactronError>) -> Check {
    let Ok(tree) = parsed else {
        return Validation::Success(());
    };
    let scopes = ScopeTable::build(tree);
    let issues: Vec<ValidationIssue> = scopes
        .duplicates()
        .iter()
        .map(|dup| ValidationIssue {
            kind: IssueKind::NamingConflict,
            code: ErrorCode::NAMING_CONFLICT,
            message: format!(
                "'{}' is declared twice in {}",
                dup.name,
                scopes.scope(dup.scope).scope
            ),
            location: Some(tree.location(dup.second)),
        })
        .collect();
    match NonEmptyVec::from_vec(issues) {
        Some(issues) => Validation::Failure(issues),
        None => Validation::Success(()),
    }
}

fn accumulate(checks: Vec<Check>) -> Vec<ValidationIssue> {
    checks
        .into_iter()
        .flat_map(|check| match check {
            Validation::Success(()) => Vec::new(),
            Validation::Failure(issues) => issues.into_vec(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyValidator;

impl SafetyValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate `code` as the content of `file`.
    pub fn validate(&self, code: &str, file: &Path) -> ValidationResult {
        let parsed = parse_source(code, file);
        let issues = accumulate(vec![check_syntax(&parsed), check_naming_conflicts(&parsed)]);
        let safe = issues.is_empty();
        let warnings = if safe {
            vec![UNVERIFIED_BEHAVIOR_WARNING.to_string()]
        } else {
            Vec::new()
        };
        if !safe {
            log::debug!("{} validation issue(s) in {}", issues.len(), file.display());
        }
        ValidationResult {
            safe,
            issues,
            warnings,
        }
    }

    /// Validate a suggestion's after-code.
    pub fn validate_refactoring(&self, suggestion: &RefactoringSuggestion) -> ValidationResult {
        let mut result = self.validate(&suggestion.after_code, &suggestion.location.file);
        if suggestion.refactoring_type().is_class_level() {
            result
                .warnings
                .push("Class-level redesign is advisory; the after-code is a skeleton".to_string());
        }
        if suggestion.after_code == suggestion.before_code {
            result.warnings.push("The suggestion does not change any code".to_string());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_valid_code_is_safe_with_warning() {
        let result = SafetyValidator::new().validate("const a = 1;\nlet b = a + 1;\n", Path::new("a.js"));
        assert!(result.safe);
        assert!(result.issues.is_empty());
        assert_eq!(result.warnings, vec![UNVERIFIED_BEHAVIOR_WARNING.to_string()]);
        assert!(result.to_error().is_none());
    }

    #[test]
    fn test_syntax_error_reported() {
        let result = SafetyValidator::new().validate("function f( {\n", Path::new("a.js"));
        assert!(!result.safe);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].kind, IssueKind::Syntax);
        assert!(result.warnings.is_empty());
        let error = result.to_error().unwrap();
        assert_eq!(error.code(), ErrorCode::VALIDATION_FAILED);
    }

    #[test]
    fn test_duplicate_declarations_accumulate() {
        let code = "let a = 1;\nlet a = 2;\nfunction f() {\n  const b = 1;\n  const b = 2;\n}\n";
        let result = SafetyValidator::new().validate(code, Path::new("a.js"));
        assert!(!result.safe);
        assert_eq!(result.issues.len(), 2);
        assert!(result.issues.iter().all(|i| i.kind == IssueKind::NamingConflict));
        assert!(result.issues[1].message.contains("local 'f'"), "{}", result.issues[1].message);
    }

    #[test]
    fn test_var_redeclaration_is_allowed() {
        let result = SafetyValidator::new().validate("var a = 1;\nvar a = 2;\n", Path::new("a.js"));
        assert!(result.safe);
    }

    #[test]
    fn test_duplicate_function_declaration_rejected() {
        let code = "function load() {}\nfunction load() {}\n";
        let result = SafetyValidator::new().validate(code, Path::new("a.js"));
        assert!(!result.safe);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].kind, IssueKind::NamingConflict);
    }

    #[test]
    fn test_typescript_code_uses_typescript_grammar() {
        let result = SafetyValidator::new().validate("let n: number = 1;\n", Path::new("a.ts"));
        assert!(result.safe);
    }
}
