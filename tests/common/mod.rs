// Test utility module for refactron integration tests
#![allow(dead_code)]

use parking_lot::Mutex;
use refactron::core::{Effort, IdentifierKind, Location, Position, RiskLevel, Scope};
use refactron::suggestions::{RefactoringSuggestion, SuggestionKind};
use refactron::testing::{TestResult, TestRunner};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Helper to create a temp directory with test files.
pub fn create_test_project(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    for (name, content) in files {
        let file_path = temp_dir.path().join(name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&file_path, content).expect("Failed to write test file");
    }
    temp_dir
}

/// Test runner that hands out queued results, repeating the last one.
pub struct ScriptedRunner {
    results: Mutex<VecDeque<TestResult>>,
    calls: Mutex<usize>,
}

impl ScriptedRunner {
    pub fn new(results: Vec<TestResult>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            calls: Mutex::new(0),
        })
    }

    pub fn passing(count: usize) -> Arc<Self> {
        Self::new(vec![TestResult::new(count, 0)])
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

impl TestRunner for ScriptedRunner {
    fn run_tests(&self, _tests: Option<&[PathBuf]>) -> refactron::Result<TestResult> {
        *self.calls.lock() += 1;
        let mut results = self.results.lock();
        if results.len() > 1 {
            Ok(results.pop_front().unwrap_or_default())
        } else {
            Ok(results.front().cloned().unwrap_or_default())
        }
    }
}

/// A hand-built rename suggestion for a binding declared at `line:column`.
pub fn rename_suggestion(
    id: &str,
    file: &Path,
    (line, column): (usize, usize),
    old: &str,
    new: &str,
    scope: Scope,
    after_code: &str,
) -> RefactoringSuggestion {
    let at = Position::new(line, column);
    RefactoringSuggestion {
        id: id.to_string(),
        title: format!("Rename '{}' to '{}'", old, new),
        description: format!("'{}' is not descriptive", old),
        before_code: String::new(),
        after_code: after_code.to_string(),
        diff: String::new(),
        benefits: vec!["Clearer intent".to_string()],
        risk_level: RiskLevel::Low,
        estimated_effort: Effort::Low,
        priority: 9,
        location: Location::new(file, at, at),
        kind: SuggestionKind::Rename {
            old_name: old.to_string(),
            new_name: new.to_string(),
            identifier_kind: IdentifierKind::Variable,
            scope,
        },
    }
}
