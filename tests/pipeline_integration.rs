//! End-to-end tests: detect, suggest, plan and apply through the public API.

mod common;

use common::{rename_suggestion, ScriptedRunner};
use indoc::indoc;
use pretty_assertions::assert_eq;
use refactron::ast::{apply_unified_diff, parses_cleanly};
use refactron::core::Scope;
use refactron::orchestrator::RefactoringStatus;
use refactron::smells::CodeSmell;
use refactron::suggestions::{RefactoringType, SuggestionKind};
use refactron::transformers::ChangeKind;
use refactron::{
    DetectionThresholds, RefactoringConfig, RefactoringOrchestrator, RefactoringSuggester, SafetyValidator,
    SmellDetector, TestResult,
};
use std::path::Path;

const THREE_COPIES: &str = indoc! {"
    function importUser(user) {
      const name = user.name.trim();
      const email = user.email.toLowerCase();
      save(name, email);
    }
    function importAdmin(user) {
      const name = user.name.trim();
      const email = user.email.toLowerCase();
      save(name, email);
    }
    function importGuest(user) {
      const name = user.name.trim();
      const email = user.email.toLowerCase();
      save(name, email);
    }
"};

const SHADOWED: &str = indoc! {"
    let x = 1;
    function f() {
      let x = 2;
      return x + 1;
    }
    console.log(x);
"};

fn orchestrator() -> RefactoringOrchestrator {
    RefactoringOrchestrator::new(RefactoringConfig::default(), ScriptedRunner::passing(4))
}

#[test]
fn test_every_planned_suggestion_is_reviewable() {
    let plan = orchestrator()
        .analyze(THREE_COPIES, Path::new("import.js"))
        .expect("analysis should succeed");
    assert!(!plan.ordered.is_empty());

    let validator = SafetyValidator::new();
    for suggestion in &plan.ordered {
        let validation = validator.validate_refactoring(suggestion);
        if validation.safe {
            assert!(parses_cleanly(&suggestion.after_code, Path::new("import.js")));
        }
        if !suggestion.diff.is_empty() {
            assert_eq!(
                apply_unified_diff(&suggestion.before_code, &suggestion.diff).unwrap(),
                suggestion.after_code,
                "diff of {} does not round-trip",
                suggestion.id
            );
        }
    }
}

#[test]
fn test_three_duplicates_become_three_calls_and_one_function() {
    let orch = orchestrator();
    let file = Path::new("import.js");
    let plan = orch.analyze(THREE_COPIES, file).unwrap();
    let dedupe = plan
        .ordered
        .iter()
        .find(|s| s.refactoring_type() == RefactoringType::RemoveDuplication)
        .expect("duplication should be suggested");
    let SuggestionKind::RemoveDuplication { instances, .. } = &dedupe.kind else {
        unreachable!();
    };
    assert_eq!(instances.len(), 3);

    let result = refactron::Transformers::default().apply_suggestion(THREE_COPIES, file, dedupe);
    assert!(result.success, "{:?}", result.error);
    let modifies = result.changes.iter().filter(|c| c.kind == ChangeKind::Modify).count();
    let adds = result.changes.iter().filter(|c| c.kind == ChangeKind::Add).count();
    assert_eq!((modifies, adds), (3, 1));
}

#[test]
fn test_duplicates_differing_by_a_comment_are_suggested() {
    let source = indoc! {"
        function importUser(user) {
          const name = user.name.trim();
          const email = user.email.toLowerCase();
          save(name, email);
        }
        function importAdmin(user) {
          const name = user.name.trim();
          // same logic
          const email = user.email.toLowerCase();
          save(name, email);
        }
    "};
    let file = Path::new("import.js");
    let smells = SmellDetector::new(DetectionThresholds::default())
        .detect(source, file)
        .unwrap();
    assert!(smells.iter().any(|s| matches!(s, CodeSmell::Duplication { .. })));

    let suggestions = RefactoringSuggester::default().suggest(source, file, &smells).unwrap();
    let dedupe = suggestions
        .iter()
        .find(|s| s.refactoring_type() == RefactoringType::RemoveDuplication)
        .expect("commented copy should still be deduplicated");
    assert!(!dedupe.after_code.contains("same logic"));
}

#[test]
fn test_rename_leaves_outer_binding_alone() {
    let orch = orchestrator();
    let suggestion = rename_suggestion(
        "rename-3-1",
        Path::new("f.js"),
        (3, 6),
        "x",
        "value",
        Scope::local("f"),
        "function f() {\n  let value = 2;\n  return value + 1;\n}",
    );
    let outcome = orch.apply_refactoring("shadow", SHADOWED, &suggestion);
    assert_eq!(outcome.status(), RefactoringStatus::Applied, "{:?}", outcome.error);
    assert_eq!(
        outcome.code,
        indoc! {"
            let x = 1;
            function f() {
              let value = 2;
              return value + 1;
            }
            console.log(x);
        "}
    );
    assert_eq!(
        apply_unified_diff(&outcome.refactoring.before_code, &outcome.refactoring.diff).unwrap(),
        outcome.refactoring.after_code
    );
}

#[test]
fn test_atomic_batch_with_invalid_second_step_changes_nothing() {
    let orch = orchestrator();
    let file = Path::new("f.js");
    let first = rename_suggestion(
        "rename-3-1",
        file,
        (3, 6),
        "x",
        "value",
        Scope::local("f"),
        "function f() {\n  let value = 2;\n  return value + 1;\n}",
    );
    let second = rename_suggestion(
        "rename-3-2",
        file,
        (3, 6),
        "value",
        "result",
        Scope::local("f"),
        "function f() {\n  let result = 2;\n  let result = 3;\n}",
    );

    let batch = orch.apply_refactorings("atomic", SHADOWED, &[first, second]);

    assert!(batch.rolled_back);
    assert_eq!(batch.code, SHADOWED);
    assert!(batch.applied().is_empty());
    assert_eq!(batch.failed_step, Some(1));
    assert!(orch.history("atomic").is_empty());
}

#[test]
fn test_regression_returns_exact_snapshot() {
    let runner = ScriptedRunner::new(vec![TestResult::new(10, 0), TestResult::new(8, 2)]);
    let orch = RefactoringOrchestrator::new(RefactoringConfig::default(), runner.clone());
    let suggestion = rename_suggestion(
        "rename-3-1",
        Path::new("f.js"),
        (3, 6),
        "x",
        "value",
        Scope::local("f"),
        "function f() {\n  let value = 2;\n  return value + 1;\n}",
    );
    let outcome = orch.apply_refactoring("revert", SHADOWED, &suggestion);
    assert_eq!(outcome.status(), RefactoringStatus::Reverted);
    assert_eq!(outcome.code.as_bytes(), SHADOWED.as_bytes());
    assert_eq!(runner.calls(), 2);
}

#[test]
fn test_projects_keep_separate_histories() {
    let orch = orchestrator();
    let suggestion = rename_suggestion(
        "rename-3-1",
        Path::new("f.js"),
        (3, 6),
        "x",
        "value",
        Scope::local("f"),
        "function f() {\n  let value = 2;\n  return value + 1;\n}",
    );
    std::thread::scope(|s| {
        for project in ["a", "b", "c"] {
            let orch = &orch;
            let suggestion = &suggestion;
            s.spawn(move || {
                orch.apply_refactoring(project, SHADOWED, suggestion);
                orch.apply_refactoring(project, SHADOWED, suggestion);
            });
        }
    });
    for project in ["a", "b", "c"] {
        let history = orch.history(project);
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|r| r.project_id == project));
    }
    assert_eq!(orch.undo_all("a").len(), 2);
    assert_eq!(orch.history("b").len(), 2);
}
