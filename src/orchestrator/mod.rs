//! Test-gated application of suggestions.
//!
//! The orchestrator owns the per-project bookkeeping: a history stack of
//! applied refactorings and the snapshots taken while a batch is in flight.
//! Every operation on a project holds that project's lock for its whole
//! duration, so steps for one project never interleave while different
//! projects proceed independently.
//!
//! One suggestion goes through:
//!
//! 1. static validation of its after-code
//! 2. a test run on the current code (skipped when tests are not required)
//! 3. the transformer
//! 4. a test run on the staged result, reverting on regression
//! 5. `applied`, pushed onto the project's history

mod record;
mod stage;

pub use record::{Refactoring, RefactoringStatus};
pub use stage::{FileStage, NoopStage, SourceStage};

use crate::ast::unified_diff;
use crate::collaborator::NamingService;
use crate::config::RefactoringConfig;
use crate::errors::{RefactronError, Result};
use crate::planner::{RefactoringPlan, RefactoringPlanner};
use crate::progress::{PipelineStage, ProgressReporter, ProgressSink, SilentProgressSink};
use crate::smells::SmellDetector;
use crate::suggestions::{RefactoringSuggester, RefactoringSuggestion};
use crate::testing::{should_revert, ProjectTestRunner, TestResult, TestRunner};
use crate::transformers::{RefactoringRequest, Transformers};
use crate::validation::{SafetyValidator, ValidationResult};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const NO_TESTS_WARNING: &str =
    "No tests were found; the change is applied without behavioral verification";

#[derive(Debug, Default)]
struct ProjectState {
    history: Vec<Refactoring>,
    /// File content at the start of the running batch.
    snapshots: HashMap<PathBuf, String>,
    sequence: u64,
}

/// Everything known about one apply attempt.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub refactoring: Refactoring,
    /// The code to continue from: the transformed code when applied, the
    /// untouched input otherwise.
    pub code: String,
    pub validation: Option<ValidationResult>,
    pub tests_before: Option<TestResult>,
    pub tests_after: Option<TestResult>,
    pub warnings: Vec<String>,
    /// Why the attempt failed or was reverted.
    pub error: Option<RefactronError>,
}

impl ApplyOutcome {
    fn start(refactoring: Refactoring, source: &str) -> Self {
        Self {
            refactoring,
            code: source.to_string(),
            validation: None,
            tests_before: None,
            tests_after: None,
            warnings: Vec::new(),
            error: None,
        }
    }

    pub fn status(&self) -> RefactoringStatus {
        self.refactoring.status
    }

    pub fn is_failure(&self) -> bool {
        self.status() == RefactoringStatus::Failed
    }

    fn settle(&mut self, status: RefactoringStatus) {
        if let Err(e) = self.refactoring.transition(status) {
            log::warn!("{}", e);
            self.error.get_or_insert(e);
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Final code of the batch. Equal to the input after an atomic rollback.
    pub code: String,
    pub outcomes: Vec<ApplyOutcome>,
    pub rolled_back: bool,
    /// Index into `outcomes` of the step that stopped an atomic batch.
    pub failed_step: Option<usize>,
}

impl BatchOutcome {
    pub fn applied(&self) -> Vec<&Refactoring> {
        self.outcomes
            .iter()
            .map(|o| &o.refactoring)
            .filter(|r| r.is_applied())
            .collect()
    }

    pub fn failures(&self) -> Vec<&ApplyOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure()).collect()
    }
}

pub struct RefactoringOrchestrator {
    config: RefactoringConfig,
    detector: SmellDetector,
    suggester: RefactoringSuggester,
    planner: RefactoringPlanner,
    transformers: Transformers,
    validator: SafetyValidator,
    test_runner: Arc<dyn TestRunner>,
    stage: Arc<dyn SourceStage>,
    progress: Arc<dyn ProgressSink>,
    projects: DashMap<String, Arc<Mutex<ProjectState>>>,
}

impl RefactoringOrchestrator {
    pub fn new(config: RefactoringConfig, test_runner: Arc<dyn TestRunner>) -> Self {
        let naming = NamingService::from_config(&config, None);
        Self {
            detector: SmellDetector::from_config(&config),
            suggester: RefactoringSuggester::new(naming.clone()),
            planner: RefactoringPlanner::new(),
            transformers: Transformers::new(naming),
            validator: SafetyValidator::new(),
            test_runner,
            stage: Arc::new(NoopStage),
            progress: Arc::new(SilentProgressSink),
            projects: DashMap::new(),
            config,
        }
    }

    /// Orchestrator for a project on disk: tests run with the detected
    /// framework and transformed code is written back under `root`.
    pub fn for_project(root: impl AsRef<Path>, config: RefactoringConfig) -> Self {
        let root = root.as_ref();
        let runner = ProjectTestRunner::new(root, &config);
        Self::new(config, Arc::new(runner)).with_stage(Arc::new(FileStage::new(root)))
    }

    pub fn with_naming(mut self, naming: NamingService) -> Self {
        self.suggester = RefactoringSuggester::new(naming.clone());
        self.transformers = Transformers::new(naming);
        self
    }

    pub fn with_stage(mut self, stage: Arc<dyn SourceStage>) -> Self {
        self.stage = stage;
        self
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    pub fn config(&self) -> &RefactoringConfig {
        &self.config
    }

    fn reporter(&self) -> ProgressReporter {
        ProgressReporter::new(Arc::clone(&self.progress))
    }

    fn project(&self, project_id: &str) -> Arc<Mutex<ProjectState>> {
        Arc::clone(
            self.projects
                .entry(project_id.to_string())
                .or_default()
                .value(),
        )
    }

    /// Detect, suggest and plan for one file.
    pub fn analyze(&self, source: &str, file: &Path) -> Result<RefactoringPlan> {
        let progress = self.reporter();
        progress.stage(
            PipelineStage::Detecting,
            format!("Detecting smells in {}", file.display()),
        );
        let result = self
            .detector
            .detect(source, file)
            .and_then(|smells| {
                progress.stage(
                    PipelineStage::Suggesting,
                    format!("Found {} smell(s)", smells.len()),
                );
                self.suggester.suggest(source, file, &smells)
            })
            .map(|suggestions| {
                progress.stage(
                    PipelineStage::Planning,
                    format!("Planning {} suggestion(s)", suggestions.len()),
                );
                self.planner.plan(&suggestions)
            });
        match &result {
            Ok(plan) => progress.stage(
                PipelineStage::Complete,
                format!("{} refactoring(s) planned", plan.ordered.len()),
            ),
            Err(e) => progress.stage(PipelineStage::Error, e.to_string()),
        }
        result
    }

    /// Validate, test, transform and test again; see the module docs.
    pub fn apply_refactoring(
        &self,
        project_id: &str,
        source: &str,
        suggestion: &RefactoringSuggestion,
    ) -> ApplyOutcome {
        let project = self.project(project_id);
        let mut state = project.lock();
        let progress = self.reporter();
        let outcome = self.apply_locked(&mut state, project_id, source, suggestion, None, &progress);
        let (stage, message) = if outcome.is_failure() {
            (PipelineStage::Error, format!("{} failed", outcome.refactoring.id))
        } else {
            (
                PipelineStage::Complete,
                format!("{} {}", outcome.refactoring.id, outcome.status()),
            )
        };
        progress.stage(stage, message);
        outcome
    }

    /// Apply `suggestions` in order, each to the previous step's result.
    ///
    /// A failed step rolls the whole batch back when atomic refactoring is
    /// configured and is skipped otherwise. A step reverted by the tests is
    /// not a failure.
    pub fn apply_refactorings(
        &self,
        project_id: &str,
        source: &str,
        suggestions: &[RefactoringSuggestion],
    ) -> BatchOutcome {
        let project = self.project(project_id);
        let mut state = project.lock();
        let progress = self.reporter();
        let atomic = self.config.atomic_refactoring;

        let mut code = source.to_string();
        let mut baseline: Option<TestResult> = None;
        let mut outcomes = Vec::with_capacity(suggestions.len());
        let mut failed_step = None;

        for (i, suggestion) in suggestions.iter().enumerate() {
            progress.step(
                PipelineStage::Validating,
                PipelineStage::Complete,
                i,
                suggestions.len(),
                format!("Refactoring {} of {}: {}", i + 1, suggestions.len(), suggestion.title),
            );
            state
                .snapshots
                .entry(suggestion.location.file.clone())
                .or_insert_with(|| code.clone());

            let outcome = self.apply_locked(
                &mut state,
                project_id,
                &code,
                suggestion,
                baseline.take(),
                &progress,
            );
            match outcome.status() {
                RefactoringStatus::Applied => {
                    code = outcome.code.clone();
                    baseline = outcome.tests_after.clone();
                }
                RefactoringStatus::Reverted => baseline = outcome.tests_before.clone(),
                RefactoringStatus::Failed | RefactoringStatus::Suggested => {
                    if atomic {
                        outcomes.push(outcome);
                        failed_step = Some(i);
                        break;
                    }
                    log::warn!("Skipping {} and continuing the batch", suggestion.id);
                    baseline = outcome.tests_before.clone();
                }
            }
            outcomes.push(outcome);
        }

        let rolled_back = failed_step.is_some();
        if rolled_back {
            self.roll_back(&mut state, &mut outcomes);
            code = source.to_string();
        }
        state.snapshots.clear();

        let applied = outcomes.iter().filter(|o| o.refactoring.is_applied()).count();
        log::info!(
            "Batch for {}: {} of {} applied{}",
            project_id,
            applied,
            suggestions.len(),
            if rolled_back { " (rolled back)" } else { "" }
        );
        let stage = if rolled_back {
            PipelineStage::Error
        } else {
            PipelineStage::Complete
        };
        progress.stage(stage, format!("{} refactoring(s) applied", applied));

        BatchOutcome {
            code,
            outcomes,
            rolled_back,
            failed_step,
        }
    }

    fn roll_back(&self, state: &mut ProjectState, outcomes: &mut [ApplyOutcome]) {
        for outcome in outcomes.iter_mut().filter(|o| o.refactoring.is_applied()) {
            state.history.retain(|r| r.id != outcome.refactoring.id);
            outcome.settle(RefactoringStatus::Reverted);
            outcome.code = outcome.refactoring.before_code.clone();
        }
        for (file, snapshot) in &state.snapshots {
            self.restore(file, snapshot);
        }
        log::warn!("Atomic batch failed; restored {} file(s)", state.snapshots.len());
    }

    fn restore(&self, file: &Path, code: &str) {
        if let Err(e) = self.stage.stage(file, code) {
            log::error!("Failed to restore {}: {}", file.display(), e);
        }
    }

    fn next_id(state: &mut ProjectState, project_id: &str) -> String {
        state.sequence += 1;
        format!("{}-{}", project_id, state.sequence)
    }

    fn apply_locked(
        &self,
        state: &mut ProjectState,
        project_id: &str,
        source: &str,
        suggestion: &RefactoringSuggestion,
        baseline: Option<TestResult>,
        progress: &ProgressReporter,
    ) -> ApplyOutcome {
        let file = suggestion.location.file.as_path();
        let record = Refactoring::new(
            Self::next_id(state, project_id),
            project_id,
            &suggestion.id,
            suggestion.refactoring_type(),
            source,
        );
        let mut outcome = ApplyOutcome::start(record, source);

        progress.stage(PipelineStage::Validating, format!("Validating {}", suggestion.id));
        let validation = self.validator.validate_refactoring(suggestion);
        outcome.warnings.extend(validation.warnings.iter().cloned());
        let invalid = validation.to_error();
        outcome.validation = Some(validation);
        if let Some(error) = invalid {
            return fail(outcome, error);
        }

        let before = if self.config.require_tests {
            progress.stage(PipelineStage::Testing, "Running tests on the current code");
            let result = match baseline {
                Some(result) => result,
                None => match self.test_runner.run_tests(None) {
                    Ok(result) => result,
                    Err(e) => return fail(outcome, e),
                },
            };
            if result.is_empty() {
                log::warn!("No tests found for {}", project_id);
                if self.config.safe_mode {
                    outcome.tests_before = Some(result);
                    return fail(
                        outcome,
                        RefactronError::no_tests("safe mode refuses to apply changes without tests"),
                    );
                }
                outcome.warnings.push(NO_TESTS_WARNING.to_string());
            }
            outcome.tests_before = Some(result.clone());
            Some(result)
        } else {
            None
        };

        progress.stage(PipelineStage::Applying, format!("Applying {}", suggestion.id));
        let transformed = match self.transform(source, file, suggestion) {
            Ok(code) => code,
            Err(e) => return fail(outcome, e),
        };
        outcome.refactoring.after_code = transformed.clone();
        outcome.refactoring.diff = unified_diff(source, &transformed, &file.display().to_string());

        if let Err(e) = self.stage.stage(file, &transformed) {
            self.restore(file, source);
            return fail(outcome, e);
        }

        if let Some(before) = before {
            progress.stage(PipelineStage::Testing, "Running tests on the changed code");
            let after = match self.test_runner.run_tests(None) {
                Ok(result) => result,
                Err(e) => {
                    self.restore(file, source);
                    return fail(outcome, e);
                }
            };
            let regressed = should_revert(&before, &after);
            outcome.refactoring.tests_passed = Some(!regressed);
            outcome.tests_after = Some(after.clone());
            if regressed {
                let regression =
                    RefactronError::test_failure(before.passed, before.failed, after.passed, after.failed);
                if self.config.auto_revert {
                    self.restore(file, source);
                    log::info!("Reverted {}: {}", outcome.refactoring.id, regression);
                    outcome.error = Some(regression);
                    outcome.settle(RefactoringStatus::Reverted);
                    return outcome;
                }
                log::warn!("Keeping {} despite regression: {}", outcome.refactoring.id, regression);
                outcome
                    .warnings
                    .push("Tests regressed and automatic revert is disabled".to_string());
                outcome.error = Some(regression);
            }
        }

        outcome.code = transformed;
        outcome.settle(RefactoringStatus::Applied);
        log::info!("Applied {} ({})", outcome.refactoring.id, suggestion.title);
        state.history.push(outcome.refactoring.clone());
        outcome
    }

    fn transform(&self, source: &str, file: &Path, suggestion: &RefactoringSuggestion) -> Result<String> {
        let request = RefactoringRequest::from_suggestion(suggestion)?;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.transformers.apply(source, file, &request)
        }))
        .map_err(|payload| {
            RefactronError::unknown(format!("transformer panicked: {}", panic_message(&*payload)))
        })?;
        result.into_result().map(|(code, _)| code)
    }

    /// Mark the most recent applied refactoring reverted and return it. The
    /// caller restores `before_code`.
    pub fn undo_last(&self, project_id: &str) -> Option<Refactoring> {
        let project = self.projects.get(project_id).map(|p| Arc::clone(p.value()))?;
        let mut state = project.lock();
        let mut record = state.history.pop()?;
        if let Err(e) = record.transition(RefactoringStatus::Reverted) {
            log::warn!("{}", e);
        }
        log::info!("Undid {}", record.id);
        Some(record)
    }

    /// Undo every applied refactoring, most recent first.
    pub fn undo_all(&self, project_id: &str) -> Vec<Refactoring> {
        let Some(project) = self.projects.get(project_id).map(|p| Arc::clone(p.value())) else {
            return Vec::new();
        };
        let mut state = project.lock();
        let mut undone: Vec<Refactoring> = state.history.drain(..).rev().collect();
        for record in &mut undone {
            if let Err(e) = record.transition(RefactoringStatus::Reverted) {
                log::warn!("{}", e);
            }
        }
        log::info!("Undid {} refactoring(s) for {}", undone.len(), project_id);
        undone
    }

    /// Drop all history and snapshots for a project.
    pub fn clear_history(&self, project_id: &str) {
        if self.projects.remove(project_id).is_some() {
            log::debug!("Cleared history for {}", project_id);
        }
    }

    /// Applied refactorings, oldest first.
    pub fn history(&self, project_id: &str) -> Vec<Refactoring> {
        self.projects
            .get(project_id)
            .map(|p| p.value().lock().history.clone())
            .unwrap_or_default()
    }
}

fn fail(mut outcome: ApplyOutcome, error: RefactronError) -> ApplyOutcome {
    log::warn!("Refactoring {} failed: {}", outcome.refactoring.id, error);
    outcome.error = Some(error);
    outcome.settle(RefactoringStatus::Failed);
    outcome
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Effort, IdentifierKind, Location, Position, RiskLevel, Scope};
    use crate::errors::ErrorCode;
    use crate::progress::RecordingProgressSink;
    use crate::suggestions::SuggestionKind;
    use std::collections::VecDeque;

    const SOURCE: &str = "function f() {\n  let x = 1;\n  return x;\n}\n";

    /// Hands out queued results, then repeats the last one.
    struct ScriptedRunner {
        results: Mutex<VecDeque<TestResult>>,
        calls: Mutex<usize>,
    }

    impl ScriptedRunner {
        fn new(results: Vec<TestResult>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into()),
                calls: Mutex::new(0),
            })
        }
    }

    impl TestRunner for ScriptedRunner {
        fn run_tests(&self, _tests: Option<&[PathBuf]>) -> Result<TestResult> {
            *self.calls.lock() += 1;
            let mut results = self.results.lock();
            if results.len() > 1 {
                Ok(results.pop_front().unwrap_or_default())
            } else {
                Ok(results.front().cloned().unwrap_or_default())
            }
        }
    }

    fn rename(id: &str, old: &str, new: &str, after_code: &str) -> RefactoringSuggestion {
        let at = Position::new(2, 6);
        RefactoringSuggestion {
            id: id.to_string(),
            title: format!("Rename {} to {}", old, new),
            description: String::new(),
            before_code: SOURCE.to_string(),
            after_code: after_code.to_string(),
            diff: String::new(),
            benefits: Vec::new(),
            risk_level: RiskLevel::Low,
            estimated_effort: Effort::Low,
            priority: 19,
            location: Location::new(PathBuf::from("f.js"), at, at),
            kind: SuggestionKind::Rename {
                old_name: old.to_string(),
                new_name: new.to_string(),
                identifier_kind: IdentifierKind::Variable,
                scope: Scope::local("f"),
            },
        }
    }

    fn good_rename() -> RefactoringSuggestion {
        rename(
            "rename-2-1",
            "x",
            "value",
            "function f() {\n  let value = 1;\n  return value;\n}\n",
        )
    }

    fn orchestrator(config: RefactoringConfig, runner: Arc<ScriptedRunner>) -> RefactoringOrchestrator {
        RefactoringOrchestrator::new(config, runner)
    }

    #[test]
    fn test_applies_and_records_history() {
        let runner = ScriptedRunner::new(vec![TestResult::new(3, 0)]);
        let orch = orchestrator(RefactoringConfig::default(), runner.clone());
        let outcome = orch.apply_refactoring("p", SOURCE, &good_rename());
        assert_eq!(outcome.status(), RefactoringStatus::Applied, "{:?}", outcome.error);
        assert_eq!(outcome.code, "function f() {\n  let value = 1;\n  return value;\n}\n");
        assert_eq!(outcome.refactoring.tests_passed, Some(true));
        assert!(outcome.refactoring.diff.contains("+  let value = 1;"));
        assert_eq!(*runner.calls.lock(), 2);
        assert_eq!(orch.history("p").len(), 1);
    }

    #[test]
    fn test_regression_reverts_to_snapshot() {
        let runner = ScriptedRunner::new(vec![TestResult::new(10, 0), TestResult::new(8, 2)]);
        let orch = orchestrator(RefactoringConfig::default(), runner);
        let outcome = orch.apply_refactoring("p", SOURCE, &good_rename());
        assert_eq!(outcome.status(), RefactoringStatus::Reverted);
        assert_eq!(outcome.code, SOURCE);
        assert_eq!(outcome.refactoring.tests_passed, Some(false));
        assert_eq!(outcome.error.as_ref().map(|e| e.code()), Some(ErrorCode::TEST_FAILURE));
        assert!(orch.history("p").is_empty());
    }

    #[test]
    fn test_safe_mode_refuses_without_tests() {
        let config = RefactoringConfig {
            safe_mode: true,
            ..RefactoringConfig::default()
        };
        let orch = orchestrator(config, ScriptedRunner::new(vec![TestResult::default()]));
        let outcome = orch.apply_refactoring("p", SOURCE, &good_rename());
        assert!(outcome.is_failure());
        assert_eq!(outcome.error.as_ref().map(|e| e.code()), Some(ErrorCode::NO_TESTS_FOUND));
        assert_eq!(outcome.code, SOURCE);
    }

    #[test]
    fn test_no_tests_warns_and_applies() {
        let orch = orchestrator(
            RefactoringConfig::default(),
            ScriptedRunner::new(vec![TestResult::default()]),
        );
        let outcome = orch.apply_refactoring("p", SOURCE, &good_rename());
        assert_eq!(outcome.status(), RefactoringStatus::Applied);
        assert!(outcome.warnings.iter().any(|w| w == NO_TESTS_WARNING));
    }

    #[test]
    fn test_tests_skipped_when_not_required() {
        let runner = ScriptedRunner::new(vec![TestResult::new(1, 0)]);
        let config = RefactoringConfig {
            require_tests: false,
            ..RefactoringConfig::default()
        };
        let orch = orchestrator(config, runner.clone());
        let outcome = orch.apply_refactoring("p", SOURCE, &good_rename());
        assert_eq!(outcome.status(), RefactoringStatus::Applied);
        assert_eq!(outcome.refactoring.tests_passed, None);
        assert_eq!(*runner.calls.lock(), 0);
    }

    #[test]
    fn test_invalid_after_code_fails_validation() {
        let orch = orchestrator(
            RefactoringConfig::default(),
            ScriptedRunner::new(vec![TestResult::new(1, 0)]),
        );
        let bad = rename("rename-2-2", "x", "value", "function f( {\n");
        let outcome = orch.apply_refactoring("p", SOURCE, &bad);
        assert!(outcome.is_failure());
        assert_eq!(outcome.error.as_ref().map(|e| e.code()), Some(ErrorCode::VALIDATION_FAILED));
    }

    #[test]
    fn test_solid_suggestion_is_unsupported() {
        let orch = orchestrator(
            RefactoringConfig::default(),
            ScriptedRunner::new(vec![TestResult::new(1, 0)]),
        );
        let mut split = good_rename();
        split.after_code = "class Order {}\n".to_string();
        split.kind = SuggestionKind::SplitClass {
            class_name: "Order".to_string(),
            advice: crate::collaborator::SolidAdvice {
                principle: "Single Responsibility".to_string(),
                suggestion: "Split it".to_string(),
                explanation: String::new(),
            },
        };
        let outcome = orch.apply_refactoring("p", SOURCE, &split);
        assert!(outcome.is_failure());
        assert_eq!(
            outcome.error.as_ref().map(|e| e.code()),
            Some(ErrorCode::UNSUPPORTED_STRATEGY)
        );
    }

    #[test]
    fn test_atomic_batch_rolls_back() {
        let orch = orchestrator(
            RefactoringConfig::default(),
            ScriptedRunner::new(vec![TestResult::new(2, 0)]),
        );
        let batch = vec![good_rename(), rename("rename-2-2", "y", "z", "let = ;")];
        let result = orch.apply_refactorings("p", SOURCE, &batch);
        assert!(result.rolled_back);
        assert_eq!(result.failed_step, Some(1));
        assert_eq!(result.code, SOURCE);
        assert!(result.applied().is_empty());
        assert_eq!(result.outcomes[0].status(), RefactoringStatus::Reverted);
        assert!(orch.history("p").is_empty());
    }

    #[test]
    fn test_non_atomic_batch_skips_failures() {
        let config = RefactoringConfig {
            atomic_refactoring: false,
            ..RefactoringConfig::default()
        };
        let runner = ScriptedRunner::new(vec![TestResult::new(2, 0)]);
        let orch = orchestrator(config, runner.clone());
        let batch = vec![rename("rename-2-2", "y", "z", "let = ;"), good_rename()];
        let result = orch.apply_refactorings("p", SOURCE, &batch);
        assert!(!result.rolled_back);
        assert_eq!(result.failures().len(), 1);
        assert_eq!(result.applied().len(), 1);
        assert!(result.code.contains("let value = 1;"));
    }

    #[test]
    fn test_undo_marks_reverted() {
        let orch = orchestrator(
            RefactoringConfig::default(),
            ScriptedRunner::new(vec![TestResult::new(1, 0)]),
        );
        orch.apply_refactoring("p", SOURCE, &good_rename());
        let undone = orch.undo_last("p").unwrap();
        assert_eq!(undone.status, RefactoringStatus::Reverted);
        assert!(undone.reverted_at.is_some());
        assert_eq!(undone.before_code, SOURCE);
        assert!(orch.undo_last("p").is_none());
        assert!(orch.undo_last("unknown").is_none());
    }

    #[test]
    fn test_undo_all_and_clear() {
        let orch = orchestrator(
            RefactoringConfig::default(),
            ScriptedRunner::new(vec![TestResult::new(1, 0)]),
        );
        let first = orch.apply_refactoring("p", SOURCE, &good_rename());
        let second = orch.apply_refactoring("p", SOURCE, &good_rename());
        let undone = orch.undo_all("p");
        assert_eq!(
            undone.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec![second.refactoring.id.as_str(), first.refactoring.id.as_str()]
        );
        orch.apply_refactoring("p", SOURCE, &good_rename());
        orch.clear_history("p");
        assert!(orch.history("p").is_empty());
    }

    #[test]
    fn test_analyze_reports_progress() {
        let sink = Arc::new(RecordingProgressSink::new());
        let orch = orchestrator(
            RefactoringConfig::default(),
            ScriptedRunner::new(vec![TestResult::new(1, 0)]),
        )
        .with_progress(sink.clone());
        let plan = orch.analyze("function f(a) {\n  return a;\n}\n", Path::new("f.js")).unwrap();
        assert!(plan.warnings.is_empty());
        assert_eq!(
            sink.stages(),
            vec![
                PipelineStage::Detecting,
                PipelineStage::Suggesting,
                PipelineStage::Planning,
                PipelineStage::Complete
            ]
        );
        let percents = sink.percents();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_analyze_reports_syntax_errors() {
        let sink = Arc::new(RecordingProgressSink::new());
        let orch = orchestrator(
            RefactoringConfig::default(),
            ScriptedRunner::new(vec![TestResult::new(1, 0)]),
        )
        .with_progress(sink.clone());
        assert!(orch.analyze("function (", Path::new("f.js")).is_err());
        assert_eq!(sink.stages().last(), Some(&PipelineStage::Error));
    }
}
