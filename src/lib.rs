//! Test-gated, behavior-preserving refactoring for JavaScript and TypeScript.
//!
//! The pipeline: [`smells::SmellDetector`] finds defects,
//! [`suggestions::RefactoringSuggester`] turns them into reviewable rewrites,
//! [`planner::RefactoringPlanner`] orders them, and
//! [`orchestrator::RefactoringOrchestrator`] applies them one at a time,
//! validating each, running the project's tests around it and reverting on
//! regression.
//!
//! ```rust,no_run
//! use refactron::{RefactoringConfig, RefactoringOrchestrator};
//! use std::path::Path;
//!
//! let orchestrator = RefactoringOrchestrator::for_project(".", RefactoringConfig::default());
//! let source = std::fs::read_to_string("src/cart.js").unwrap();
//! let plan = orchestrator.analyze(&source, Path::new("src/cart.js")).unwrap();
//! let batch = orchestrator.apply_refactorings("cart", &source, &plan.ordered);
//! println!("{} applied", batch.applied().len());
//! ```

// Export modules for library usage
pub mod ast;
pub mod collaborator;
pub mod config;
pub mod core;
pub mod errors;
pub mod orchestrator;
pub mod planner;
pub mod progress;
pub mod smells;
pub mod suggestions;
pub mod testing;
pub mod transformers;
pub mod validation;

// Re-export commonly used types
pub use crate::core::{
    CodeBlock, Effort, IdentifierKind, Language, Location, Position, RiskLevel, Scope, ScopeKind,
    Severity,
};

pub use crate::config::{load_config, DetectionThresholds, RefactoringConfig};
pub use crate::errors::{ErrorCode, RefactronError, Result};

pub use crate::smells::{CodeSmell, SmellDetector};
pub use crate::suggestions::{RefactoringSuggester, RefactoringSuggestion, RefactoringType};
pub use crate::planner::{RefactoringPlan, RefactoringPlanner};
pub use crate::transformers::{Change, TransformResult, Transformers};
pub use crate::validation::{SafetyValidator, ValidationResult};
pub use crate::testing::{compare_results, should_revert, ProjectTestRunner, TestResult, TestRunner};
pub use crate::orchestrator::{
    BatchOutcome, Refactoring, RefactoringOrchestrator, RefactoringStatus,
};
