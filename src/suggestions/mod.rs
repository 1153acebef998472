//! Refactoring suggestions: one reviewable rewrite proposal per smell.
//!
//! A suggestion carries the exact code it would replace and the code the
//! matching transformer produces for it, so reviewers see a real diff rather
//! than a template.

mod preview;
mod suggester;

pub use preview::Preview;
pub use suggester::RefactoringSuggester;

use crate::collaborator::SolidAdvice;
use crate::core::{Effort, IdentifierKind, Location, RiskLevel, Scope, Severity};
use crate::transformers::SimplificationStrategy;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefactoringType {
    ExtractMethod,
    RemoveDuplication,
    SimplifyConditional,
    Rename,
    SplitClass,
    IntroduceInterface,
}

impl RefactoringType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtractMethod => "extract_method",
            Self::RemoveDuplication => "remove_duplication",
            Self::SimplifyConditional => "simplify_conditional",
            Self::Rename => "rename",
            Self::SplitClass => "split_class",
            Self::IntroduceInterface => "introduce_interface",
        }
    }

    /// Rewrites that change the shape of code rather than names in it.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::ExtractMethod | Self::RemoveDuplication | Self::SplitClass
        )
    }

    /// Class-level design changes that only come with advice.
    pub fn is_class_level(&self) -> bool {
        matches!(self, Self::SplitClass | Self::IntroduceInterface)
    }
}

impl fmt::Display for RefactoringType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific payload of a suggestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SuggestionKind {
    ExtractMethod {
        method_name: String,
        parameters: Vec<String>,
        return_type: String,
    },
    RemoveDuplication {
        shared_method_name: String,
        instances: Vec<Location>,
        similarity: f64,
    },
    SimplifyConditional {
        strategy: SimplificationStrategy,
        variable_name: Option<String>,
    },
    Rename {
        old_name: String,
        new_name: String,
        identifier_kind: IdentifierKind,
        scope: Scope,
    },
    SplitClass {
        class_name: String,
        advice: SolidAdvice,
    },
    IntroduceInterface {
        class_name: String,
        advice: SolidAdvice,
    },
}

impl SuggestionKind {
    pub fn refactoring_type(&self) -> RefactoringType {
        match self {
            Self::ExtractMethod { .. } => RefactoringType::ExtractMethod,
            Self::RemoveDuplication { .. } => RefactoringType::RemoveDuplication,
            Self::SimplifyConditional { .. } => RefactoringType::SimplifyConditional,
            Self::Rename { .. } => RefactoringType::Rename,
            Self::SplitClass { .. } => RefactoringType::SplitClass,
            Self::IntroduceInterface { .. } => RefactoringType::IntroduceInterface,
        }
    }
}

/// A proposed rewrite, ready for planning and review.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefactoringSuggestion {
    pub id: String,
    pub title: String,
    pub description: String,
    pub before_code: String,
    pub after_code: String,
    pub diff: String,
    pub benefits: Vec<String>,
    pub risk_level: RiskLevel,
    pub estimated_effort: Effort,
    pub priority: i32,
    /// Target of the rewrite; for duplication, the first instance.
    pub location: Location,
    #[serde(flatten)]
    pub kind: SuggestionKind,
}

impl RefactoringSuggestion {
    pub fn refactoring_type(&self) -> RefactoringType {
        self.kind.refactoring_type()
    }
}

/// Higher severity and lower risk sort first.
pub fn priority_score(severity: Severity, risk: RiskLevel) -> i32 {
    severity.weight() * 10 - risk.weight()
}

/// Stable sort by priority, highest first.
pub fn sort_by_priority(suggestions: &mut [RefactoringSuggestion]) {
    suggestions.sort_by(|a, b| b.priority.cmp(&a.priority));
}
