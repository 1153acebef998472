use crate::errors::{RefactronError, Result};
use crate::suggestions::RefactoringType;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefactoringStatus {
    Suggested,
    Applied,
    Reverted,
    Failed,
}

impl RefactoringStatus {
    /// `Applied` may still be undone; `Reverted` and `Failed` are final.
    pub fn can_transition_to(self, next: RefactoringStatus) -> bool {
        use RefactoringStatus::*;
        matches!(
            (self, next),
            (Suggested, Applied) | (Suggested, Reverted) | (Suggested, Failed) | (Applied, Reverted)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Suggested => "suggested",
            Self::Applied => "applied",
            Self::Reverted => "reverted",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RefactoringStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempt to apply a suggestion to a project's code.
///
/// `before_code` and `after_code` hold the whole file, so undoing an applied
/// record means putting `before_code` back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Refactoring {
    pub id: String,
    pub project_id: String,
    pub suggestion_id: String,
    #[serde(rename = "type")]
    pub refactoring_type: RefactoringType,
    pub status: RefactoringStatus,
    pub before_code: String,
    pub after_code: String,
    pub diff: String,
    /// `None` when tests were not run.
    pub tests_passed: Option<bool>,
    pub applied_at: Option<DateTime<Utc>>,
    pub reverted_at: Option<DateTime<Utc>>,
}

impl Refactoring {
    pub(crate) fn new(
        id: String,
        project_id: &str,
        suggestion_id: &str,
        refactoring_type: RefactoringType,
        before_code: &str,
    ) -> Self {
        Self {
            id,
            project_id: project_id.to_string(),
            suggestion_id: suggestion_id.to_string(),
            refactoring_type,
            status: RefactoringStatus::Suggested,
            before_code: before_code.to_string(),
            after_code: before_code.to_string(),
            diff: String::new(),
            tests_passed: None,
            applied_at: None,
            reverted_at: None,
        }
    }

    pub(crate) fn transition(&mut self, next: RefactoringStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(RefactronError::unknown(format!(
                "refactoring {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        log::debug!("Refactoring {}: {} -> {}", self.id, self.status, next);
        self.status = next;
        match next {
            RefactoringStatus::Applied => self.applied_at = Some(Utc::now()),
            RefactoringStatus::Reverted => self.reverted_at = Some(Utc::now()),
            RefactoringStatus::Suggested | RefactoringStatus::Failed => {}
        }
        Ok(())
    }

    pub fn is_applied(&self) -> bool {
        self.status == RefactoringStatus::Applied
    }
}
