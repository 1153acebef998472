//! Tree rewrites for one suggestion at a time.
//!
//! Every transformer parses its input, records edits against the parsed tree
//! with a [`TreeEditor`](crate::ast::TreeEditor) and regenerates source from
//! the tree. Text is never substituted by searching for it. A failed attempt
//! hands back the input string untouched, and a successful one is guaranteed
//! to reparse.

pub(crate) mod analysis;
mod conditional;
mod duplication;
mod extract_method;
mod rename;

pub(crate) use conditional::condition_expression;
pub use conditional::{ConditionalRequest, ConditionalTransformer, SimplificationStrategy};
pub use duplication::{DuplicationRequest, DuplicationTransformer};
pub use extract_method::{ExtractMethodRequest, ExtractMethodTransformer};
pub use rename::{RenameRequest, RenameTransformer};

use crate::ast::{parse_source, unified_diff};
use crate::collaborator::NamingService;
use crate::core::Location;
use crate::errors::{ErrorCode, RefactronError, Result};
use crate::suggestions::{RefactoringSuggestion, SuggestionKind};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Remove,
    Modify,
}

/// One atomic edit produced by a transformer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub kind: ChangeKind,
    pub location: Location,
    pub old_code: String,
    pub new_code: String,
}

impl Change {
    pub fn add(location: Location, new_code: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Add,
            location,
            old_code: String::new(),
            new_code: new_code.into(),
        }
    }

    pub fn modify(location: Location, old_code: impl Into<String>, new_code: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Modify,
            location,
            old_code: old_code.into(),
            new_code: new_code.into(),
        }
    }

    pub fn remove(location: Location, old_code: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Remove,
            location,
            old_code: old_code.into(),
            new_code: String::new(),
        }
    }

    /// Unified diff of this edit alone.
    pub fn diff(&self) -> String {
        unified_diff(
            &self.old_code,
            &self.new_code,
            &self.location.file.display().to_string(),
        )
    }
}

/// Outcome of one transform attempt.
#[derive(Debug, Clone)]
pub struct TransformResult {
    pub success: bool,
    /// Rewritten source on success, the untouched input otherwise.
    pub code: String,
    pub changes: Vec<Change>,
    pub error: Option<RefactronError>,
}

impl TransformResult {
    pub fn succeeded(code: String, changes: Vec<Change>) -> Self {
        Self {
            success: true,
            code,
            changes,
            error: None,
        }
    }

    pub fn failed(original: &str, error: RefactronError) -> Self {
        Self {
            success: false,
            code: original.to_string(),
            changes: Vec::new(),
            error: Some(error),
        }
    }

    pub fn into_result(self) -> Result<(String, Vec<Change>)> {
        match self.error {
            Some(error) => Err(error),
            None => Ok((self.code, self.changes)),
        }
    }
}

/// Shared protocol: locate the target, record edits, regenerate.
pub trait Transformer {
    type Request;

    fn name(&self) -> &'static str;

    /// Rewritten source plus the edits that produced it.
    fn rewrite(&self, source: &str, file: &Path, request: &Self::Request) -> Result<(String, Vec<Change>)>;

    fn transform(&self, source: &str, file: &Path, request: &Self::Request) -> TransformResult {
        let outcome = self
            .rewrite(source, file, request)
            .and_then(|(code, changes)| {
                ensure_parses(&code, file, self.name())?;
                Ok((code, changes))
            });
        match outcome {
            Ok((code, changes)) => TransformResult::succeeded(code, changes),
            Err(error) => {
                log::debug!("{} on {} failed: {}", self.name(), file.display(), error);
                TransformResult::failed(source, error)
            }
        }
    }
}

fn ensure_parses(code: &str, file: &Path, refactoring: &str) -> Result<()> {
    parse_source(code, file).map(|_| ()).map_err(|e| {
        RefactronError::transformation(refactoring, format!("rewrite produced unparsable code: {}", e))
    })
}

/// A concrete rewrite for one of the four transformers.
#[derive(Debug, Clone, PartialEq)]
pub enum RefactoringRequest {
    ExtractMethod(ExtractMethodRequest),
    RemoveDuplication(DuplicationRequest),
    SimplifyConditional(ConditionalRequest),
    Rename(RenameRequest),
}

impl RefactoringRequest {
    /// The request that applies `suggestion`. SOLID suggestions describe a
    /// design change no transformer performs.
    pub fn from_suggestion(suggestion: &RefactoringSuggestion) -> Result<Self> {
        let target = suggestion.location.clone();
        match &suggestion.kind {
            SuggestionKind::ExtractMethod { method_name, .. } => {
                Ok(Self::ExtractMethod(ExtractMethodRequest {
                    target,
                    method_name: Some(method_name.clone()),
                }))
            }
            SuggestionKind::RemoveDuplication {
                shared_method_name,
                instances,
                ..
            } => Ok(Self::RemoveDuplication(DuplicationRequest {
                instances: instances.clone(),
                shared_name: Some(shared_method_name.clone()),
            })),
            SuggestionKind::SimplifyConditional {
                strategy,
                variable_name,
            } => Ok(Self::SimplifyConditional(ConditionalRequest {
                target,
                strategy: *strategy,
                variable_name: variable_name.clone(),
            })),
            SuggestionKind::Rename {
                old_name,
                new_name,
                scope,
                ..
            } => Ok(Self::Rename(RenameRequest {
                old_name: old_name.clone(),
                new_name: new_name.clone(),
                scope: scope.clone(),
                location: Some(target),
            })),
            SuggestionKind::SplitClass { .. } | SuggestionKind::IntroduceInterface { .. } => {
                Err(RefactronError::transformation_with_code(
                    ErrorCode::UNSUPPORTED_STRATEGY,
                    suggestion.refactoring_type().as_str(),
                    "class-level design changes are advisory and cannot be applied automatically",
                ))
            }
        }
    }
}

/// The four transformers, sharing one naming service.
#[derive(Debug, Clone, Default)]
pub struct Transformers {
    extract: ExtractMethodTransformer,
    duplication: DuplicationTransformer,
    conditional: ConditionalTransformer,
    rename: RenameTransformer,
}

impl Transformers {
    pub fn new(naming: NamingService) -> Self {
        Self {
            extract: ExtractMethodTransformer::new(naming.clone()),
            duplication: DuplicationTransformer::new(naming.clone()),
            conditional: ConditionalTransformer::new(naming),
            rename: RenameTransformer,
        }
    }

    pub fn apply(&self, source: &str, file: &Path, request: &RefactoringRequest) -> TransformResult {
        match request {
            RefactoringRequest::ExtractMethod(r) => self.extract.transform(source, file, r),
            RefactoringRequest::RemoveDuplication(r) => self.duplication.transform(source, file, r),
            RefactoringRequest::SimplifyConditional(r) => self.conditional.transform(source, file, r),
            RefactoringRequest::Rename(r) => self.rename.transform(source, file, r),
        }
    }

    pub fn apply_suggestion(
        &self,
        source: &str,
        file: &Path,
        suggestion: &RefactoringSuggestion,
    ) -> TransformResult {
        match RefactoringRequest::from_suggestion(suggestion) {
            Ok(request) => self.apply(source, file, &request),
            Err(error) => TransformResult::failed(source, error),
        }
    }
}
