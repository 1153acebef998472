use super::preview::Preview;
use super::{priority_score, sort_by_priority, RefactoringSuggestion, RefactoringType, SuggestionKind};
use crate::ast::{parse_source, unified_diff, NodeKind, ScopeTable, SyntaxTree};
use crate::collaborator::{NamingService, SolidAdvice};
use crate::core::{CodeBlock, Effort, IdentifierKind, Language, Location, RiskLevel, Scope, Severity};
use crate::errors::{ErrorCode, RefactronError, Result};
use crate::smells::{CodeSmell, SolidPrinciple};
use crate::transformers::analysis::{analyze_range, locate_range, FinalReturn};
use crate::transformers::{
    condition_expression, ConditionalRequest, DuplicationRequest, ExtractMethodRequest,
    RefactoringRequest, RenameRequest, SimplificationStrategy, Transformers,
};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Keyword found in duplicated code, and the shared function name it suggests.
const SHARED_NAMES: &[(&str, &str)] = &[
    ("validat", "validateData"),
    ("calculat", "calculateValue"),
    ("format", "formatData"),
    ("fetch", "fetchData"),
    ("pars", "parseData"),
    ("render", "renderView"),
    ("save", "saveData"),
    ("send", "sendRequest"),
    ("filter", "filterItems"),
    ("sort", "sortItems"),
    ("log", "logMessage"),
];

const DEFAULT_SHARED_NAME: &str = "sharedLogic";

const RENAME_ATTEMPTS: usize = 5;

/// Turns smells into previewed suggestions.
#[derive(Debug, Clone, Default)]
pub struct RefactoringSuggester {
    naming: NamingService,
    transformers: Transformers,
}

/// Per-call id sequence, so ids are stable for the same input.
struct Ids {
    next: usize,
}

impl Ids {
    fn next(&mut self, kind: RefactoringType, location: &Location) -> String {
        self.next += 1;
        format!("{}-{}-{}", kind.as_str(), location.start.line, self.next)
    }
}

impl RefactoringSuggester {
    pub fn new(naming: NamingService) -> Self {
        Self {
            transformers: Transformers::new(naming.clone()),
            naming,
        }
    }

    /// Suggestions for the smells of one file, highest priority first.
    /// Smells that cannot be turned into a working rewrite are skipped.
    pub fn suggest(&self, source: &str, file: &Path, smells: &[CodeSmell]) -> Result<Vec<RefactoringSuggestion>> {
        let tree = parse_source(source, file)?;
        let scopes = ScopeTable::build(&tree);
        let mut ids = Ids { next: 0 };
        let mut suggestions = Vec::new();

        for smell in smells {
            let produced = match smell {
                CodeSmell::LongMethod {
                    method_name,
                    line_count,
                    threshold,
                    extractable_blocks,
                    severity,
                    ..
                } => self
                    .extract_method(&tree, &scopes, method_name, *line_count, *threshold, extractable_blocks, *severity, &mut ids)
                    .into_iter()
                    .collect(),
                CodeSmell::Duplication {
                    instances,
                    similarity,
                    severity,
                    ..
                } => self
                    .remove_duplication(&tree, instances, *similarity, *severity, &mut ids)
                    .into_iter()
                    .collect(),
                CodeSmell::ComplexConditional {
                    complexity,
                    nesting_level,
                    switch_cases,
                    severity,
                    location,
                } => {
                    if switch_cases.is_some() {
                        log::debug!("No automatic rewrite for the switch at {}", location);
                        Vec::new()
                    } else {
                        self.simplify_conditional(&tree, location, *complexity, *nesting_level, *severity, &mut ids)
                            .into_iter()
                            .collect()
                    }
                }
                CodeSmell::PoorNaming {
                    name,
                    identifier_kind,
                    scope,
                    severity,
                    location,
                    ..
                } => self
                    .rename(&tree, name, *identifier_kind, scope, location, *severity, &mut ids)
                    .into_iter()
                    .collect(),
                CodeSmell::SolidViolation {
                    principle,
                    class_name,
                    violation,
                    severity,
                    location,
                } => self.solid(&tree, *principle, class_name, violation, *severity, location, &mut ids),
            };
            if produced.is_empty() {
                log::debug!("Skipped {} smell at {}", smell.kind_name(), smell.location());
            }
            suggestions.extend(produced);
        }

        sort_by_priority(&mut suggestions);
        log::debug!(
            "{} suggestion(s) from {} smell(s) in {}",
            suggestions.len(),
            smells.len(),
            file.display()
        );
        Ok(suggestions)
    }

    /// [`suggest`](Self::suggest) for many files in parallel.
    pub fn suggest_many(
        &self,
        inputs: &[(PathBuf, String, Vec<CodeSmell>)],
    ) -> Vec<(PathBuf, Result<Vec<RefactoringSuggestion>>)> {
        inputs
            .par_iter()
            .map(|(file, source, smells)| (file.clone(), self.suggest(source, file, smells)))
            .collect()
    }

    fn preview(&self, tree: &SyntaxTree, request: &RefactoringRequest) -> Result<Preview> {
        let (code, _) = self
            .transformers
            .apply(tree.source(), tree.file(), request)
            .into_result()?;
        Preview::between(tree, &code)
            .ok_or_else(|| RefactronError::transformation("preview", "rewrite left the code unchanged"))
    }

    #[allow(clippy::too_many_arguments)]
    fn extract_method(
        &self,
        tree: &SyntaxTree,
        scopes: &ScopeTable,
        method_name: &str,
        line_count: usize,
        threshold: usize,
        blocks: &[CodeBlock],
        severity: Severity,
        ids: &mut Ids,
    ) -> Option<RefactoringSuggestion> {
        for block in blocks {
            let analysis = match locate_range(tree, &block.location, "extract_method")
                .and_then(|range| analyze_range(tree, scopes, &range, "extract_method"))
            {
                Ok(analysis) => analysis,
                Err(e) => {
                    log::debug!("Block at {} cannot be extracted: {}", block.location, e);
                    continue;
                }
            };
            let name = self.naming.method_name(&block.code, Some(method_name));
            let request = RefactoringRequest::ExtractMethod(ExtractMethodRequest {
                target: block.location.clone(),
                method_name: Some(name.clone()),
            });
            let preview = match self.preview(tree, &request) {
                Ok(preview) => preview,
                Err(e) => {
                    log::debug!("Extract preview at {} failed: {}", block.location, e);
                    continue;
                }
            };

            let returns_value = analysis.live_out.is_some()
                || matches!(
                    analysis.final_return,
                    FinalReturn::Identifier { .. } | FinalReturn::Expression
                );
            let return_type = if returns_value { "any" } else { "void" };
            let risk = if analysis.param_names.len() > 3 || analysis.live_out.is_some() {
                RiskLevel::Medium
            } else {
                RiskLevel::Low
            };
            let effort = match block.location.line_count() {
                0..=10 => Effort::Low,
                11..=30 => Effort::Medium,
                _ => Effort::High,
            };
            return Some(RefactoringSuggestion {
                id: ids.next(RefactoringType::ExtractMethod, &block.location),
                title: format!("Extract method '{}' from '{}'", name, method_name),
                description: format!(
                    "'{}' has {} lines (threshold: {}). Moving lines {}-{} into '{}' shortens it.",
                    method_name,
                    line_count,
                    threshold,
                    block.location.start_line(),
                    block.location.end_line(),
                    name
                ),
                before_code: preview.before,
                after_code: preview.after,
                diff: preview.diff,
                benefits: vec![
                    "Shorter function with a single level of abstraction".to_string(),
                    "Extracted logic gets a name and can be tested on its own".to_string(),
                ],
                risk_level: risk,
                estimated_effort: effort,
                priority: priority_score(severity, risk),
                location: block.location.clone(),
                kind: SuggestionKind::ExtractMethod {
                    method_name: name,
                    parameters: analysis.param_names,
                    return_type: return_type.to_string(),
                },
            });
        }
        None
    }

    fn remove_duplication(
        &self,
        tree: &SyntaxTree,
        instances: &[CodeBlock],
        similarity: f64,
        severity: Severity,
        ids: &mut Ids,
    ) -> Option<RefactoringSuggestion> {
        let first = instances.first()?;
        let name = shared_method_name(&first.code);
        let locations: Vec<Location> = instances.iter().map(|b| b.location.clone()).collect();
        let request = RefactoringRequest::RemoveDuplication(DuplicationRequest {
            instances: locations.clone(),
            shared_name: Some(name.clone()),
        });
        let preview = self
            .preview(tree, &request)
            .map_err(|e| log::debug!("Duplication preview at {} failed: {}", first.location, e))
            .ok()?;

        let risk = match instances.len() {
            2 if similarity >= 0.95 => RiskLevel::Low,
            2 | 3 => RiskLevel::Medium,
            _ => RiskLevel::High,
        };
        let effort = match instances.len() {
            2 => Effort::Low,
            3 | 4 => Effort::Medium,
            _ => Effort::High,
        };
        Some(RefactoringSuggestion {
            id: ids.next(RefactoringType::RemoveDuplication, &first.location),
            title: format!(
                "Replace {} duplicated blocks with '{}'",
                instances.len(),
                name
            ),
            description: format!(
                "{} blocks are {:.0}% similar. One shared function replaces all of them.",
                instances.len(),
                similarity * 100.0
            ),
            before_code: preview.before,
            after_code: preview.after,
            diff: preview.diff,
            benefits: vec![
                "One place to change the duplicated logic".to_string(),
                "Less code to read and maintain".to_string(),
            ],
            risk_level: risk,
            estimated_effort: effort,
            priority: priority_score(severity, risk),
            location: first.location.clone(),
            kind: SuggestionKind::RemoveDuplication {
                shared_method_name: name,
                instances: locations,
                similarity,
            },
        })
    }

    fn simplify_conditional(
        &self,
        tree: &SyntaxTree,
        location: &Location,
        complexity: usize,
        nesting_level: usize,
        severity: Severity,
        ids: &mut Ids,
    ) -> Option<RefactoringSuggestion> {
        let preferred = choose_strategy(complexity, nesting_level);
        let mut attempts = vec![preferred];
        if preferred != SimplificationStrategy::ExtractVariable {
            attempts.push(SimplificationStrategy::ExtractVariable);
        }

        for strategy in attempts {
            let variable_name = match strategy {
                SimplificationStrategy::ExtractVariable => Some(self.condition_variable(tree, location)?),
                _ => None,
            };
            let request = RefactoringRequest::SimplifyConditional(ConditionalRequest {
                target: location.clone(),
                strategy,
                variable_name: variable_name.clone(),
            });
            let preview = match self.preview(tree, &request) {
                Ok(preview) => preview,
                Err(e) => {
                    log::debug!("{} preview at {} failed: {}", strategy, location, e);
                    continue;
                }
            };
            let (risk, effort, summary) = match strategy {
                SimplificationStrategy::GuardClause => (
                    RiskLevel::Medium,
                    Effort::Medium,
                    "Return early on the inverted test to remove a level of nesting",
                ),
                SimplificationStrategy::Consolidate => (
                    RiskLevel::Medium,
                    Effort::Medium,
                    "Merge the adjacent ifs that test the same condition",
                ),
                SimplificationStrategy::ExtractVariable => (
                    RiskLevel::Low,
                    Effort::Low,
                    "Name the test with a descriptive constant",
                ),
            };
            return Some(RefactoringSuggestion {
                id: ids.next(RefactoringType::SimplifyConditional, location),
                title: format!("Simplify conditional ({})", strategy),
                description: format!(
                    "Conditional with complexity {} at nesting level {}. {}.",
                    complexity, nesting_level, summary
                ),
                before_code: preview.before,
                after_code: preview.after,
                diff: preview.diff,
                benefits: vec![
                    "Flatter control flow".to_string(),
                    "Intent of the test is easier to read".to_string(),
                ],
                risk_level: risk,
                estimated_effort: effort,
                priority: priority_score(severity, risk),
                location: location.clone(),
                kind: SuggestionKind::SimplifyConditional {
                    strategy,
                    variable_name,
                },
            });
        }
        None
    }

    fn condition_variable(&self, tree: &SyntaxTree, location: &Location) -> Option<String> {
        let if_node = tree.find_at(location, |n| matches!(n.kind, NodeKind::If))?;
        let test = condition_expression(tree, if_node)?;
        Some(self.naming.variable_name("condition", tree.text(test), Some("boolean")))
    }

    #[allow(clippy::too_many_arguments)]
    fn rename(
        &self,
        tree: &SyntaxTree,
        name: &str,
        kind: IdentifierKind,
        scope: &Scope,
        location: &Location,
        severity: Severity,
        ids: &mut Ids,
    ) -> Option<RefactoringSuggestion> {
        let usage = source_line(tree.source(), location.start.line);
        let base = match kind {
            IdentifierKind::Variable | IdentifierKind::Parameter => self.naming.variable_name(name, usage, None),
            IdentifierKind::Function | IdentifierKind::Method => self.naming.heuristics().function_name(name),
            IdentifierKind::Class => self.naming.heuristics().class_name(name),
        };
        if base == name {
            return None;
        }

        for attempt in 0..RENAME_ATTEMPTS {
            let candidate = match attempt {
                0 => base.clone(),
                n => format!("{}{}", base, n + 1),
            };
            let request = RefactoringRequest::Rename(RenameRequest {
                old_name: name.to_string(),
                new_name: candidate.clone(),
                scope: scope.clone(),
                location: Some(location.clone()),
            });
            let preview = match self.preview(tree, &request) {
                Ok(preview) => preview,
                Err(e) if e.code() == ErrorCode::NAMING_CONFLICT => {
                    log::debug!("'{}' is taken in {}, trying another name", candidate, scope);
                    continue;
                }
                Err(e) => {
                    log::debug!("Rename preview for '{}' failed: {}", name, e);
                    return None;
                }
            };
            let risk = match (kind, scope.is_top_level()) {
                (IdentifierKind::Variable | IdentifierKind::Parameter, false) => RiskLevel::Low,
                _ => RiskLevel::Medium,
            };
            return Some(RefactoringSuggestion {
                id: ids.next(RefactoringType::Rename, location),
                title: format!("Rename {} '{}' to '{}'", kind, name, candidate),
                description: format!(
                    "'{}' does not describe what it holds. Every reference in {} is renamed.",
                    name, scope
                ),
                before_code: preview.before,
                after_code: preview.after,
                diff: preview.diff,
                benefits: vec!["Code reads without looking up what the name refers to".to_string()],
                risk_level: risk,
                estimated_effort: Effort::Low,
                priority: priority_score(severity, risk),
                location: location.clone(),
                kind: SuggestionKind::Rename {
                    old_name: name.to_string(),
                    new_name: candidate,
                    identifier_kind: kind,
                    scope: scope.clone(),
                },
            });
        }
        log::debug!("No free name for '{}' after {} attempts", name, RENAME_ATTEMPTS);
        None
    }

    #[allow(clippy::too_many_arguments)]
    fn solid(
        &self,
        tree: &SyntaxTree,
        principle: SolidPrinciple,
        class_name: &str,
        violation: &str,
        severity: Severity,
        location: &Location,
        ids: &mut Ids,
    ) -> Vec<RefactoringSuggestion> {
        let before = tree
            .find_at(location, |n| matches!(n.kind, NodeKind::Class { .. }))
            .map(|class| tree.text(class).to_string())
            .unwrap_or_default();
        let advice = self.naming.solid_advice(class_name, &before, principle);
        let typescript = matches!(tree.language(), Language::TypeScript | Language::Tsx);

        let mut kinds = Vec::new();
        match principle {
            SolidPrinciple::SingleResponsibility => {
                kinds.push(RefactoringType::SplitClass);
                if severity == Severity::High {
                    kinds.push(RefactoringType::IntroduceInterface);
                }
            }
            SolidPrinciple::InterfaceSegregation | SolidPrinciple::DependencyInversion => {
                kinds.push(RefactoringType::IntroduceInterface);
            }
        }

        kinds
            .into_iter()
            .map(|kind| {
                let (after, payload) = match kind {
                    RefactoringType::SplitClass => (
                        split_class_skeleton(class_name, &advice),
                        SuggestionKind::SplitClass {
                            class_name: class_name.to_string(),
                            advice: advice.clone(),
                        },
                    ),
                    _ => (
                        interface_skeleton(class_name, &advice, typescript),
                        SuggestionKind::IntroduceInterface {
                            class_name: class_name.to_string(),
                            advice: advice.clone(),
                        },
                    ),
                };
                let diff = unified_diff(&before, &after, &location.file.display().to_string());
                RefactoringSuggestion {
                    id: ids.next(kind, location),
                    title: format!("{} ({}): {}", kind, principle, class_name),
                    description: format!("{}. {} {}", violation, advice.suggestion, advice.explanation),
                    before_code: before.clone(),
                    after_code: after,
                    diff,
                    benefits: vec![
                        "Each class has one reason to change".to_string(),
                        "Collaborators can be substituted in tests".to_string(),
                    ],
                    risk_level: RiskLevel::High,
                    estimated_effort: Effort::High,
                    priority: priority_score(severity, RiskLevel::High),
                    location: location.clone(),
                    kind: payload,
                }
            })
            .collect()
    }
}

fn choose_strategy(complexity: usize, nesting_level: usize) -> SimplificationStrategy {
    if nesting_level > 3 {
        SimplificationStrategy::GuardClause
    } else if complexity > 15 {
        SimplificationStrategy::Consolidate
    } else {
        SimplificationStrategy::ExtractVariable
    }
}

fn shared_method_name(code: &str) -> String {
    let lower = code.to_lowercase();
    SHARED_NAMES
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| DEFAULT_SHARED_NAME.to_string())
}

fn source_line(source: &str, line: usize) -> &str {
    source.lines().nth(line.saturating_sub(1)).unwrap_or("").trim()
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn split_class_skeleton(class_name: &str, advice: &SolidAdvice) -> String {
    format!(
        "// {suggestion}\nclass {name}Core {{\n  // members serving the primary responsibility\n}}\n\n\
         class {name}Support {{\n  // members moved out of {name}\n}}\n\n\
         class {name} {{\n  constructor(core = new {name}Core(), support = new {name}Support()) {{\n    \
         this.core = core;\n    this.support = support;\n  }}\n}}\n",
        suggestion = one_line(&advice.suggestion),
        name = class_name
    )
}

fn interface_skeleton(class_name: &str, advice: &SolidAdvice, typescript: bool) -> String {
    if typescript {
        format!(
            "// {suggestion}\ninterface I{name} {{\n  // operations clients depend on\n}}\n\n\
             class {name} implements I{name} {{\n  constructor(private readonly dependencies: unknown) {{}}\n}}\n",
            suggestion = one_line(&advice.suggestion),
            name = class_name
        )
    } else {
        format!(
            "// {suggestion}\n/** @interface */\nclass {name}Contract {{\n  // operations clients depend on\n}}\n\n\
             class {name} extends {name}Contract {{\n  constructor(dependencies) {{\n    super();\n    \
             this.dependencies = dependencies;\n  }}\n}}\n",
            suggestion = one_line(&advice.suggestion),
            name = class_name
        )
    }
}
