use super::analysis::{is_write, unique_name};
use super::{Change, Transformer};
use crate::ast::text::{detect_indent_unit, is_reserved, is_valid_identifier, line_indent, reindent};
use crate::ast::{normalized_node_text, parse_source, NodeId, NodeKind, ScopeTable, SyntaxTree, TreeEditor};
use crate::collaborator::NamingService;
use crate::core::Location;
use crate::errors::{ErrorCode, RefactronError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimplificationStrategy {
    /// Invert the test and return early.
    GuardClause,
    /// Name the test with a `const` declared before the `if`.
    ExtractVariable,
    /// Merge adjacent `if`s that share a test.
    Consolidate,
}

impl SimplificationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GuardClause => "guard_clause",
            Self::ExtractVariable => "extract_variable",
            Self::Consolidate => "consolidate",
        }
    }
}

impl fmt::Display for SimplificationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalRequest {
    /// Location of the `if` statement.
    pub target: Location,
    pub strategy: SimplificationStrategy,
    /// Name for the extracted test; asked from the naming service when absent.
    pub variable_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConditionalTransformer {
    naming: NamingService,
}

const INVERSES: &[(&str, &str)] = &[
    ("==", "!="),
    ("!=", "=="),
    ("===", "!=="),
    ("!==", "==="),
    ("<", ">="),
    ("<=", ">"),
    (">", "<="),
    (">=", "<"),
];

struct Rewrite {
    code: String,
    changes: Vec<Change>,
    introduced: Vec<String>,
}

impl ConditionalTransformer {
    pub fn new(naming: NamingService) -> Self {
        Self { naming }
    }

    fn fail(&self, message: impl Into<String>) -> RefactronError {
        RefactronError::transformation(self.name(), message)
    }

    fn guard_clause(&self, tree: &SyntaxTree, scopes: &ScopeTable, if_node: NodeId) -> Result<Rewrite> {
        let source = tree.source();
        let list = statement_list_parent(tree, if_node)
            .ok_or_else(|| self.fail("guard clause needs an if statement inside a block"))?;
        let condition = condition_expression(tree, if_node)
            .ok_or_else(|| self.fail("if statement has no condition"))?;
        let consequence = tree
            .child_by_field(if_node, "consequence")
            .ok_or_else(|| self.fail("if statement has no body"))?;
        let body = branch_statements(tree, consequence);
        let indent = line_indent(source, tree.node(if_node).span.start).to_string();
        let inner = format!("{}{}", indent, detect_indent_unit(source));

        let (exit, exit_indent, last) = match tree.child_by_field(if_node, "alternative") {
            Some(else_clause) => {
                let branch = first_named_child(tree, else_clause)
                    .ok_or_else(|| self.fail("empty else clause"))?;
                if matches!(tree.kind(branch), NodeKind::If) {
                    return Err(self.fail("an else-if chain cannot become a guard clause"));
                }
                let statements = branch_statements(tree, branch);
                if !statements.last().map(|s| exits(tree, *s)).unwrap_or(false) {
                    return Err(self.fail("else branch must end in a return or throw"));
                }
                let from = line_indent(source, tree.node(statements[0]).span.start);
                (statements_text(tree, &statements), from, if_node)
            }
            None => {
                let siblings = tree.statements(list);
                let position = siblings.iter().position(|s| *s == if_node).unwrap_or(0);
                let in_function_body = tree
                    .parent(list)
                    .map(|p| tree.node(p).is_function_like())
                    .unwrap_or(false);
                if !in_function_body {
                    return Err(self.fail("guard clause requires a trailing return or throw"));
                }
                match siblings.get(position + 1) {
                    None => ("return;".to_string(), "", if_node),
                    Some(next)
                        if position + 2 == siblings.len()
                            && exits(tree, *next)
                            && body.last().map(|s| exits(tree, *s)).unwrap_or(false) =>
                    {
                        let from = line_indent(source, tree.node(*next).span.start);
                        (tree.text(*next).to_string(), from, *next)
                    }
                    _ => return Err(self.fail("guard clause requires a trailing return or throw")),
                }
            }
        };

        // The body moves out one block; its lexical names must stay free there.
        if let Some(block_scope) = scopes.scope_of_node(consequence) {
            let outer = scopes.scope_at(tree, if_node);
            if let Some((_, clash)) = scopes
                .bindings()
                .find(|(_, b)| b.scope == block_scope && scopes.lookup_local(outer, &b.name).is_some())
            {
                return Err(self.fail(format!(
                    "'{}' is already declared where the body would move",
                    clash.name
                )));
            }
        }

        let mut text = format!(
            "if ({}) {{\n{}\n{}}}",
            invert(tree, condition),
            reindent(&exit, exit_indent, &inner),
            indent
        );
        if let Some(first) = body.first() {
            let from = line_indent(source, tree.node(*first).span.start);
            text.push('\n');
            text.push_str(&reindent(&statements_text(tree, &body), from, &indent));
        }

        let mut editor = TreeEditor::new(tree);
        editor.replace_range(if_node, last, text.clone())?;
        let old = &source[tree.node(if_node).span.start..tree.node(last).span.end];
        Ok(Rewrite {
            changes: vec![Change::modify(tree.range_location(if_node, last), old, text)],
            code: editor.render(),
            introduced: Vec::new(),
        })
    }

    fn extract_variable(
        &self,
        tree: &SyntaxTree,
        scopes: &ScopeTable,
        if_node: NodeId,
        requested: Option<&str>,
    ) -> Result<Rewrite> {
        if statement_list_parent(tree, if_node).is_none() {
            return Err(self.fail("the test of an else-if or unbraced if cannot be lifted"));
        }
        let condition = condition_expression(tree, if_node)
            .ok_or_else(|| self.fail("if statement has no condition"))?;
        let test = tree.text(condition);
        let base = match requested {
            Some(name) => name.to_string(),
            None => self.naming.variable_name("condition", test, Some("boolean")),
        };
        if !is_valid_identifier(&base) || is_reserved(&base) {
            return Err(RefactronError::reserved_name(
                base.clone(),
                format!("'{}' is not a usable variable name", base),
            ));
        }
        let mut taken = scopes.all_names();
        taken.extend(scopes.unresolved().iter().map(|id| tree.text(*id)));
        let name = unique_name(&base, &taken);

        let indent = line_indent(tree.source(), tree.node(if_node).span.start);
        let declaration = format!("const {} = {};", name, test);
        let mut editor = TreeEditor::new(tree);
        editor.insert_before(if_node, format!("{}\n{}", declaration, indent))?;
        editor.replace(condition, name.clone())?;

        let start = tree.node(if_node).start;
        Ok(Rewrite {
            code: editor.render(),
            changes: vec![
                Change::add(Location::new(tree.file(), start, start), declaration),
                Change::modify(tree.location(condition), test, name.clone()),
            ],
            introduced: vec![name],
        })
    }

    fn consolidate(&self, tree: &SyntaxTree, scopes: &ScopeTable, if_node: NodeId) -> Result<Rewrite> {
        let no_repeat = || {
            RefactronError::transformation_with_code(
                ErrorCode::NO_REPEATED_CONDITION,
                self.name(),
                "no repeated conditional logic",
            )
        };
        let list = statement_list_parent(tree, if_node).ok_or_else(no_repeat)?;
        let siblings = tree.statements(list);
        let position = siblings.iter().position(|s| *s == if_node).ok_or_else(no_repeat)?;
        let key = |id: NodeId| -> Option<String> {
            if !matches!(tree.kind(id), NodeKind::If) || tree.child_by_field(id, "alternative").is_some() {
                return None;
            }
            condition_expression(tree, id).map(|c| normalized_node_text(tree, c))
        };
        let target_key = key(if_node).ok_or_else(no_repeat)?;

        let mut start = position;
        if siblings.get(position + 1).and_then(|s| key(*s)).as_ref() != Some(&target_key) {
            while start > 0 && key(siblings[start - 1]).as_ref() == Some(&target_key) {
                start -= 1;
            }
        }
        let mut end = start;
        while end + 1 < siblings.len() && key(siblings[end + 1]).as_ref() == Some(&target_key) {
            end += 1;
        }
        if end == start {
            return Err(no_repeat());
        }
        let run = &siblings[start..=end];

        let condition = condition_expression(tree, run[0]).ok_or_else(no_repeat)?;
        self.check_stable_condition(tree, condition, &run[..run.len() - 1])?;

        let mut declared = HashSet::new();
        for id in run {
            let Some(body) = tree.child_by_field(*id, "consequence") else {
                continue;
            };
            let Some(block_scope) = scopes.scope_of_node(body) else {
                continue;
            };
            for (_, binding) in scopes.bindings().filter(|(_, b)| b.scope == block_scope) {
                if !declared.insert(binding.name.clone()) {
                    return Err(self.fail(format!(
                        "'{}' is declared in more than one of the merged blocks",
                        binding.name
                    )));
                }
            }
        }

        let source = tree.source();
        let indent = line_indent(source, tree.node(run[0]).span.start);
        let inner = format!("{}{}", indent, detect_indent_unit(source));
        let merged: Vec<String> = run
            .iter()
            .filter_map(|id| tree.child_by_field(*id, "consequence"))
            .map(|body| branch_statements(tree, body))
            .filter(|statements| !statements.is_empty())
            .map(|statements| {
                let from = line_indent(source, tree.node(statements[0]).span.start);
                reindent(&statements_text(tree, &statements), from, &inner)
            })
            .collect();
        let text = format!("if ({}) {{\n{}\n{}}}", tree.text(condition), merged.join("\n"), indent);

        let first = run[0];
        let last = run[run.len() - 1];
        let mut editor = TreeEditor::new(tree);
        editor.replace_range(first, last, text.clone())?;
        let old = &source[tree.node(first).span.start..tree.node(last).span.end];
        log::debug!("Merged {} if statements sharing one test", run.len());
        Ok(Rewrite {
            changes: vec![Change::modify(tree.range_location(first, last), old, text)],
            code: editor.render(),
            introduced: Vec::new(),
        })
    }

    /// The shared test must read the same value before every merged body.
    fn check_stable_condition(&self, tree: &SyntaxTree, condition: NodeId, bodies: &[NodeId]) -> Result<()> {
        let test_nodes: Vec<NodeId> = std::iter::once(condition).chain(tree.descendants(condition)).collect();
        let impure = test_nodes.iter().any(|id| {
            matches!(tree.kind(*id), NodeKind::Call | NodeKind::New | NodeKind::Await | NodeKind::Yield)
                || matches!(
                    tree.node(*id).ts_kind,
                    "assignment_expression" | "augmented_assignment_expression" | "update_expression"
                )
        });
        if impure {
            return Err(self.fail("the shared test has side effects"));
        }
        let names: HashSet<&str> = test_nodes
            .iter()
            .filter_map(|id| match tree.kind(*id) {
                NodeKind::Identifier { name } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        let reads_members = test_nodes.iter().any(|id| matches!(tree.kind(*id), NodeKind::Member));

        for if_node in bodies {
            let Some(body) = tree.child_by_field(*if_node, "consequence") else {
                continue;
            };
            for id in std::iter::once(body).chain(tree.descendants(body)) {
                let writes_name = match tree.kind(id) {
                    NodeKind::Identifier { name } => names.contains(name.as_str()) && is_write(tree, id),
                    _ => false,
                };
                let may_mutate = reads_members
                    && (matches!(tree.kind(id), NodeKind::Call | NodeKind::New)
                        || matches!(
                            tree.node(id).ts_kind,
                            "assignment_expression" | "augmented_assignment_expression" | "update_expression"
                        ));
                if writes_name || may_mutate {
                    return Err(self.fail("a merged body may change the value of the shared test"));
                }
            }
        }
        Ok(())
    }
}

impl Transformer for ConditionalTransformer {
    type Request = ConditionalRequest;

    fn name(&self) -> &'static str {
        "simplify_conditional"
    }

    fn rewrite(&self, source: &str, file: &Path, request: &ConditionalRequest) -> Result<(String, Vec<Change>)> {
        let tree = parse_source(source, file)?;
        let scopes = ScopeTable::build(&tree);
        let if_node = tree
            .find_at(&request.target, |n| matches!(n.kind, NodeKind::If))
            .ok_or_else(|| {
                RefactronError::target_not_found(
                    self.name(),
                    format!("no if statement at {}", request.target),
                )
            })?;

        let rewrite = match request.strategy {
            SimplificationStrategy::GuardClause => self.guard_clause(&tree, &scopes, if_node)?,
            SimplificationStrategy::ExtractVariable => {
                self.extract_variable(&tree, &scopes, if_node, request.variable_name.as_deref())?
            }
            SimplificationStrategy::Consolidate => self.consolidate(&tree, &scopes, if_node)?,
        };
        check_equivalence(&tree, &rewrite.code, &rewrite.introduced).map_err(|message| self.fail(message))?;
        Ok((rewrite.code, rewrite.changes))
    }
}

/// Both versions must parse, call the same number of functions and mention
/// the same identifiers apart from newly introduced names.
fn check_equivalence(original: &SyntaxTree, rewritten: &str, introduced: &[String]) -> std::result::Result<(), String> {
    let after = parse_source(rewritten, original.file()).map_err(|e| e.to_string())?;
    let calls = |tree: &SyntaxTree| {
        tree.node_ids()
            .filter(|id| matches!(tree.kind(*id), NodeKind::Call | NodeKind::New))
            .count()
    };
    if calls(original) != calls(&after) {
        return Err("rewrite changed the number of calls".to_string());
    }
    let names = |tree: &SyntaxTree| -> HashSet<String> {
        tree.node_ids()
            .filter_map(|id| tree.node(id).identifier_name().map(str::to_string))
            .collect()
    };
    let before_names = names(original);
    let mut after_names = names(&after);
    for name in introduced {
        after_names.remove(name);
    }
    if before_names != after_names {
        return Err("rewrite changed which identifiers the code mentions".to_string());
    }
    Ok(())
}

fn statement_list_parent(tree: &SyntaxTree, id: NodeId) -> Option<NodeId> {
    tree.parent(id).filter(|p| tree.node(*p).is_statement_list())
}

pub(crate) fn condition_expression(tree: &SyntaxTree, if_node: NodeId) -> Option<NodeId> {
    let condition = tree.child_by_field(if_node, "condition")?;
    match tree.kind(condition) {
        NodeKind::Parenthesized => first_named_child(tree, condition),
        _ => Some(condition),
    }
}

fn first_named_child(tree: &SyntaxTree, id: NodeId) -> Option<NodeId> {
    tree.children(id)
        .iter()
        .copied()
        .find(|c| !matches!(tree.kind(*c), NodeKind::Comment))
}

fn branch_statements(tree: &SyntaxTree, branch: NodeId) -> Vec<NodeId> {
    match tree.kind(branch) {
        NodeKind::Block => tree.statements(branch),
        _ => vec![branch],
    }
}

fn statements_text(tree: &SyntaxTree, statements: &[NodeId]) -> String {
    match (statements.first(), statements.last()) {
        (Some(first), Some(last)) => {
            tree.source()[tree.node(*first).span.start..tree.node(*last).span.end].to_string()
        }
        _ => String::new(),
    }
}

fn exits(tree: &SyntaxTree, id: NodeId) -> bool {
    matches!(tree.kind(id), NodeKind::Return | NodeKind::Throw)
}

/// Logical complement of a test expression.
fn invert(tree: &SyntaxTree, expr: NodeId) -> String {
    let text = tree.text(expr);
    match tree.kind(expr) {
        NodeKind::Binary { operator } => {
            let inverse = INVERSES.iter().find(|(op, _)| op == operator).map(|(_, inv)| *inv);
            match (inverse, tree.child_by_field(expr, "left"), tree.child_by_field(expr, "right")) {
                (Some(inverse), Some(left), Some(right)) => {
                    format!("{} {} {}", tree.text(left), inverse, tree.text(right))
                }
                _ => format!("!({})", text),
            }
        }
        NodeKind::Unary { operator } if operator == "!" => match tree.child_by_field(expr, "argument") {
            Some(argument) if matches!(tree.kind(argument), NodeKind::Parenthesized) => first_named_child(tree, argument)
                .map(|inner| tree.text(inner).to_string())
                .unwrap_or_else(|| tree.text(argument).to_string()),
            Some(argument) => tree.text(argument).to_string(),
            None => format!("!({})", text),
        },
        NodeKind::Identifier { .. }
        | NodeKind::Member
        | NodeKind::Call
        | NodeKind::Parenthesized
        | NodeKind::This => format!("!{}", text),
        _ => format!("!({})", text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn run(source: &str, line: (usize, usize), strategy: SimplificationStrategy) -> super::super::TransformResult {
        ConditionalTransformer::default().transform(
            source,
            Path::new("t.js"),
            &ConditionalRequest {
                target: Location::lines("t.js", line.0, line.1),
                strategy,
                variable_name: None,
            },
        )
    }

    #[test]
    fn test_guard_clause_with_trailing_return() {
        let source = indoc! {"
            function process(user) {
              if (user.active) {
                notify(user);
                return save(user);
              }
              return null;
            }
        "};
        let result = run(source, (2, 5), SimplificationStrategy::GuardClause);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            result.code,
            indoc! {"
                function process(user) {
                  if (!user.active) {
                    return null;
                  }
                  notify(user);
                  return save(user);
                }
            "}
        );
    }

    #[test]
    fn test_guard_clause_from_else_branch_inverts_operator() {
        let source = indoc! {"
            function check(age) {
              if (age >= 18) {
                allow();
              } else {
                throw new Error('minor');
              }
              log(age);
            }
        "};
        let result = run(source, (2, 6), SimplificationStrategy::GuardClause);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            result.code,
            indoc! {"
                function check(age) {
                  if (age < 18) {
                    throw new Error('minor');
                  }
                  allow();
                  log(age);
                }
            "}
        );
    }

    #[test]
    fn test_guard_clause_needs_exit_pattern() {
        let source = "function f(a) {\n  if (a) {\n    go();\n  }\n  more();\n}\n";
        let result = run(source, (2, 4), SimplificationStrategy::GuardClause);
        assert!(!result.success);
        assert_eq!(result.code, source);
    }

    #[test]
    fn test_extract_variable_uses_fallback_name() {
        let source = indoc! {"
            function ship(order) {
              if (order.paid && !order.cancelled) {
                dispatch(order);
              }
            }
        "};
        let result = run(source, (2, 4), SimplificationStrategy::ExtractVariable);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            result.code,
            indoc! {"
                function ship(order) {
                  const isOrderValid = order.paid && !order.cancelled;
                  if (isOrderValid) {
                    dispatch(order);
                  }
                }
            "}
        );
    }

    #[test]
    fn test_consolidate_refuses_when_body_may_change_test() {
        let source = indoc! {"
            function render(user) {
              if (user.admin) {
                showPanel(user);
              }
              if (user.admin) {
                showAudit(user);
              }
              footer();
            }
        "};
        let result = run(source, (2, 4), SimplificationStrategy::Consolidate);
        assert!(!result.success);
        assert_eq!(result.code, source);
    }

    #[test]
    fn test_consolidate_plain_flags() {
        let source = indoc! {"
            function render(admin) {
              if (admin) {
                showPanel();
              }
              if (admin) {
                showAudit();
              }
            }
        "};
        let result = run(source, (5, 7), SimplificationStrategy::Consolidate);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            result.code,
            indoc! {"
                function render(admin) {
                  if (admin) {
                    showPanel();
                    showAudit();
                  }
                }
            "}
        );
    }

    #[test]
    fn test_consolidate_without_repeat_fails_with_code() {
        let source = "function f(a, b) {\n  if (a) {\n    x();\n  }\n  if (b) {\n    y();\n  }\n}\n";
        let result = run(source, (2, 4), SimplificationStrategy::Consolidate);
        assert!(!result.success);
        let error = result.error.unwrap();
        assert_eq!(error.code(), ErrorCode::NO_REPEATED_CONDITION);
        assert!(error.to_string().contains("no repeated conditional logic"));
    }

    #[test]
    fn test_inversion_table() {
        let tree = parse_source("if (a !== b) {}\nif (!(c)) {}\nif (d || e) {}\n", Path::new("t.js")).unwrap();
        let ifs = tree.find_all(|n| matches!(n.kind, NodeKind::If));
        let inverted: Vec<String> = ifs
            .iter()
            .map(|id| invert(&tree, condition_expression(&tree, *id).unwrap()))
            .collect();
        assert_eq!(inverted, vec!["a === b", "c", "!(d || e)"]);
    }
}
