use super::CodeSmell;
use crate::ast::{NodeId, NodeKind, SyntaxTree};
use crate::core::Severity;

const SWITCH_CASE_THRESHOLD: usize = 10;

pub(super) fn detect(
    tree: &SyntaxTree,
    complexity_threshold: usize,
    nesting_threshold: usize,
) -> Vec<CodeSmell> {
    let mut smells = Vec::new();
    for id in tree.node_ids() {
        match tree.kind(id) {
            NodeKind::If if !is_else_if(tree, id) => {
                let complexity = 1 + tree
                    .descendants_in_body(id)
                    .into_iter()
                    .filter(|d| matches!(tree.kind(*d), NodeKind::If))
                    .count();
                let nesting_level = nesting_level(tree, id);
                if complexity > complexity_threshold || nesting_level > nesting_threshold {
                    smells.push(CodeSmell::ComplexConditional {
                        complexity,
                        nesting_level,
                        switch_cases: None,
                        severity: conditional_severity(
                            complexity,
                            nesting_level,
                            complexity_threshold,
                            nesting_threshold,
                        ),
                        location: tree.location(id),
                    });
                }
            }
            NodeKind::Switch => {
                let cases = switch_case_count(tree, id);
                if cases > SWITCH_CASE_THRESHOLD {
                    smells.push(CodeSmell::ComplexConditional {
                        complexity: cases,
                        nesting_level: nesting_level(tree, id),
                        switch_cases: Some(cases),
                        severity: if cases > SWITCH_CASE_THRESHOLD * 2 {
                            Severity::High
                        } else {
                            Severity::Medium
                        },
                        location: tree.location(id),
                    });
                }
            }
            _ => {}
        }
    }
    smells
}

/// An `if` that is the direct alternative of another `if` belongs to that chain.
fn is_else_if(tree: &SyntaxTree, id: NodeId) -> bool {
    tree.parent(id)
        .map(|p| matches!(tree.kind(p), NodeKind::Else))
        .unwrap_or(false)
}

/// Enclosing `if`/`for`/`while` nodes up to the function boundary.
pub(crate) fn nesting_level(tree: &SyntaxTree, id: NodeId) -> usize {
    tree.ancestors(id)
        .take_while(|a| !tree.node(*a).is_function_like())
        .filter(|a| matches!(tree.kind(*a), NodeKind::If | NodeKind::For | NodeKind::While))
        .count()
}

fn switch_case_count(tree: &SyntaxTree, id: NodeId) -> usize {
    tree.child_by_field(id, "body")
        .map(|body| {
            tree.children(body)
                .iter()
                .filter(|c| matches!(tree.kind(**c), NodeKind::SwitchCase))
                .count()
        })
        .unwrap_or(0)
}

pub(crate) fn conditional_severity(
    complexity: usize,
    nesting: usize,
    complexity_threshold: usize,
    nesting_threshold: usize,
) -> Severity {
    let complexity_exceeded = complexity > complexity_threshold;
    let nesting_exceeded = nesting > nesting_threshold;
    if (complexity_exceeded && nesting_exceeded)
        || complexity > complexity_threshold * 2
        || nesting > nesting_threshold * 2
    {
        Severity::High
    } else if complexity * 2 > complexity_threshold * 3 || nesting > nesting_threshold + 1 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_source;
    use std::path::Path;

    fn nested_ifs(depth: usize) -> String {
        let mut code = String::from("function f(a) {\n");
        for i in 0..depth {
            code.push_str(&format!("if (a > {}) {{\n", i));
        }
        code.push_str("go();\n");
        for _ in 0..depth {
            code.push_str("}\n");
        }
        code.push_str("}\n");
        code
    }

    #[test]
    fn test_severity_rules() {
        assert_eq!(conditional_severity(15, 5, 10, 4), Severity::High);
        assert_eq!(conditional_severity(16, 0, 10, 4), Severity::Medium);
        assert_eq!(conditional_severity(11, 0, 10, 4), Severity::Low);
        assert_eq!(conditional_severity(21, 0, 10, 4), Severity::High);
        assert_eq!(conditional_severity(1, 6, 10, 4), Severity::Medium);
    }

    #[test]
    fn test_deep_nesting_flagged_on_inner_if() {
        let tree = parse_source(&nested_ifs(6), Path::new("t.js")).unwrap();
        let smells = detect(&tree, 10, 4);
        // The innermost if sits under five others.
        let deepest = smells
            .iter()
            .filter_map(|s| match s {
                CodeSmell::ComplexConditional { nesting_level, .. } => Some(*nesting_level),
                _ => None,
            })
            .max();
        assert_eq!(deepest, Some(5));
    }

    #[test]
    fn test_moderate_conditional_not_flagged() {
        let tree = parse_source(&nested_ifs(3), Path::new("t.js")).unwrap();
        assert!(detect(&tree, 10, 4).is_empty());
    }

    #[test]
    fn test_large_switch_flagged() {
        let cases: String = (0..12).map(|i| format!("case {}: return {};\n", i, i)).collect();
        let source = format!("function f(x) {{ switch (x) {{\n{}default: return -1; }} }}", cases);
        let tree = parse_source(&source, Path::new("t.js")).unwrap();
        let smells = detect(&tree, 10, 4);
        assert_eq!(smells.len(), 1);
        assert!(matches!(
            smells[0],
            CodeSmell::ComplexConditional {
                switch_cases: Some(13),
                severity: Severity::Medium,
                ..
            }
        ));
    }

    #[test]
    fn test_else_if_chain_counts_once() {
        let source = "function f(x) { if (x === 1) { a(); } else if (x === 2) { b(); } else { c(); } }";
        let tree = parse_source(source, Path::new("t.js")).unwrap();
        let smells = detect(&tree, 1, 4);
        assert_eq!(smells.len(), 1);
        assert!(matches!(
            smells[0],
            CodeSmell::ComplexConditional { complexity: 2, .. }
        ));
    }
}
