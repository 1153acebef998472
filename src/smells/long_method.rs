use super::{ratio_severity, CodeSmell};
use crate::ast::{NodeId, NodeKind, SyntaxTree};
use crate::core::CodeBlock;

/// Statements per extraction candidate.
const BLOCK_STATEMENTS: usize = 5;

pub(super) fn detect(tree: &SyntaxTree, threshold: usize) -> Vec<CodeSmell> {
    tree.find_all(|n| n.is_function_like())
        .into_iter()
        .filter_map(|func| {
            let node = tree.node(func);
            let line_count = node.end.line - node.start.line + 1;
            if line_count <= threshold {
                return None;
            }
            Some(CodeSmell::LongMethod {
                method_name: tree.function_name(func),
                line_count,
                threshold,
                extractable_blocks: extractable_blocks(tree, func),
                severity: ratio_severity(line_count, threshold),
                location: tree.location(func),
            })
        })
        .collect()
}

/// Runs of consecutive statements in the function's own statement lists,
/// chunked into non-overlapping groups of at least five. A trailing remainder
/// shorter than five joins the previous chunk.
fn extractable_blocks(tree: &SyntaxTree, func: NodeId) -> Vec<CodeBlock> {
    let Some(body) = tree.function_body(func) else {
        return Vec::new();
    };
    if !matches!(tree.kind(body), NodeKind::Block) {
        return Vec::new();
    }

    let mut lists = vec![body];
    lists.extend(
        tree.descendants_in_body(body)
            .into_iter()
            .filter(|id| tree.node(*id).is_statement_list()),
    );

    let mut blocks = Vec::new();
    for list in lists {
        let statements = tree.statements(list);
        if statements.len() < BLOCK_STATEMENTS {
            continue;
        }
        let mut chunks: Vec<&[NodeId]> = statements.chunks(BLOCK_STATEMENTS).collect();
        if chunks.len() > 1 && chunks[chunks.len() - 1].len() < BLOCK_STATEMENTS {
            chunks.pop();
            let start = (chunks.len() - 1) * BLOCK_STATEMENTS;
            let last = chunks.len() - 1;
            chunks[last] = &statements[start..];
        }
        for chunk in chunks {
            let (Some(first), Some(last)) = (chunk.first(), chunk.last()) else {
                continue;
            };
            let span = tree.node(*first).span.start..tree.node(*last).span.end;
            blocks.push(CodeBlock::new(
                &tree.source()[span],
                tree.range_location(*first, *last),
            ));
        }
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_source;
    use crate::core::Severity;
    use std::path::Path;

    fn function_with_statements(n: usize) -> String {
        let body: String = (0..n).map(|i| format!("  step{}();\n", i)).collect();
        format!("function work() {{\n{}}}\n", body)
    }

    #[test]
    fn test_short_function_not_flagged() {
        let tree = parse_source(&function_with_statements(3), Path::new("t.js")).unwrap();
        assert!(detect(&tree, 20).is_empty());
    }

    #[test]
    fn test_long_function_flagged_with_blocks() {
        let tree = parse_source(&function_with_statements(12), Path::new("t.js")).unwrap();
        let smells = detect(&tree, 10);
        assert_eq!(smells.len(), 1);
        match &smells[0] {
            CodeSmell::LongMethod {
                method_name,
                line_count,
                extractable_blocks,
                severity,
                ..
            } => {
                assert_eq!(method_name, "work");
                assert_eq!(*line_count, 14);
                assert_eq!(*severity, Severity::Low);
                assert_eq!(extractable_blocks.len(), 2);
                assert_eq!(extractable_blocks[0].location.start_line(), 2);
                assert_eq!(extractable_blocks[1].location.end_line(), 13);
            }
            other => panic!("unexpected smell {other:?}"),
        }
    }

    #[test]
    fn test_severity_scales_with_ratio() {
        let tree = parse_source(&function_with_statements(40), Path::new("t.js")).unwrap();
        assert_eq!(detect(&tree, 20)[0].severity(), Severity::High);
    }
}
