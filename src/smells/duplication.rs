use super::CodeSmell;
use crate::ast::{normalized_node_text, similarity, NodeId, NodeKind, SyntaxTree};
use crate::core::{CodeBlock, Location, Severity};

/// Minimum statements for a block to be compared.
const MIN_STATEMENTS: usize = 3;

struct Candidate {
    normalized: String,
    location: Location,
    block: CodeBlock,
}

pub(super) fn detect(tree: &SyntaxTree, threshold: f64) -> Vec<CodeSmell> {
    let candidates = candidates(tree);
    let mut consumed = vec![false; candidates.len()];
    let mut smells = Vec::new();

    for i in 0..candidates.len() {
        if consumed[i] {
            continue;
        }
        let mut group = vec![i];
        let mut lowest = 1.0f64;
        for j in (i + 1)..candidates.len() {
            if consumed[j]
                || group
                    .iter()
                    .any(|g| candidates[*g].location.overlaps(&candidates[j].location))
            {
                continue;
            }
            let score = scored_similarity(&candidates[i].normalized, &candidates[j].normalized, threshold);
            if let Some(score) = score {
                group.push(j);
                lowest = lowest.min(score);
            }
        }
        if group.len() < 2 {
            continue;
        }

        // Blocks nested in (or enclosing) a reported instance are not reported again.
        for k in 0..candidates.len() {
            if group
                .iter()
                .any(|g| candidates[*g].location.overlaps(&candidates[k].location))
            {
                consumed[k] = true;
            }
        }

        let instances: Vec<CodeBlock> = group.iter().map(|g| candidates[*g].block.clone()).collect();
        smells.push(CodeSmell::Duplication {
            location: instances[0].location.clone(),
            instances,
            similarity: lowest,
            severity: if lowest > 0.95 {
                Severity::High
            } else if lowest >= 0.9 {
                Severity::Medium
            } else {
                Severity::Low
            },
        });
    }
    smells
}

/// Similarity when it can reach `threshold`. Length ratio bounds similarity
/// from above, so clearly different sizes skip the edit-distance pass.
fn scored_similarity(a: &str, b: &str, threshold: f64) -> Option<f64> {
    let (la, lb) = (a.chars().count(), b.chars().count());
    let longest = la.max(lb);
    if longest > 0 && (la.min(lb) as f64 / longest as f64) < threshold {
        return None;
    }
    let score = similarity(a, b);
    (score >= threshold).then_some(score)
}

fn candidates(tree: &SyntaxTree) -> Vec<Candidate> {
    tree.find_all(|n| matches!(n.kind, NodeKind::Block))
        .into_iter()
        .filter_map(|block| {
            let statements = tree.statements(block);
            if statements.len() < MIN_STATEMENTS {
                return None;
            }
            let first = *statements.first()?;
            let last = *statements.last()?;
            Some(Candidate {
                normalized: normalized_statements(tree, &statements),
                location: tree.range_location(first, last),
                block: CodeBlock::new(
                    &tree.source()[tree.node(first).span.start..tree.node(last).span.end],
                    tree.range_location(first, last),
                ),
            })
        })
        .collect()
}

fn normalized_statements(tree: &SyntaxTree, statements: &[NodeId]) -> String {
    statements
        .iter()
        .map(|s| normalized_node_text(tree, *s))
        .collect::<Vec<_>>()
        .join(" ")
}
