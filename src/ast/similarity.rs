//! Normalized edit-distance similarity between code fragments.

use super::tree::{NodeId, NodeKind, SyntaxTree};

/// Levenshtein distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Similarity in `[0, 1]`: `1 - distance / max_len`. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

/// Source of `node` with comments removed and whitespace collapsed.
pub fn normalized_node_text(tree: &SyntaxTree, node: NodeId) -> String {
    let span = tree.node(node).span.clone();
    let source = tree.source();
    let mut text = String::with_capacity(span.len());
    let mut cursor = span.start;
    for id in tree.descendants(node) {
        if matches!(tree.kind(id), NodeKind::Comment) {
            let comment = &tree.node(id).span;
            if comment.start >= cursor {
                text.push_str(&source[cursor..comment.start]);
                text.push(' ');
                cursor = comment.end;
            }
        }
    }
    text.push_str(&source[cursor..span.end]);
    collapse_whitespace(&text)
}

/// Collapse every whitespace run to one space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_source;
    use proptest::prelude::*;
    use std::path::Path;

    #[test]
    fn test_levenshtein_known_values() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_similarity_extremes() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", "abc"), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_normalized_text_strips_comments_and_whitespace() {
        let tree = parse_source("{\n  a(); // call a\n  /* b */ b();\n}", Path::new("t.js")).unwrap();
        let block = tree.statements(tree.root())[0];
        assert_eq!(normalized_node_text(&tree, block), "{ a(); b(); }");
    }

    proptest! {
        #[test]
        fn prop_similarity_bounded_and_symmetric(a in "[a-z ;(){}]{0,40}", b in "[a-z ;(){}]{0,40}") {
            let s = similarity(&a, &b);
            prop_assert!((0.0..=1.0).contains(&s));
            prop_assert!((s - similarity(&b, &a)).abs() < 1e-12);
        }
    }
}
