use crate::ast::text::line_start;
use crate::ast::{unified_diff, NodeKind, SyntaxTree};
use serde::Serialize;

/// Before and after text of the smallest run of top-level statements that
/// holds every edit a rewrite made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub before: String,
    pub after: String,
    pub diff: String,
}

impl Preview {
    /// Cut `rewritten` down to the region where it differs from the tree's
    /// source. `None` when nothing changed.
    pub fn between(tree: &SyntaxTree, rewritten: &str) -> Option<Self> {
        let old = tree.source();
        if old == rewritten {
            return None;
        }
        let (prefix, suffix) = common_affixes(old, rewritten);
        let (lo, hi) = (prefix, old.len() - suffix);

        let covering: Vec<_> = tree
            .children(tree.root())
            .iter()
            .copied()
            .filter(|id| !matches!(tree.kind(*id), NodeKind::Comment))
            .filter(|id| {
                let span = &tree.node(*id).span;
                span.start <= hi && span.end >= lo
            })
            .collect();
        let start = covering
            .first()
            .map(|id| tree.node(*id).span.start.min(lo))
            .unwrap_or_else(|| line_start(old, lo));
        let end = covering
            .last()
            .map(|id| tree.node(*id).span.end.max(hi))
            .unwrap_or(hi);
        let tail = old.len() - end;

        let before = old[start..end].to_string();
        let after = rewritten[start..rewritten.len() - tail].to_string();
        let diff = unified_diff(&before, &after, &tree.file().display().to_string());
        Some(Self {
            before,
            after,
            diff,
        })
    }
}

/// Byte lengths of the longest common prefix and of the longest common
/// suffix of what remains, both on char boundaries.
fn common_affixes(a: &str, b: &str) -> (usize, usize) {
    let prefix = a
        .char_indices()
        .zip(b.chars())
        .find(|((_, x), y)| x != y)
        .map(|((i, _), _)| i)
        .unwrap_or_else(|| a.len().min(b.len()));
    let (a_rest, b_rest) = (&a[prefix..], &b[prefix..]);
    let suffix = a_rest
        .chars()
        .rev()
        .zip(b_rest.chars().rev())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x.len_utf8())
        .sum();
    (prefix, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{apply_unified_diff, parse_source};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    #[test]
    fn test_common_affixes() {
        assert_eq!(common_affixes("abcXdef", "abcYYdef"), (3, 3));
        assert_eq!(common_affixes("aaa", "aaaa"), (3, 0));
        assert_eq!(common_affixes("é1", "é2"), ("é".len(), 0));
    }

    #[test]
    fn test_region_covers_only_touched_statements() {
        let source = "const a = 1;\nfunction f() {\n  use(a);\n}\nconst b = 2;\n";
        let rewritten = "const a = 1;\nfunction f() {\n  use(a, a);\n}\nconst b = 2;\n";
        let tree = parse_source(source, Path::new("t.js")).unwrap();
        let preview = Preview::between(&tree, rewritten).unwrap();
        assert_eq!(preview.before, "function f() {\n  use(a);\n}");
        assert_eq!(preview.after, "function f() {\n  use(a, a);\n}");
        assert_eq!(apply_unified_diff(&preview.before, &preview.diff).unwrap(), preview.after);
    }

    #[test]
    fn test_appended_function_is_included() {
        let source = "function f() {\n  a();\n}\n";
        let rewritten = "function f() {\n  g();\n}\n\nfunction g() {\n  a();\n}\n";
        let tree = parse_source(source, Path::new("t.js")).unwrap();
        let preview = Preview::between(&tree, rewritten).unwrap();
        assert_eq!(preview.before, "function f() {\n  a();\n}");
        assert_eq!(preview.after, "function f() {\n  g();\n}\n\nfunction g() {\n  a();\n}");
    }

    #[test]
    fn test_unchanged_has_no_preview() {
        let tree = parse_source("let a = 1;\n", Path::new("t.js")).unwrap();
        assert!(Preview::between(&tree, "let a = 1;\n").is_none());
    }
}
