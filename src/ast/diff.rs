//! Unified diff generation and application.
//!
//! Diffs are produced with `similar` and formatted as standard
//! `---`/`+++`/`@@` patches, including the `\ No newline at end of file`
//! marker, so that applying a generated diff to the old text reproduces the
//! new text byte for byte.

use crate::errors::{RefactronError, Result};
use similar::{ChangeTag, TextDiff};
use std::fmt::Write as _;

const CONTEXT_LINES: usize = 3;
const NO_NEWLINE: &str = "\\ No newline at end of file";

/// Generate a unified diff between `old` and `new` labelled with `file`.
/// Returns an empty string when the texts are identical.
pub fn unified_diff(old: &str, new: &str, file: &str) -> String {
    if old == new {
        return String::new();
    }
    let diff = TextDiff::from_lines(old, new);
    let mut out = String::new();
    let _ = writeln!(out, "--- a/{}", file);
    let _ = writeln!(out, "+++ b/{}", file);

    for group in diff.grouped_ops(CONTEXT_LINES) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let old_start = first.old_range().start;
        let old_len = last.old_range().end - old_start;
        let new_start = first.new_range().start;
        let new_len = last.new_range().end - new_start;
        let _ = writeln!(
            out,
            "@@ -{} +{} @@",
            hunk_range(old_start, old_len),
            hunk_range(new_start, new_len)
        );

        for op in &group {
            for change in diff.iter_changes(op) {
                let prefix = match change.tag() {
                    ChangeTag::Equal => ' ',
                    ChangeTag::Delete => '-',
                    ChangeTag::Insert => '+',
                };
                out.push(prefix);
                out.push_str(change.value());
                if change.missing_newline() {
                    out.push('\n');
                    out.push_str(NO_NEWLINE);
                    out.push('\n');
                }
            }
        }
    }
    out
}

fn hunk_range(start: usize, len: usize) -> String {
    match len {
        0 => format!("{},0", start),
        1 => format!("{}", start + 1),
        _ => format!("{},{}", start + 1, len),
    }
}

/// Apply a unified diff produced by [`unified_diff`] to `original`.
pub fn apply_unified_diff(original: &str, diff: &str) -> Result<String> {
    if diff.is_empty() {
        return Ok(original.to_string());
    }
    let old_lines: Vec<&str> = original.split_inclusive('\n').collect();
    let mut out = String::with_capacity(original.len());
    let mut consumed = 0usize;
    let mut last_tag: Option<char> = None;
    let mut in_hunk = false;

    for line in diff.split_terminator('\n') {
        if !in_hunk && (line.starts_with("--- ") || line.starts_with("+++ ")) {
            continue;
        }
        if let Some(header) = line.strip_prefix("@@ ") {
            let (old_start, old_len) = parse_hunk_header(header)?;
            let copy_until = if old_len == 0 {
                old_start
            } else {
                old_start.saturating_sub(1)
            };
            if copy_until < consumed || copy_until > old_lines.len() {
                return Err(patch_error("hunk out of order or out of range"));
            }
            old_lines[consumed..copy_until]
                .iter()
                .for_each(|l| out.push_str(l));
            consumed = copy_until;
            last_tag = None;
            in_hunk = true;
            continue;
        }
        if line == NO_NEWLINE {
            if last_tag == Some('+') && out.ends_with('\n') {
                out.pop();
            }
            continue;
        }
        let mut chars = line.chars();
        let tag = chars.next().ok_or_else(|| patch_error("empty diff line"))?;
        let content = chars.as_str();
        match tag {
            ' ' | '-' => {
                let old = old_lines
                    .get(consumed)
                    .ok_or_else(|| patch_error("diff extends past end of input"))?;
                if old.trim_end_matches('\n') != content {
                    return Err(patch_error(&format!(
                        "context mismatch at line {}",
                        consumed + 1
                    )));
                }
                if tag == ' ' {
                    out.push_str(old);
                }
                consumed += 1;
            }
            '+' => {
                out.push_str(content);
                out.push('\n');
            }
            _ => return Err(patch_error("unrecognized diff line")),
        }
        last_tag = Some(tag);
    }

    old_lines[consumed..].iter().for_each(|l| out.push_str(l));
    Ok(out)
}

fn parse_hunk_header(header: &str) -> Result<(usize, usize)> {
    let old = header
        .split_whitespace()
        .next()
        .and_then(|r| r.strip_prefix('-'))
        .ok_or_else(|| patch_error("malformed hunk header"))?;
    let mut parts = old.splitn(2, ',');
    let start = parts
        .next()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| patch_error("malformed hunk start"))?;
    let len = match parts.next() {
        Some(len) => len
            .parse::<usize>()
            .map_err(|_| patch_error("malformed hunk length"))?,
        None => 1,
    };
    Ok((start, len))
}

fn patch_error(message: &str) -> RefactronError {
    RefactronError::transformation("diff", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_diff_format() {
        let old = "a\nb\nc\n";
        let new = "a\nB\nc\n";
        let diff = unified_diff(old, new, "src/x.js");
        assert_eq!(
            diff,
            indoc! {"
                --- a/src/x.js
                +++ b/src/x.js
                @@ -1,3 +1,3 @@
                 a
                -b
                +B
                 c
            "}
        );
    }

    #[test]
    fn test_identical_inputs_produce_empty_diff() {
        assert_eq!(unified_diff("x\n", "x\n", "f"), "");
        assert_eq!(apply_unified_diff("x\n", "").unwrap(), "x\n");
    }

    #[test]
    fn test_missing_trailing_newline_round_trip() {
        let old = "const a = 1;\nconst b = 2;";
        let new = "const a = 1;\nconst b = 3;\nconst c = 4;";
        let diff = unified_diff(old, new, "f.js");
        assert!(diff.contains(NO_NEWLINE));
        assert_eq!(apply_unified_diff(old, &diff).unwrap(), new);
    }

    #[test]
    fn test_insert_into_empty_file() {
        let diff = unified_diff("", "x\n", "f.js");
        assert!(diff.contains("@@ -0,0 +1 @@"));
        assert_eq!(apply_unified_diff("", &diff).unwrap(), "x\n");
    }

    #[test]
    fn test_context_mismatch_is_error() {
        let diff = unified_diff("a\nb\n", "a\nc\n", "f");
        assert!(apply_unified_diff("z\nb\n", &diff).is_err());
    }

    proptest! {
        #[test]
        fn prop_diff_round_trip(
            old in prop::collection::vec("[a-c]{0,3}", 0..12),
            new in prop::collection::vec("[a-c]{0,3}", 0..12),
            old_nl in any::<bool>(),
            new_nl in any::<bool>(),
        ) {
            let mut old = old.join("\n");
            let mut new = new.join("\n");
            if old_nl && !old.is_empty() { old.push('\n'); }
            if new_nl && !new.is_empty() { new.push('\n'); }
            let diff = unified_diff(&old, &new, "p.js");
            prop_assert_eq!(apply_unified_diff(&old, &diff).unwrap(), new);
        }
    }
}
