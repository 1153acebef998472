//! Tree-based source regeneration.
//!
//! A [`TreeEditor`] records edits against node ids of an immutable
//! [`SyntaxTree`] and regenerates source by walking the tree: unedited nodes
//! reproduce their children and the original inter-child text, edited nodes
//! emit their replacement. Nothing is ever substituted by searching text, so
//! identical substrings elsewhere in the file are never touched.

use super::tree::{NodeId, SyntaxTree};
use crate::errors::{RefactronError, Result};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct RangeEdit {
    first: NodeId,
    last: NodeId,
    text: String,
}

pub struct TreeEditor<'a> {
    tree: &'a SyntaxTree,
    ranges: Vec<RangeEdit>,
    range_starts: HashMap<NodeId, usize>,
    before: HashMap<NodeId, Vec<String>>,
    after: HashMap<NodeId, Vec<String>>,
}

impl<'a> TreeEditor<'a> {
    pub fn new(tree: &'a SyntaxTree) -> Self {
        Self {
            tree,
            ranges: Vec::new(),
            range_starts: HashMap::new(),
            before: HashMap::new(),
            after: HashMap::new(),
        }
    }

    pub fn tree(&self) -> &SyntaxTree {
        self.tree
    }

    pub fn replace(&mut self, node: NodeId, text: impl Into<String>) -> Result<()> {
        self.replace_range(node, node, text)
    }

    /// Replace the sibling run `first..=last` with `text`.
    pub fn replace_range(&mut self, first: NodeId, last: NodeId, text: impl Into<String>) -> Result<()> {
        if self.tree.parent(first) != self.tree.parent(last) || first > last {
            return Err(RefactronError::transformation(
                "edit",
                "replacement range must be a run of siblings",
            ));
        }
        let span = self.span(first, last);
        let conflict = self
            .ranges
            .iter()
            .any(|r| overlaps(&span, &self.span(r.first, r.last)))
            || self
                .before
                .keys()
                .chain(self.after.keys())
                .any(|anchor| contains(&span, &self.tree.node(*anchor).span));
        if conflict {
            return Err(RefactronError::transformation(
                "edit",
                "overlapping edits on the same syntax node",
            ));
        }
        self.range_starts.insert(first, self.ranges.len());
        self.ranges.push(RangeEdit {
            first,
            last,
            text: text.into(),
        });
        Ok(())
    }

    pub fn remove(&mut self, node: NodeId) -> Result<()> {
        self.replace_range(node, node, "")
    }

    /// Insert `text` immediately before `node`.
    pub fn insert_before(&mut self, node: NodeId, text: impl Into<String>) -> Result<()> {
        self.check_anchor(node)?;
        self.before.entry(node).or_default().push(text.into());
        Ok(())
    }

    /// Insert `text` immediately after `node`.
    pub fn insert_after(&mut self, node: NodeId, text: impl Into<String>) -> Result<()> {
        self.check_anchor(node)?;
        self.after.entry(node).or_default().push(text.into());
        Ok(())
    }

    fn check_anchor(&self, node: NodeId) -> Result<()> {
        let anchor = &self.tree.node(node).span;
        if node == self.tree.root() {
            return Err(RefactronError::transformation(
                "edit",
                "cannot insert around the program node",
            ));
        }
        if self
            .ranges
            .iter()
            .any(|r| contains(&self.span(r.first, r.last), anchor))
        {
            return Err(RefactronError::transformation(
                "edit",
                "insertion point lies inside a replaced range",
            ));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty() && self.before.is_empty() && self.after.is_empty()
    }

    /// Regenerate the full source text.
    pub fn render(&self) -> String {
        let tree = self.tree;
        let source = tree.source();
        let root = tree.root();
        let span = &tree.node(root).span;
        let mut out = String::with_capacity(source.len() + 256);
        out.push_str(&source[..span.start]);
        self.render_node(root, &mut out);
        out.push_str(&source[span.end..]);
        out
    }

    fn render_node(&self, id: NodeId, out: &mut String) {
        let tree = self.tree;
        let source = tree.source();
        let node = tree.node(id);
        let children = tree.children(id);
        let mut cursor = node.span.start;
        let mut i = 0;
        while i < children.len() {
            let child = children[i];
            let child_span = &tree.node(child).span;
            out.push_str(&source[cursor..child_span.start]);
            if let Some(edit) = self.range_starts.get(&child).map(|idx| &self.ranges[*idx]) {
                out.push_str(&edit.text);
                cursor = tree.node(edit.last).span.end;
                i = children
                    .iter()
                    .position(|c| *c == edit.last)
                    .map(|p| p + 1)
                    .unwrap_or(children.len());
                continue;
            }
            if let Some(texts) = self.before.get(&child) {
                texts.iter().for_each(|t| out.push_str(t));
            }
            self.render_node(child, out);
            if let Some(texts) = self.after.get(&child) {
                texts.iter().for_each(|t| out.push_str(t));
            }
            cursor = child_span.end;
            i += 1;
        }
        out.push_str(&source[cursor..node.span.end]);
    }

    fn span(&self, first: NodeId, last: NodeId) -> std::ops::Range<usize> {
        self.tree.node(first).span.start..self.tree.node(last).span.end
    }
}

fn overlaps(a: &std::ops::Range<usize>, b: &std::ops::Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

fn contains(outer: &std::ops::Range<usize>, inner: &std::ops::Range<usize>) -> bool {
    outer.start <= inner.start && inner.end <= outer.end
}
