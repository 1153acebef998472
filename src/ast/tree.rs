//! Arena-backed syntax tree.
//!
//! Tree-sitter's concrete syntax tree is converted once into a flat arena of
//! [`SyntaxNode`]s addressed by [`NodeId`]. Each node carries a tagged
//! [`NodeKind`], its byte span and positions, an optional grammar field name,
//! and index-based parent/child links. Only named nodes are stored; anonymous
//! tokens (keywords, punctuation) survive as the source text between children,
//! which is what makes regeneration from the tree lossless.
//!
//! Node ids are assigned in pre-order, so iterating `0..len` visits the tree
//! in document order.

use crate::core::{Language, Location, Position};
use std::ops::Range;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        NodeId(index as u32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKeyword {
    Var,
    Let,
    Const,
}

impl DeclarationKeyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Var => "var",
            Self::Let => "let",
            Self::Const => "const",
        }
    }
}

/// One variant per node kind the engine reasons about; everything else is `Other`.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Program,
    Function {
        name: Option<String>,
        is_arrow: bool,
        is_async: bool,
    },
    Method {
        name: String,
        is_async: bool,
    },
    Class {
        name: Option<String>,
    },
    Interface {
        name: String,
    },
    ClassBody,
    Block,
    VariableDeclaration {
        keyword: DeclarationKeyword,
    },
    VariableDeclarator,
    If,
    Else,
    For,
    While,
    Switch,
    SwitchCase,
    Return,
    Throw,
    Break,
    Continue,
    ExpressionStatement,
    Binary {
        operator: String,
    },
    Unary {
        operator: String,
    },
    Parenthesized,
    Call,
    New,
    Member,
    Await,
    Yield,
    Identifier {
        name: String,
    },
    /// `{ x }` in an object literal.
    ShorthandProperty {
        name: String,
    },
    /// `{ x }` in a destructuring pattern.
    ShorthandPattern {
        name: String,
    },
    PropertyName {
        name: String,
    },
    TypeIdentifier {
        name: String,
    },
    This,
    Comment,
    Error,
    Other,
}

#[derive(Debug, Clone)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    /// Raw tree-sitter kind, e.g. `"lexical_declaration"`.
    pub ts_kind: &'static str,
    /// Grammar field this node occupies in its parent, e.g. `"condition"`.
    pub field: Option<&'static str>,
    pub span: Range<usize>,
    pub start: Position,
    pub end: Position,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl SyntaxNode {
    /// Name carried by identifier-like nodes.
    pub fn identifier_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Identifier { name }
            | NodeKind::ShorthandProperty { name }
            | NodeKind::ShorthandPattern { name }
            | NodeKind::PropertyName { name }
            | NodeKind::TypeIdentifier { name } => Some(name),
            _ => None,
        }
    }

    pub fn is_function_like(&self) -> bool {
        matches!(self.kind, NodeKind::Function { .. } | NodeKind::Method { .. })
    }

    pub fn is_statement(&self) -> bool {
        !matches!(self.kind, NodeKind::Comment)
            && (self.ts_kind.ends_with("_statement") || self.ts_kind.ends_with("_declaration"))
    }

    /// Nodes whose children form a statement list.
    pub fn is_statement_list(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Program | NodeKind::Block | NodeKind::SwitchCase
        )
    }
}

/// An immutable parsed file.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    source: String,
    file: PathBuf,
    language: Language,
    nodes: Vec<SyntaxNode>,
}

impl SyntaxTree {
    pub(crate) fn from_parts(
        source: String,
        file: PathBuf,
        language: Language,
        nodes: Vec<SyntaxNode>,
    ) -> Self {
        Self {
            source,
            file,
            language,
            nodes,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn text(&self, id: NodeId) -> &str {
        &self.source[self.nodes[id.index()].span.clone()]
    }

    pub fn location(&self, id: NodeId) -> Location {
        let node = self.node(id);
        Location::new(self.file.clone(), node.start, node.end)
    }

    /// Location covering the sibling range `first..=last`.
    pub fn range_location(&self, first: NodeId, last: NodeId) -> Location {
        Location::new(self.file.clone(), self.node(first).start, self.node(last).end)
    }

    /// All node ids in document order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId::from_index)
    }

    /// Strict ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.parent(id),
        }
    }

    /// Strict descendants in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Strict descendants, not entering nested functions or classes.
    pub fn descendants_in_body(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            let node = self.node(next);
            if node.is_function_like() || matches!(node.kind, NodeKind::Class { .. }) {
                continue;
            }
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    pub fn child_by_field(&self, id: NodeId, field: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|c| self.node(*c).field == Some(field))
    }

    /// Statement children of a statement list (comments excluded).
    /// Statement children of `id`. Inside a statement list a bare `{ ... }`
    /// block counts as a statement too.
    pub fn statements(&self, id: NodeId) -> Vec<NodeId> {
        let list = self.node(id).is_statement_list();
        self.children(id)
            .iter()
            .copied()
            .filter(|c| {
                let node = self.node(*c);
                node.is_statement() || (list && matches!(node.kind, NodeKind::Block))
            })
            .collect()
    }

    pub fn enclosing_function(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id).find(|a| self.node(*a).is_function_like())
    }

    pub fn enclosing_class(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id)
            .find(|a| matches!(self.kind(*a), NodeKind::Class { .. }))
    }

    /// The child of the program that contains `id` (or `id` itself).
    pub fn top_level_statement(&self, id: NodeId) -> Option<NodeId> {
        let root = self.root();
        if id == root {
            return None;
        }
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            if parent == root {
                return Some(current);
            }
            current = parent;
        }
        None
    }

    /// Body block of a function-like node.
    pub fn function_body(&self, id: NodeId) -> Option<NodeId> {
        self.child_by_field(id, "body")
    }

    /// Display name of a function-like node.
    pub fn function_name(&self, id: NodeId) -> String {
        match self.kind(id) {
            NodeKind::Function { name: Some(name), .. } => name.clone(),
            NodeKind::Method { name, .. } => name.clone(),
            _ => "<anonymous>".to_string(),
        }
    }

    /// All nodes matching a predicate, in document order.
    pub fn find_all(&self, pred: impl Fn(&SyntaxNode) -> bool) -> Vec<NodeId> {
        self.node_ids().filter(|id| pred(self.node(*id))).collect()
    }

    /// Smallest node of the given kind that starts on `location`'s first line
    /// and ends on its last line, preferring an exact column match.
    pub fn find_at(
        &self,
        location: &Location,
        pred: impl Fn(&SyntaxNode) -> bool,
    ) -> Option<NodeId> {
        let candidates: Vec<NodeId> = self
            .node_ids()
            .filter(|id| {
                let node = self.node(*id);
                pred(node)
                    && node.start.line == location.start.line
                    && node.end.line == location.end.line
            })
            .collect();
        candidates
            .iter()
            .copied()
            .find(|id| self.node(*id).start.column == location.start.column)
            .or_else(|| candidates.first().copied())
    }
}

pub struct Ancestors<'a> {
    tree: &'a SyntaxTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_source;

    #[test]
    fn test_preorder_ids_and_parent_links() {
        let tree = parse_source("function f(a) { return a + 1; }", Path::new("t.js")).unwrap();
        assert!(matches!(tree.kind(tree.root()), NodeKind::Program));
        for id in tree.node_ids().skip(1) {
            let parent = tree.parent(id).unwrap();
            assert!(parent < id);
            assert!(tree.children(parent).contains(&id));
        }
    }

    #[test]
    fn test_function_name_and_body() {
        let tree = parse_source("const add = (a, b) => { return a + b; };", Path::new("t.js")).unwrap();
        let func = tree.find_all(|n| n.is_function_like())[0];
        assert_eq!(tree.function_name(func), "add");
        let body = tree.function_body(func).unwrap();
        assert_eq!(tree.statements(body).len(), 1);
    }

    #[test]
    fn test_bare_block_is_a_statement() {
        let tree = parse_source("function f() {\n  a();\n  { b(); }\n}\n", Path::new("t.js")).unwrap();
        let func = tree.find_all(|n| n.is_function_like())[0];
        assert!(tree.statements(func).is_empty());
        let body = tree.function_body(func).unwrap();
        let statements = tree.statements(body);
        assert_eq!(statements.len(), 2);
        assert!(matches!(tree.kind(statements[1]), NodeKind::Block));
    }

    #[test]
    fn test_top_level_statement() {
        let tree = parse_source("let a = 1;\nfunction g() { a++; }", Path::new("t.js")).unwrap();
        let update = tree.find_all(|n| n.ts_kind == "update_expression")[0];
        let top = tree.top_level_statement(update).unwrap();
        assert_eq!(tree.node(top).ts_kind, "function_declaration");
    }

    #[test]
    fn test_binary_operator_captured() {
        let tree = parse_source("if (a >= b) { x(); }", Path::new("t.js")).unwrap();
        let bin = tree.find_all(|n| matches!(n.kind, NodeKind::Binary { .. }))[0];
        assert_eq!(
            tree.kind(bin),
            &NodeKind::Binary {
                operator: ">=".to_string()
            }
        );
    }
}
