//! Data-flow facts about a run of statements, shared by the extracting
//! transformers.

use crate::ast::{BindingId, BindingKind, DeclarationKeyword, NodeId, NodeKind, ScopeTable, SyntaxTree};
use crate::core::Location;
use crate::errors::{RefactronError, Result};
use std::collections::HashSet;
use std::ops::Range;

/// Contiguous sibling statements of one statement list. Never empty.
#[derive(Debug, Clone)]
pub(crate) struct StatementRange {
    pub list: NodeId,
    pub statements: Vec<NodeId>,
}

impl StatementRange {
    pub fn first(&self) -> NodeId {
        self.statements[0]
    }

    pub fn last(&self) -> NodeId {
        self.statements[self.statements.len() - 1]
    }

    pub fn span(&self, tree: &SyntaxTree) -> Range<usize> {
        tree.node(self.first()).span.start..tree.node(self.last()).span.end
    }

    pub fn contains(&self, tree: &SyntaxTree, node: NodeId) -> bool {
        let span = self.span(tree);
        let inner = &tree.node(node).span;
        span.start <= inner.start && inner.end <= span.end
    }

    pub fn text<'t>(&self, tree: &'t SyntaxTree) -> &'t str {
        &tree.source()[self.span(tree)]
    }

    pub fn location(&self, tree: &SyntaxTree) -> Location {
        tree.range_location(self.first(), self.last())
    }

    /// Every node of the range in document order.
    pub fn nodes(&self, tree: &SyntaxTree) -> Vec<NodeId> {
        let mut out = Vec::new();
        for statement in &self.statements {
            out.push(*statement);
            out.extend(tree.descendants(*statement));
        }
        out
    }

    /// Comments inside the range, including those sitting between its
    /// statements as siblings in the list.
    pub fn comments(&self, tree: &SyntaxTree) -> Vec<NodeId> {
        let span = self.span(tree);
        let mut out = Vec::new();
        for child in tree.children(self.list).iter().copied() {
            let inner = &tree.node(child).span;
            if inner.start < span.start || inner.end > span.end {
                continue;
            }
            out.extend(
                std::iter::once(child)
                    .chain(tree.descendants(child))
                    .filter(|id| matches!(tree.kind(*id), NodeKind::Comment)),
            );
        }
        out
    }
}

/// The outermost statement run that starts on `location`'s first line and
/// ends on its last line.
pub(crate) fn locate_range(tree: &SyntaxTree, location: &Location, refactoring: &str) -> Result<StatementRange> {
    for list in tree.find_all(|n| n.is_statement_list()) {
        let statements: Vec<NodeId> = tree
            .statements(list)
            .into_iter()
            .filter(|s| {
                let node = tree.node(*s);
                node.start.line >= location.start.line && node.end.line <= location.end.line
            })
            .collect();
        let (Some(first), Some(last)) = (statements.first(), statements.last()) else {
            continue;
        };
        if tree.node(*first).start.line == location.start.line
            && tree.node(*last).end.line == location.end.line
        {
            return Ok(StatementRange { list, statements });
        }
    }
    Err(RefactronError::target_not_found(
        refactoring,
        format!("no statements span lines {}-{}", location.start.line, location.end.line),
    ))
}

/// How the range's final statement leaves the function.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FinalReturn {
    None,
    Bare,
    Identifier { name: String, declared_inside: bool },
    Expression,
}

/// A value computed inside the range and needed after it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LiveOut {
    pub name: String,
    /// Declaration keyword when the range declares the value itself.
    pub keyword: Option<DeclarationKeyword>,
}

#[derive(Debug, Clone)]
pub(crate) struct BlockAnalysis {
    /// Names of the outer bindings read or written inside the range, first
    /// use first.
    pub param_names: Vec<String>,
    /// Identifier occurrences inside the range that refer to `param_names[i]`.
    pub param_uses: Vec<(NodeId, usize)>,
    /// Identifier occurrences of bindings declared inside the range, indexed
    /// by first appearance.
    pub local_uses: Vec<(NodeId, usize)>,
    pub live_out: Option<LiveOut>,
    pub final_return: FinalReturn,
    pub is_async: bool,
    pub uses_this: bool,
}

pub(crate) fn analyze_range(
    tree: &SyntaxTree,
    scopes: &ScopeTable,
    range: &StatementRange,
    refactoring: &str,
) -> Result<BlockAnalysis> {
    let fail = |message: &str| Err(RefactronError::transformation(refactoring, message));
    let inside = |n: NodeId| range.contains(tree, n);

    let mut is_async = false;
    for statement in &range.statements {
        for id in std::iter::once(*statement).chain(tree.descendants_in_body(*statement)) {
            match tree.kind(id) {
                NodeKind::Return if id != range.last() => {
                    return fail("block contains a return that is not its final statement");
                }
                NodeKind::Yield => return fail("block contains a yield"),
                NodeKind::Await => is_async = true,
                NodeKind::Break | NodeKind::Continue => {
                    if !tree.children(id).is_empty() {
                        return fail("block contains a labelled jump");
                    }
                    let breaks = matches!(tree.kind(id), NodeKind::Break);
                    let target = tree
                        .ancestors(id)
                        .take_while(|a| !tree.node(*a).is_function_like())
                        .find(|a| match tree.kind(*a) {
                            NodeKind::For | NodeKind::While => true,
                            NodeKind::Switch => breaks,
                            _ => false,
                        });
                    if !target.map(inside).unwrap_or(false) {
                        return fail("block contains a break or continue that leaves it");
                    }
                }
                NodeKind::Identifier { name } if name == "arguments" && scopes.resolve(id).is_none() => {
                    return fail("block reads the enclosing function's arguments object");
                }
                _ => {}
            }
        }
    }

    let uses_this = range.nodes(tree).into_iter().any(|id| {
        let this_like = matches!(tree.kind(id), NodeKind::This) || tree.node(id).ts_kind == "super";
        this_like && {
            let receiver = tree.ancestors(id).find(|a| match tree.kind(*a) {
                NodeKind::Function { is_arrow, .. } => !is_arrow,
                NodeKind::Method { .. } => true,
                _ => false,
            });
            !receiver.map(inside).unwrap_or(false)
        }
    });

    let mut params: Vec<BindingId> = Vec::new();
    let mut param_uses = Vec::new();
    let mut locals: Vec<BindingId> = Vec::new();
    let mut local_uses = Vec::new();
    for id in range.nodes(tree) {
        if !matches!(
            tree.kind(id),
            NodeKind::Identifier { .. } | NodeKind::ShorthandProperty { .. } | NodeKind::ShorthandPattern { .. }
        ) {
            continue;
        }
        let Some(binding_id) = scopes.resolve(id) else {
            continue;
        };
        let binding = scopes.binding(binding_id);
        if inside(binding.declaration) {
            let index = position_or_push(&mut locals, binding_id);
            local_uses.push((id, index));
        } else if binding.scope != scopes.root() {
            let index = position_or_push(&mut params, binding_id);
            param_uses.push((id, index));
        }
    }

    let mut live_outs = Vec::new();
    for binding_id in &locals {
        let binding = scopes.binding(*binding_id);
        if binding.references.iter().any(|r| !inside(*r)) {
            if binding.kind != BindingKind::Variable {
                return fail("block declares a function or class that is used after it");
            }
            live_outs.push(LiveOut {
                name: binding.name.clone(),
                keyword: Some(binding.keyword.unwrap_or(DeclarationKeyword::Let)),
            });
        }
    }
    for binding_id in &params {
        let binding = scopes.binding(*binding_id);
        let written = binding.references.iter().any(|r| inside(*r) && is_write(tree, *r));
        let read_elsewhere = binding.references.iter().any(|r| !inside(*r));
        if written && read_elsewhere {
            live_outs.push(LiveOut {
                name: binding.name.clone(),
                keyword: None,
            });
        }
    }
    if live_outs.len() > 1 {
        return fail("block produces more than one value used after it");
    }
    let live_out = live_outs.pop();

    let final_return = final_return(tree, scopes, range);
    if live_out.is_some() && final_return != FinalReturn::None {
        return fail("block both returns and produces a value used after it");
    }

    let param_names = params.iter().map(|b| scopes.binding(*b).name.clone()).collect();
    Ok(BlockAnalysis {
        param_names,
        param_uses,
        local_uses,
        live_out,
        final_return,
        is_async,
        uses_this,
    })
}

fn position_or_push(items: &mut Vec<BindingId>, item: BindingId) -> usize {
    match items.iter().position(|b| *b == item) {
        Some(index) => index,
        None => {
            items.push(item);
            items.len() - 1
        }
    }
}

fn final_return(tree: &SyntaxTree, scopes: &ScopeTable, range: &StatementRange) -> FinalReturn {
    let last = range.last();
    if !matches!(tree.kind(last), NodeKind::Return) {
        return FinalReturn::None;
    }
    let value = tree
        .children(last)
        .iter()
        .copied()
        .find(|c| !matches!(tree.kind(*c), NodeKind::Comment));
    match value {
        None => FinalReturn::Bare,
        Some(value) => match tree.kind(value) {
            NodeKind::Identifier { name } => FinalReturn::Identifier {
                name: name.clone(),
                declared_inside: scopes
                    .resolve(value)
                    .map(|b| range.contains(tree, scopes.binding(b).declaration))
                    .unwrap_or(false),
            },
            _ => FinalReturn::Expression,
        },
    }
}

/// Whether an identifier occurrence is assigned to.
pub(crate) fn is_write(tree: &SyntaxTree, ident: NodeId) -> bool {
    let mut current = ident;
    while let Some(parent) = tree.parent(current) {
        let node = tree.node(parent);
        match node.ts_kind {
            "object_pattern" | "array_pattern" | "pair_pattern" | "rest_pattern" => current = parent,
            "assignment_pattern" | "object_assignment_pattern"
                if tree.node(current).field == Some("left") =>
            {
                current = parent
            }
            "assignment_expression" | "augmented_assignment_expression" => {
                return tree.node(current).field == Some("left");
            }
            "update_expression" => return true,
            "for_in_statement" => return tree.node(current).field == Some("left"),
            _ => return false,
        }
    }
    false
}

/// Statement text that replaces the range with a call to `callee`.
pub(crate) fn call_site(analysis: &BlockAnalysis, callee: &str, args: &[String], indent: &str) -> String {
    let call = format!(
        "{}{}({})",
        if analysis.is_async { "await " } else { "" },
        callee,
        args.join(", ")
    );
    match (&analysis.live_out, &analysis.final_return) {
        (Some(LiveOut { name, keyword: Some(keyword) }), _) => {
            format!("{} {} = {};", keyword.as_str(), name, call)
        }
        (Some(LiveOut { name, keyword: None }), _) => format!("{} = {};", name, call),
        (None, FinalReturn::Identifier { name, declared_inside: true }) => {
            format!("const {} = {};\n{}return {};", name, call, indent, name)
        }
        (None, FinalReturn::None) => format!("{};", call),
        (None, _) => format!("return {};", call),
    }
}

/// Where and how the new function is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    TopLevel,
    Method { is_static: bool },
}

/// Source of the extracted function. `body` is the range text already
/// indented one level deeper than `indent`.
pub(crate) fn function_text(
    name: &str,
    params: &[String],
    body: &str,
    analysis: &BlockAnalysis,
    placement: Placement,
    indent: &str,
    unit: &str,
) -> String {
    let async_prefix = if analysis.is_async { "async " } else { "" };
    let header = match placement {
        Placement::TopLevel => format!("{}function {}({}) {{", async_prefix, name, params.join(", ")),
        Placement::Method { is_static } => format!(
            "{}{}{}({}) {{",
            if is_static { "static " } else { "" },
            async_prefix,
            name,
            params.join(", ")
        ),
    };
    let mut text = format!("{}{}\n{}", indent, header, body);
    if let Some(live_out) = &analysis.live_out {
        text.push_str(&format!("\n{}{}return {};", indent, unit, live_out.name));
    }
    text.push_str(&format!("\n{}}}", indent));
    text
}

/// `base`, or `base` with the smallest numeric suffix not in `taken`.
pub(crate) fn unique_name(base: &str, taken: &HashSet<&str>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}{}", base, n))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}
