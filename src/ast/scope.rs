//! Scope and binding table.
//!
//! Recomputed on demand from an immutable [`SyntaxTree`]; never stored in the
//! tree itself. Declarations are collected in a first pass so that hoisted
//! names resolve, then every identifier reference is resolved through the
//! scope chain.
//!
//! Scope model:
//! - the program is the `global` scope, or `module` when it imports/exports
//! - functions and methods open a `local` scope named after the function
//! - classes open a `class` scope holding their members
//! - blocks, `for` headers and `catch` clauses open block scopes that report
//!   the same [`Scope`] as their owning function
//!
//! `var` declarations land in the nearest function scope; `let`, `const` and
//! `class` land in the nearest block.

use super::tree::{DeclarationKeyword, NodeId, NodeKind, SyntaxTree};
use crate::core::Scope;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Variable,
    Function,
    Class,
    Parameter,
    Import,
    CatchParam,
}

#[derive(Debug, Clone)]
pub struct ScopeData {
    pub parent: Option<ScopeId>,
    /// Node that opens the scope.
    pub node: NodeId,
    pub scope: Scope,
    pub is_block: bool,
    /// Nearest enclosing function or program scope (itself when not a block).
    pub owner: ScopeId,
    names: HashMap<String, BindingId>,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub kind: BindingKind,
    pub keyword: Option<DeclarationKeyword>,
    pub scope: ScopeId,
    /// The declaring identifier node.
    pub declaration: NodeId,
    pub references: Vec<NodeId>,
}

impl Binding {
    /// Bindings that may not be redeclared in the same scope. Only `var`
    /// and parameters tolerate a second declaration.
    pub fn is_lexical(&self) -> bool {
        matches!(
            self.keyword,
            Some(DeclarationKeyword::Let) | Some(DeclarationKeyword::Const)
        ) || matches!(
            self.kind,
            BindingKind::Function | BindingKind::Class | BindingKind::Import
        )
    }

    /// Declaration plus every resolved reference.
    pub fn occurrences(&self) -> Vec<NodeId> {
        let mut all = Vec::with_capacity(self.references.len() + 1);
        all.push(self.declaration);
        all.extend(self.references.iter().copied());
        all.sort();
        all
    }
}

/// Two declarations of one name in one scope.
#[derive(Debug, Clone)]
pub struct DuplicateDeclaration {
    pub name: String,
    pub scope: ScopeId,
    pub first: NodeId,
    pub second: NodeId,
}

/// A method or field name declared in a class body.
#[derive(Debug, Clone)]
pub struct ClassMember {
    pub class_scope: ScopeId,
    pub name: String,
    pub node: NodeId,
}

#[derive(Debug, Clone)]
pub struct ScopeTable {
    scopes: Vec<ScopeData>,
    bindings: Vec<Binding>,
    node_scopes: HashMap<NodeId, ScopeId>,
    resolved: HashMap<NodeId, BindingId>,
    declaration_sites: HashSet<NodeId>,
    unresolved: Vec<NodeId>,
    duplicates: Vec<DuplicateDeclaration>,
    members: Vec<ClassMember>,
}

impl ScopeTable {
    pub fn build(tree: &SyntaxTree) -> Self {
        let mut table = ScopeTable {
            scopes: Vec::new(),
            bindings: Vec::new(),
            node_scopes: HashMap::new(),
            resolved: HashMap::new(),
            declaration_sites: HashSet::new(),
            unresolved: Vec::new(),
            duplicates: Vec::new(),
            members: Vec::new(),
        };
        let mut ignored = HashSet::new();
        table.open_scopes(tree);
        table.collect_declarations(tree, &mut ignored);
        table.resolve_references(tree, &ignored);
        table
    }

    fn open_scopes(&mut self, tree: &SyntaxTree) {
        let root = tree.root();
        let is_module = tree.children(root).iter().any(|c| {
            matches!(
                tree.node(*c).ts_kind,
                "import_statement" | "export_statement"
            )
        });
        let program_scope = if is_module {
            Scope::module()
        } else {
            Scope::global()
        };
        self.push_scope(None, root, program_scope, false);

        for id in tree.node_ids().skip(1) {
            let node = tree.node(id);
            let parent_scope = self.enclosing_scope_of(tree, id);
            match &node.kind {
                NodeKind::Function { .. } | NodeKind::Method { .. } => {
                    let scope = Scope::local(tree.function_name(id));
                    self.push_scope(Some(parent_scope), id, scope, false);
                }
                NodeKind::Class { name } => {
                    let scope = Scope::class(name.clone().unwrap_or_else(|| "<anonymous>".into()));
                    self.push_scope(Some(parent_scope), id, scope, false);
                }
                NodeKind::Block
                    if tree
                        .parent(id)
                        .map(|p| !tree.node(p).is_function_like())
                        .unwrap_or(true) =>
                {
                    let scope = self.scopes[self.scopes[parent_scope.0].owner.0].scope.clone();
                    self.push_scope(Some(parent_scope), id, scope, true);
                }
                NodeKind::For | NodeKind::Switch => {
                    let scope = self.scopes[self.scopes[parent_scope.0].owner.0].scope.clone();
                    self.push_scope(Some(parent_scope), id, scope, true);
                }
                _ if node.ts_kind == "catch_clause" => {
                    let scope = self.scopes[self.scopes[parent_scope.0].owner.0].scope.clone();
                    self.push_scope(Some(parent_scope), id, scope, true);
                }
                _ => {}
            }
        }
    }

    fn push_scope(&mut self, parent: Option<ScopeId>, node: NodeId, scope: Scope, is_block: bool) {
        let id = ScopeId(self.scopes.len());
        let owner = match (is_block, parent) {
            (true, Some(p)) => self.scopes[p.0].owner,
            _ => id,
        };
        self.scopes.push(ScopeData {
            parent,
            node,
            scope,
            is_block,
            owner,
            names: HashMap::new(),
        });
        self.node_scopes.insert(node, id);
    }

    /// Innermost scope strictly enclosing `id` (never the scope `id` opens).
    fn enclosing_scope_of(&self, tree: &SyntaxTree, id: NodeId) -> ScopeId {
        tree.ancestors(id)
            .find_map(|a| self.node_scopes.get(&a).copied())
            .unwrap_or(ScopeId(0))
    }

    fn collect_declarations(&mut self, tree: &SyntaxTree, ignored: &mut HashSet<NodeId>) {
        for id in tree.node_ids() {
            let node = tree.node(id);
            match &node.kind {
                NodeKind::VariableDeclarator => {
                    let keyword = tree.parent(id).and_then(|p| match tree.kind(p) {
                        NodeKind::VariableDeclaration { keyword } => Some(*keyword),
                        _ => None,
                    });
                    let Some(name) = tree.child_by_field(id, "name") else {
                        continue;
                    };
                    let scope = self.declaration_scope(tree, id, keyword);
                    for ident in pattern_identifiers(tree, name) {
                        self.declare(tree, scope, ident, BindingKind::Variable, keyword);
                    }
                }
                NodeKind::Function { .. } => {
                    if let Some(name) = tree.child_by_field(id, "name") {
                        // Declarations bind in the enclosing scope, named
                        // expressions only inside themselves.
                        let scope = if node.ts_kind.ends_with("_declaration") {
                            self.enclosing_scope_of(tree, id)
                        } else {
                            self.node_scopes[&id]
                        };
                        self.declare(tree, scope, name, BindingKind::Function, None);
                    }
                    let scope = self.node_scopes[&id];
                    self.declare_parameters(tree, id, scope);
                }
                NodeKind::Method { .. } => {
                    let scope = self.node_scopes[&id];
                    self.declare_parameters(tree, id, scope);
                    if let Some(name) = tree.child_by_field(id, "name") {
                        ignored.insert(name);
                        self.add_member(tree, id, name);
                    }
                }
                NodeKind::Class { .. } => {
                    if let Some(name) = tree.child_by_field(id, "name") {
                        if matches!(tree.kind(name), NodeKind::Identifier { .. })
                            || matches!(tree.kind(name), NodeKind::TypeIdentifier { .. })
                        {
                            let scope = if node.ts_kind.ends_with("_declaration") {
                                self.enclosing_scope_of(tree, id)
                            } else {
                                self.node_scopes[&id]
                            };
                            self.declare(tree, scope, name, BindingKind::Class, None);
                        }
                    }
                }
                NodeKind::For if node.ts_kind == "for_in_statement" => {
                    let Some(left) = tree.child_by_field(id, "left") else {
                        continue;
                    };
                    let header = &tree.source()[node.span.start..tree.node(left).span.start];
                    let keyword = header
                        .split(|c: char| !c.is_alphanumeric())
                        .find_map(|word| match word {
                            "var" => Some(DeclarationKeyword::Var),
                            "let" => Some(DeclarationKeyword::Let),
                            "const" => Some(DeclarationKeyword::Const),
                            _ => None,
                        });
                    if let Some(keyword) = keyword {
                        let scope = if keyword == DeclarationKeyword::Var {
                            self.scopes[self.enclosing_scope_of(tree, id).0].owner
                        } else {
                            self.node_scopes[&id]
                        };
                        for ident in pattern_identifiers(tree, left) {
                            self.declare(tree, scope, ident, BindingKind::Variable, Some(keyword));
                        }
                    }
                }
                _ => match node.ts_kind {
                    "catch_clause" => {
                        if let Some(param) = tree.child_by_field(id, "parameter") {
                            let scope = self.node_scopes[&id];
                            for ident in pattern_identifiers(tree, param) {
                                self.declare(tree, scope, ident, BindingKind::CatchParam, None);
                            }
                        }
                    }
                    "import_specifier" => {
                        let name = tree.child_by_field(id, "name");
                        let alias = tree.child_by_field(id, "alias");
                        if let (Some(name), Some(_)) = (name, alias) {
                            ignored.insert(name);
                        }
                        if let Some(local) = alias.or(name) {
                            self.declare(tree, ScopeId(0), local, BindingKind::Import, None);
                        }
                    }
                    "export_specifier" => {
                        if let Some(alias) = tree.child_by_field(id, "alias") {
                            ignored.insert(alias);
                        }
                    }
                    "import_clause" | "namespace_import" => {
                        for child in tree.children(id) {
                            if matches!(tree.kind(*child), NodeKind::Identifier { .. }) {
                                self.declare(tree, ScopeId(0), *child, BindingKind::Import, None);
                            }
                        }
                    }
                    "public_field_definition" | "field_definition" => {
                        if let Some(name) = tree
                            .child_by_field(id, "name")
                            .or_else(|| tree.child_by_field(id, "property"))
                        {
                            self.add_member(tree, id, name);
                        }
                    }
                    _ => {}
                },
            }
        }
    }

    fn add_member(&mut self, tree: &SyntaxTree, member: NodeId, name: NodeId) {
        if let Some(class) = tree.enclosing_class(member) {
            if let Some(scope) = self.node_scopes.get(&class) {
                self.members.push(ClassMember {
                    class_scope: *scope,
                    name: tree.text(name).to_string(),
                    node: name,
                });
            }
        }
    }

    fn declaration_scope(
        &self,
        tree: &SyntaxTree,
        id: NodeId,
        keyword: Option<DeclarationKeyword>,
    ) -> ScopeId {
        let nearest = self.enclosing_scope_of(tree, id);
        if keyword == Some(DeclarationKeyword::Var) {
            self.scopes[nearest.0].owner
        } else {
            nearest
        }
    }

    fn declare_parameters(&mut self, tree: &SyntaxTree, func: NodeId, scope: ScopeId) {
        if let Some(params) = tree.child_by_field(func, "parameters") {
            for param in tree.children(params).to_vec() {
                for ident in pattern_identifiers(tree, param) {
                    self.declare(tree, scope, ident, BindingKind::Parameter, None);
                }
            }
        } else if let Some(param) = tree.child_by_field(func, "parameter") {
            for ident in pattern_identifiers(tree, param) {
                self.declare(tree, scope, ident, BindingKind::Parameter, None);
            }
        }
    }

    fn declare(
        &mut self,
        tree: &SyntaxTree,
        scope: ScopeId,
        ident: NodeId,
        kind: BindingKind,
        keyword: Option<DeclarationKeyword>,
    ) {
        let name = tree.text(ident).to_string();
        self.declaration_sites.insert(ident);
        let id = BindingId(self.bindings.len());
        let binding = Binding {
            name: name.clone(),
            kind,
            keyword,
            scope,
            declaration: ident,
            references: Vec::new(),
        };

        if let Some(existing) = self.scopes[scope.0].names.get(&name).copied() {
            let previous = &self.bindings[existing.0];
            if previous.is_lexical() || binding.is_lexical() {
                self.duplicates.push(DuplicateDeclaration {
                    name,
                    scope,
                    first: previous.declaration,
                    second: ident,
                });
            }
            // Redeclarations share the first binding.
            self.resolved.insert(ident, existing);
            self.bindings[existing.0].references.push(ident);
            return;
        }

        self.bindings.push(binding);
        self.scopes[scope.0].names.insert(name, id);
        self.resolved.insert(ident, id);
    }

    fn resolve_references(&mut self, tree: &SyntaxTree, ignored: &HashSet<NodeId>) {
        for id in tree.node_ids() {
            if self.declaration_sites.contains(&id) || ignored.contains(&id) {
                continue;
            }
            let name = match tree.kind(id) {
                NodeKind::Identifier { name }
                | NodeKind::ShorthandProperty { name }
                | NodeKind::ShorthandPattern { name } => name,
                _ => continue,
            };
            let scope = self.enclosing_scope_of(tree, id);
            match self.lookup(scope, name) {
                Some(binding) => {
                    self.bindings[binding.0].references.push(id);
                    self.resolved.insert(id, binding);
                }
                None => self.unresolved.push(id),
            }
        }
    }

    /// The program scope.
    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn scope(&self, id: ScopeId) -> &ScopeData {
        &self.scopes[id.0]
    }

    pub fn binding(&self, id: BindingId) -> &Binding {
        &self.bindings[id.0]
    }

    pub fn bindings(&self) -> impl Iterator<Item = (BindingId, &Binding)> {
        self.bindings.iter().enumerate().map(|(i, b)| (BindingId(i), b))
    }

    pub fn scope_ids(&self) -> impl Iterator<Item = ScopeId> {
        (0..self.scopes.len()).map(ScopeId)
    }

    /// Scope opened by `node`, if any.
    pub fn scope_of_node(&self, node: NodeId) -> Option<ScopeId> {
        self.node_scopes.get(&node).copied()
    }

    /// Innermost scope in which `node` is evaluated.
    pub fn scope_at(&self, tree: &SyntaxTree, node: NodeId) -> ScopeId {
        self.enclosing_scope_of(tree, node)
    }

    /// Resolve `name` from `scope` outwards.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<BindingId> {
        let mut current = Some(scope);
        while let Some(s) = current {
            let data = &self.scopes[s.0];
            if let Some(binding) = data.names.get(name) {
                return Some(*binding);
            }
            current = data.parent;
        }
        None
    }

    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<BindingId> {
        self.scopes[scope.0].names.get(name).copied()
    }

    /// Binding an identifier node resolves to.
    pub fn resolve(&self, node: NodeId) -> Option<BindingId> {
        self.resolved.get(&node).copied()
    }

    pub fn is_declaration(&self, node: NodeId) -> bool {
        self.declaration_sites.contains(&node)
    }

    pub fn unresolved(&self) -> &[NodeId] {
        &self.unresolved
    }

    pub fn duplicates(&self) -> &[DuplicateDeclaration] {
        &self.duplicates
    }

    pub fn members(&self) -> &[ClassMember] {
        &self.members
    }

    /// Scopes reporting the given [`Scope`], outermost first.
    pub fn find_scopes(&self, target: &Scope) -> Vec<ScopeId> {
        self.scope_ids()
            .filter(|id| &self.scopes[id.0].scope == target)
            .collect()
    }

    /// Whether `inner` is `outer` or nested inside it.
    pub fn is_within(&self, inner: ScopeId, outer: ScopeId) -> bool {
        let mut current = Some(inner);
        while let Some(s) = current {
            if s == outer {
                return true;
            }
            current = self.scopes[s.0].parent;
        }
        false
    }

    /// Every name declared anywhere in the file.
    pub fn all_names(&self) -> HashSet<&str> {
        self.bindings.iter().map(|b| b.name.as_str()).collect()
    }

    /// Names visible from `scope`, walking outwards.
    pub fn visible_names(&self, scope: ScopeId) -> HashSet<&str> {
        let mut names = HashSet::new();
        let mut current = Some(scope);
        while let Some(s) = current {
            names.extend(self.scopes[s.0].names.keys().map(String::as_str));
            current = self.scopes[s.0].parent;
        }
        names
    }

    /// Names declared in `scope` or any scope nested inside it.
    pub fn names_within(&self, scope: ScopeId) -> HashSet<&str> {
        self.bindings
            .iter()
            .filter(|b| self.is_within(b.scope, scope))
            .map(|b| b.name.as_str())
            .collect()
    }
}

/// Identifiers bound by a declaration pattern. Default values and computed
/// keys are references, not bindings, and are skipped.
pub fn pattern_identifiers(tree: &SyntaxTree, pattern: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    collect_pattern(tree, pattern, &mut out);
    out
}

fn collect_pattern(tree: &SyntaxTree, id: NodeId, out: &mut Vec<NodeId>) {
    let node = tree.node(id);
    match &node.kind {
        NodeKind::Identifier { .. } | NodeKind::ShorthandPattern { .. } => out.push(id),
        _ => match node.ts_kind {
            "assignment_pattern" | "object_assignment_pattern" => {
                if let Some(left) = tree.child_by_field(id, "left") {
                    collect_pattern(tree, left, out);
                }
            }
            "pair_pattern" => {
                if let Some(value) = tree.child_by_field(id, "value") {
                    collect_pattern(tree, value, out);
                }
            }
            "required_parameter" | "optional_parameter" => {
                if let Some(pattern) = tree.child_by_field(id, "pattern") {
                    collect_pattern(tree, pattern, out);
                }
            }
            "object_pattern" | "array_pattern" | "rest_pattern" => {
                for child in tree.children(id) {
                    collect_pattern(tree, *child, out);
                }
            }
            _ => {}
        },
    }
}
