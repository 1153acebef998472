use super::{Change, Transformer};
use crate::ast::text::{is_builtin, is_reserved, is_valid_identifier};
use crate::ast::{parse_source, BindingId, BindingKind, NodeId, NodeKind, ScopeTable, SyntaxTree, TreeEditor};
use crate::core::{IdentifierKind, Location, Scope, ScopeKind};
use crate::errors::{RefactronError, Result};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct RenameRequest {
    pub old_name: String,
    pub new_name: String,
    /// Scope the identifier is bound in.
    pub scope: Scope,
    /// Any occurrence of the identifier, to pick one of several shadowed
    /// bindings with the same name.
    pub location: Option<Location>,
}

/// Scope-aware rename of one binding and every reference to it.
///
/// Class members have no binding; they are renamed at their declaration and
/// at every `this.<name>` access inside the class.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenameTransformer;

pub(crate) fn identifier_kind(kind: BindingKind) -> IdentifierKind {
    match kind {
        BindingKind::Function => IdentifierKind::Function,
        BindingKind::Class => IdentifierKind::Class,
        BindingKind::Parameter => IdentifierKind::Parameter,
        BindingKind::Variable | BindingKind::Import | BindingKind::CatchParam => IdentifierKind::Variable,
    }
}

impl RenameTransformer {
    fn check_new_name(&self, name: &str) -> Result<()> {
        let problem = if !is_valid_identifier(name) {
            Some("is not a valid identifier")
        } else if is_reserved(name) {
            Some("is a reserved word")
        } else if is_builtin(name) {
            Some("would shadow a built-in global")
        } else {
            None
        };
        match problem {
            Some(problem) => Err(RefactronError::reserved_name(
                name,
                format!("'{}' {}", name, problem),
            )),
            None => Ok(()),
        }
    }

    fn find_binding(&self, tree: &SyntaxTree, scopes: &ScopeTable, request: &RenameRequest) -> Option<BindingId> {
        let scope_ids = scopes.find_scopes(&request.scope);
        let candidates: Vec<BindingId> = scopes
            .bindings()
            .filter(|(_, b)| b.name == request.old_name && scope_ids.contains(&b.scope))
            .map(|(id, _)| id)
            .collect();

        if let Some(location) = &request.location {
            let on_line = |id: &BindingId, exact: bool| {
                scopes.binding(*id).occurrences().iter().any(|o| {
                    let start = tree.node(*o).start;
                    start.line == location.start.line && (!exact || start.column == location.start.column)
                })
            };
            let hit = candidates
                .iter()
                .find(|id| on_line(id, true))
                .or_else(|| candidates.iter().find(|id| on_line(id, false)));
            if let Some(hit) = hit {
                return Some(*hit);
            }
        }
        candidates
            .iter()
            .copied()
            .find(|id| !scopes.scope(scopes.binding(*id).scope).is_block)
            .or_else(|| candidates.first().copied())
    }

    fn check_conflicts(&self, tree: &SyntaxTree, scopes: &ScopeTable, target: BindingId, new_name: &str) -> Result<()> {
        let binding = scopes.binding(target);
        let scope = scopes.scope(binding.scope).scope.to_string();
        if scopes.lookup_local(binding.scope, new_name).is_some() {
            return Err(RefactronError::naming_conflict(new_name, scope));
        }

        // A nearer binding of the new name would capture renamed references.
        for occurrence in &binding.references {
            let at = scopes.scope_at(tree, *occurrence);
            if let Some(other) = scopes.lookup(at, new_name) {
                if scopes.is_within(scopes.binding(other).scope, binding.scope) {
                    return Err(RefactronError::naming_conflict(new_name, scope));
                }
            }
        }

        // Existing uses of the new name inside the scope would be captured.
        for id in tree.node_ids() {
            let named = matches!(
                tree.kind(id),
                NodeKind::Identifier { name } | NodeKind::ShorthandProperty { name } | NodeKind::ShorthandPattern { name }
                    if name == new_name
            );
            if !named || scopes.is_declaration(id) {
                continue;
            }
            if !scopes.is_within(scopes.scope_at(tree, id), binding.scope) {
                continue;
            }
            let captured = match scopes.resolve(id) {
                None => true,
                Some(other) => !scopes.is_within(scopes.binding(other).scope, binding.scope),
            };
            if captured {
                return Err(RefactronError::naming_conflict(new_name, scope));
            }
        }
        Ok(())
    }

    fn rename_binding(
        &self,
        tree: &SyntaxTree,
        scopes: &ScopeTable,
        target: BindingId,
        request: &RenameRequest,
    ) -> Result<(String, Vec<Change>)> {
        self.check_conflicts(tree, scopes, target, &request.new_name)?;
        let binding = scopes.binding(target);
        let (old, new) = (request.old_name.as_str(), request.new_name.as_str());

        let mut editor = TreeEditor::new(tree);
        let mut changes = Vec::new();
        for occurrence in binding.occurrences() {
            let replacement = occurrence_text(tree, occurrence, old, new);
            editor.replace(occurrence, replacement.clone())?;
            changes.push(Change::modify(tree.location(occurrence), tree.text(occurrence), replacement));
        }
        log::debug!(
            "Renamed {} '{}' to '{}' at {} site(s)",
            identifier_kind(binding.kind),
            old,
            new,
            changes.len()
        );
        Ok((editor.render(), changes))
    }

    fn rename_member(&self, tree: &SyntaxTree, scopes: &ScopeTable, request: &RenameRequest) -> Result<(String, Vec<Change>)> {
        let not_found = || {
            RefactronError::target_not_found(
                self.name(),
                format!("no binding '{}' in {}", request.old_name, request.scope),
            )
        };
        let class_scope = scopes
            .find_scopes(&request.scope)
            .into_iter()
            .find(|s| matches!(tree.kind(scopes.scope(*s).node), NodeKind::Class { .. }))
            .ok_or_else(not_found)?;
        let class = scopes.scope(class_scope).node;
        let members: Vec<NodeId> = scopes
            .members()
            .iter()
            .filter(|m| m.class_scope == class_scope && m.name == request.old_name)
            .map(|m| m.node)
            .collect();
        if members.is_empty() {
            return Err(not_found());
        }
        if scopes
            .members()
            .iter()
            .any(|m| m.class_scope == class_scope && m.name == request.new_name)
        {
            return Err(RefactronError::naming_conflict(
                &request.new_name,
                request.scope.to_string(),
            ));
        }

        let mut sites = members;
        for id in tree.descendants(class) {
            if !matches!(tree.kind(id), NodeKind::Member) {
                continue;
            }
            let (Some(object), Some(property)) = (
                tree.child_by_field(id, "object"),
                tree.child_by_field(id, "property"),
            ) else {
                continue;
            };
            if matches!(tree.kind(object), NodeKind::This)
                && tree.text(property) == request.old_name
                && receiver_class(tree, id) == Some(class)
            {
                sites.push(property);
            }
        }
        sites.sort();

        let mut editor = TreeEditor::new(tree);
        let mut changes = Vec::with_capacity(sites.len());
        for site in sites {
            editor.replace(site, request.new_name.clone())?;
            changes.push(Change::modify(tree.location(site), tree.text(site), request.new_name.clone()));
        }
        log::debug!(
            "Renamed member '{}' of {} to '{}' at {} site(s)",
            request.old_name,
            request.scope,
            request.new_name,
            changes.len()
        );
        Ok((editor.render(), changes))
    }
}

/// Class whose instance `this` denotes at `id`.
fn receiver_class(tree: &SyntaxTree, id: NodeId) -> Option<NodeId> {
    let receiver = tree.ancestors(id).find(|a| match tree.kind(*a) {
        NodeKind::Function { is_arrow, .. } => !is_arrow,
        NodeKind::Method { .. } | NodeKind::Class { .. } => true,
        _ => false,
    })?;
    match tree.kind(receiver) {
        NodeKind::Class { .. } => Some(receiver),
        NodeKind::Method { .. } => tree.enclosing_class(receiver),
        _ => None,
    }
}

/// Replacement for one occurrence; shorthand and un-aliased module
/// specifiers keep their external name.
fn occurrence_text(tree: &SyntaxTree, id: NodeId, old: &str, new: &str) -> String {
    let node = tree.node(id);
    match &node.kind {
        NodeKind::ShorthandProperty { .. } | NodeKind::ShorthandPattern { .. } => format!("{}: {}", old, new),
        NodeKind::Identifier { .. } if node.field == Some("name") => {
            let specifier = tree
                .parent(id)
                .filter(|p| tree.child_by_field(*p, "alias").is_none())
                .map(|p| tree.node(p).ts_kind);
            match specifier {
                Some("export_specifier") => format!("{} as {}", new, old),
                Some("import_specifier") => format!("{} as {}", old, new),
                _ => new.to_string(),
            }
        }
        _ => new.to_string(),
    }
}

impl Transformer for RenameTransformer {
    type Request = RenameRequest;

    fn name(&self) -> &'static str {
        "rename"
    }

    fn rewrite(&self, source: &str, file: &Path, request: &RenameRequest) -> Result<(String, Vec<Change>)> {
        self.check_new_name(&request.new_name)?;
        if request.old_name == request.new_name {
            return Err(RefactronError::transformation(self.name(), "new name equals the old name"));
        }
        let tree = parse_source(source, file)?;
        let scopes = ScopeTable::build(&tree);

        match self.find_binding(&tree, &scopes, request) {
            Some(target) => self.rename_binding(&tree, &scopes, target, request),
            None if request.scope.kind == ScopeKind::Class => self.rename_member(&tree, &scopes, request),
            None => Err(RefactronError::target_not_found(
                self.name(),
                format!("no binding '{}' in {}", request.old_name, request.scope),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use crate::transformers::TransformResult;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn rename(source: &str, old: &str, new: &str, scope: Scope, location: Option<Location>) -> TransformResult {
        RenameTransformer.transform(
            source,
            Path::new("t.js"),
            &RenameRequest {
                old_name: old.into(),
                new_name: new.into(),
                scope,
                location,
            },
        )
    }

    #[test]
    fn test_inner_binding_renamed_outer_untouched() {
        let source = indoc! {"
            let x = 1;
            function f() {
              let x = 2;
              return x + 1;
            }
            console.log(x);
        "};
        let result = rename(source, "x", "value", Scope::local("f"), None);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            result.code,
            indoc! {"
                let x = 1;
                function f() {
                  let value = 2;
                  return value + 1;
                }
                console.log(x);
            "}
        );
        assert_eq!(result.changes.len(), 2);
    }

    #[test]
    fn test_shorthand_property_keeps_key() {
        let source = "function build(n) {\n  const o = { n };\n  return o;\n}\n";
        let result = rename(source, "n", "count", Scope::local("build"), None);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            result.code,
            "function build(count) {\n  const o = { n: count };\n  return o;\n}\n"
        );
    }

    #[test]
    fn test_conflict_in_same_scope() {
        let source = "function f() { let a = 1; let b = 2; return a + b; }";
        let result = rename(source, "a", "b", Scope::local("f"), None);
        assert!(!result.success);
        assert_eq!(result.code, source);
        assert_eq!(result.error.unwrap().code(), ErrorCode::NAMING_CONFLICT);
    }

    #[test]
    fn test_capture_of_outer_name_rejected() {
        let source = "let total = 0;\nfunction f() {\n  let t = 1;\n  return t + total;\n}\n";
        let result = rename(source, "t", "total", Scope::local("f"), None);
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code(), ErrorCode::NAMING_CONFLICT);
    }

    #[test]
    fn test_reserved_and_builtin_names_rejected() {
        let source = "let q = 1;";
        for bad in ["class", "Math", "2fast"] {
            let result = rename(source, "q", bad, Scope::global(), None);
            assert!(!result.success, "{bad}");
            assert_eq!(result.error.unwrap().code(), ErrorCode::NAMING_RESERVED);
        }
    }

    #[test]
    fn test_class_method_renamed_with_this_accesses() {
        let source = indoc! {"
            class A {
              run() {
                return this.go();
              }
              go() {
                return 1;
              }
            }
            other.go();
        "};
        let result = rename(source, "go", "start", Scope::class("A"), None);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            result.code,
            indoc! {"
                class A {
                  run() {
                    return this.start();
                  }
                  start() {
                    return 1;
                  }
                }
                other.go();
            "}
        );
    }

    #[test]
    fn test_location_picks_shadowed_binding() {
        let source = indoc! {"
            function f() {
              { let v = 1; use(v); }
              { let v = 2; use(v); }
            }
        "};
        let location = Location::lines("t.js", 3, 3);
        let result = rename(source, "v", "second", Scope::local("f"), Some(location));
        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            result.code,
            indoc! {"
                function f() {
                  { let v = 1; use(v); }
                  { let second = 2; use(second); }
                }
            "}
        );
    }

    #[test]
    fn test_import_specifier_keeps_external_name() {
        let source = "import { fs } from 'x';\nexport { fs };\nfs.read();\n";
        let result = rename(source, "fs", "files", Scope::module(), None);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            result.code,
            "import { fs as files } from 'x';\nexport { files as fs };\nfiles.read();\n"
        );
    }

    #[test]
    fn test_unknown_target() {
        let result = rename("let a = 1;", "zz", "yy", Scope::global(), None);
        assert_eq!(result.error.unwrap().code(), ErrorCode::TARGET_NOT_FOUND);
    }
}
