use super::CodeSmell;
use crate::ast::{BindingKind, NodeId, NodeKind, ScopeTable, SyntaxTree};
use crate::core::{IdentifierKind, Scope, Severity};
use serde::Serialize;
use std::fmt;

const SINGLE_LETTER_WHITELIST: &[&str] = &["i", "j", "k", "x", "y", "z"];

const TWO_LETTER_WHITELIST: &[&str] = &[
    "id", "db", "ui", "io", "el", "fn", "cb", "ok", "ms", "px", "os", "ip", "up", "to", "on",
];

const GENERIC_VARIABLE_NAMES: &[&str] = &[
    "data", "temp", "tmp", "foo", "bar", "baz", "qux", "stuff", "thing", "things", "obj", "arr",
    "str", "num", "val", "var", "info", "misc",
];

const GENERIC_FUNCTION_NAMES: &[&str] = &[
    "foo", "bar", "baz", "func", "doIt", "doStuff", "doSomething", "process", "handle", "helper",
    "temp", "tmp", "stuff", "thing", "data", "method",
];

const GENERIC_CLASS_SUFFIXES: &[&str] = &[
    "Manager", "Handler", "Helper", "Util", "Utils", "Processor", "Data", "Info", "Stuff",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingIssue {
    SingleLetter,
    TooShort,
    Generic,
    GenericSuffix,
}

impl fmt::Display for NamingIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SingleLetter => "is a single letter",
            Self::TooShort => "is too short to be descriptive",
            Self::Generic => "is a generic name",
            Self::GenericSuffix => "ends in a generic suffix",
        };
        f.write_str(s)
    }
}

pub(super) fn detect(tree: &SyntaxTree, scopes: &ScopeTable) -> Vec<CodeSmell> {
    let mut smells = Vec::new();

    for (_, binding) in scopes.bindings() {
        if binding.kind != BindingKind::Variable {
            continue;
        }
        if let Some((issue, severity)) = variable_issue(&binding.name) {
            smells.push(smell(
                tree,
                binding.declaration,
                &binding.name,
                IdentifierKind::Variable,
                scopes.scope(binding.scope).scope.clone(),
                issue,
                severity,
            ));
        }
    }

    for id in tree.node_ids() {
        match tree.kind(id) {
            NodeKind::Function { name: Some(name), .. } => {
                let Some(ident) = tree.child_by_field(id, "name") else {
                    continue;
                };
                if let Some(issue) = function_issue(name) {
                    let scope = scopes.scope(scopes.scope_at(tree, id)).scope.clone();
                    smells.push(smell(tree, ident, name, IdentifierKind::Function, scope, issue, Severity::Medium));
                }
            }
            NodeKind::Method { name, .. } if name != "constructor" => {
                let Some(ident) = tree.child_by_field(id, "name") else {
                    continue;
                };
                if let Some(issue) = function_issue(name) {
                    let class_name = tree
                        .enclosing_class(id)
                        .and_then(|c| match tree.kind(c) {
                            NodeKind::Class { name } => name.clone(),
                            _ => None,
                        })
                        .unwrap_or_else(|| "<anonymous>".into());
                    smells.push(smell(
                        tree,
                        ident,
                        name,
                        IdentifierKind::Method,
                        Scope::class(class_name),
                        issue,
                        Severity::Medium,
                    ));
                }
            }
            NodeKind::Class { name: Some(name) } => {
                let Some(ident) = tree.child_by_field(id, "name") else {
                    continue;
                };
                if let Some(issue) = class_issue(name) {
                    let scope = scopes.scope(scopes.scope_at(tree, id)).scope.clone();
                    smells.push(smell(tree, ident, name, IdentifierKind::Class, scope, issue, Severity::Low));
                }
            }
            _ => {}
        }
    }
    smells
}

fn smell(
    tree: &SyntaxTree,
    ident: NodeId,
    name: &str,
    identifier_kind: IdentifierKind,
    scope: Scope,
    issue: NamingIssue,
    severity: Severity,
) -> CodeSmell {
    CodeSmell::PoorNaming {
        name: name.to_string(),
        identifier_kind,
        scope,
        issue,
        severity,
        location: tree.location(ident),
    }
}

pub(crate) fn variable_issue(name: &str) -> Option<(NamingIssue, Severity)> {
    let len = name.chars().count();
    if len == 1 && !SINGLE_LETTER_WHITELIST.contains(&name) && name != "_" {
        Some((NamingIssue::SingleLetter, Severity::Medium))
    } else if len == 2 && !TWO_LETTER_WHITELIST.contains(&name) {
        Some((NamingIssue::TooShort, Severity::Low))
    } else if GENERIC_VARIABLE_NAMES.contains(&name) {
        Some((NamingIssue::Generic, Severity::Medium))
    } else {
        None
    }
}

fn function_issue(name: &str) -> Option<NamingIssue> {
    if name.chars().count() <= 2 {
        Some(NamingIssue::TooShort)
    } else if GENERIC_FUNCTION_NAMES.contains(&name) {
        Some(NamingIssue::Generic)
    } else {
        None
    }
}

fn class_issue(name: &str) -> Option<NamingIssue> {
    if name.chars().count() <= 2 {
        Some(NamingIssue::TooShort)
    } else if GENERIC_CLASS_SUFFIXES.contains(&name) {
        Some(NamingIssue::Generic)
    } else if GENERIC_CLASS_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        Some(NamingIssue::GenericSuffix)
    } else {
        None
    }
}
