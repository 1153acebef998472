use super::{CodeSmell, SolidPrinciple};
use crate::ast::{text, NodeId, NodeKind, SyntaxTree};
use crate::core::Severity;
use std::collections::HashMap;

const MAX_METHODS: usize = 15;
const MAX_INTERFACE_METHODS: usize = 10;
const MAX_CONCRETE_INSTANTIATIONS: usize = 5;

pub(super) fn detect(tree: &SyntaxTree) -> Vec<CodeSmell> {
    let interfaces = interface_sizes(tree);
    let mut smells = Vec::new();

    for class in tree.find_all(|n| matches!(n.kind, NodeKind::Class { .. })) {
        let class_name = match tree.kind(class) {
            NodeKind::Class { name: Some(name) } => name.clone(),
            _ => "<anonymous>".to_string(),
        };
        let location = tree.location(class);

        let methods = method_count(tree, class);
        if methods > MAX_METHODS {
            smells.push(CodeSmell::SolidViolation {
                principle: SolidPrinciple::SingleResponsibility,
                class_name: class_name.clone(),
                violation: format!(
                    "class has {} methods (threshold: {})",
                    methods, MAX_METHODS
                ),
                severity: if methods > MAX_METHODS * 2 {
                    Severity::High
                } else {
                    Severity::Medium
                },
                location: location.clone(),
            });
        }

        for interface in implemented_interfaces(tree, class) {
            if let Some(methods) = interfaces.get(interface.as_str()) {
                if *methods > MAX_INTERFACE_METHODS {
                    smells.push(CodeSmell::SolidViolation {
                        principle: SolidPrinciple::InterfaceSegregation,
                        class_name: class_name.clone(),
                        violation: format!(
                            "implements '{}' with {} methods (threshold: {})",
                            interface, methods, MAX_INTERFACE_METHODS
                        ),
                        severity: Severity::Medium,
                        location: location.clone(),
                    });
                }
            }
        }

        let concrete = concrete_instantiations(tree, class);
        if concrete.len() > MAX_CONCRETE_INSTANTIATIONS {
            smells.push(CodeSmell::SolidViolation {
                principle: SolidPrinciple::DependencyInversion,
                class_name,
                violation: format!(
                    "directly instantiates {} concrete types ({})",
                    concrete.len(),
                    concrete.join(", ")
                ),
                severity: if concrete.len() > MAX_CONCRETE_INSTANTIATIONS * 2 {
                    Severity::High
                } else {
                    Severity::Medium
                },
                location,
            });
        }
    }
    smells
}

fn method_count(tree: &SyntaxTree, class: NodeId) -> usize {
    tree.child_by_field(class, "body")
        .map(|body| {
            tree.children(body)
                .iter()
                .filter(|c| matches!(tree.kind(**c), NodeKind::Method { .. }))
                .count()
        })
        .unwrap_or(0)
}

/// Method signature counts of interfaces declared in this file. Properties
/// are not counted.
fn interface_sizes(tree: &SyntaxTree) -> HashMap<&str, usize> {
    tree.find_all(|n| matches!(n.kind, NodeKind::Interface { .. }))
        .into_iter()
        .filter_map(|id| {
            let name = match tree.kind(id) {
                NodeKind::Interface { name } => name.as_str(),
                _ => return None,
            };
            let body = tree.child_by_field(id, "body")?;
            let methods = tree
                .children(body)
                .iter()
                .filter(|m| tree.node(**m).ts_kind == "method_signature")
                .count();
            Some((name, methods))
        })
        .collect()
}

fn implemented_interfaces(tree: &SyntaxTree, class: NodeId) -> Vec<String> {
    tree.children(class)
        .iter()
        .filter(|c| tree.node(**c).ts_kind == "class_heritage")
        .flat_map(|heritage| tree.children(*heritage).to_vec())
        .filter(|clause| tree.node(*clause).ts_kind == "implements_clause")
        .flat_map(|clause| tree.children(clause).to_vec())
        .map(|t| tree.text(t).to_string())
        .collect()
}

/// Distinct user-defined constructors invoked with `new` inside the class.
fn concrete_instantiations(tree: &SyntaxTree, class: NodeId) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for id in tree.descendants(class) {
        if !matches!(tree.kind(id), NodeKind::New) {
            continue;
        }
        let Some(ctor) = tree.child_by_field(id, "constructor") else {
            continue;
        };
        let name = tree.text(ctor);
        let is_type_name = name.chars().next().map(char::is_uppercase).unwrap_or(false)
            && matches!(tree.kind(ctor), NodeKind::Identifier { .. });
        if is_type_name && !text::is_builtin(name) && !seen.iter().any(|s| s == name) {
            seen.push(name.to_string());
        }
    }
    seen
}
