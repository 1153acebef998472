//! Tree-sitter parser integration for JavaScript/TypeScript
//!
//! Parses with the grammar implied by the file extension, falls back to the
//! sibling grammar when the primary one reports errors, and converts the
//! result into the arena [`SyntaxTree`].

use super::tree::{DeclarationKeyword, NodeId, NodeKind, SyntaxNode, SyntaxTree};
use crate::core::{Language, Position};
use crate::errors::{RefactronError, Result};
use std::path::Path;
use tree_sitter::{Language as TsLanguage, Node, Parser, Tree};

/// Get the tree-sitter language for a variant
fn get_language(language: Language) -> TsLanguage {
    match language {
        Language::JavaScript | Language::Jsx => tree_sitter_javascript::LANGUAGE.into(),
        Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
    }
}

/// Parse source with the primary grammar for `file`, then the fallback grammar.
///
/// Fails only when both grammars reject the input; the reported error comes
/// from the primary grammar.
pub fn parse_source(source: &str, file: &Path) -> Result<SyntaxTree> {
    let primary = Language::from_path(file);
    match parse_with_language(source, file, primary) {
        Ok(tree) => Ok(tree),
        Err(primary_err) => {
            log::debug!(
                "{} grammar rejected {}, trying {}",
                primary.display_name(),
                file.display(),
                primary.fallback().display_name()
            );
            parse_with_language(source, file, primary.fallback()).map_err(|_| primary_err)
        }
    }
}

/// Parse with exactly one grammar. Any ERROR or MISSING node is a failure.
pub fn parse_with_language(source: &str, file: &Path, language: Language) -> Result<SyntaxTree> {
    let tree = parse_raw(source, file, language)?;
    let root = tree.root_node();
    if root.has_error() {
        let (line, column, detail) = first_error(root)
            .map(|n| {
                let detail = if n.is_missing() {
                    format!("missing `{}`", n.kind())
                } else {
                    "unexpected syntax".to_string()
                };
                (n.start_position().row + 1, n.start_position().column, detail)
            })
            .unwrap_or((1, 0, "unexpected syntax".to_string()));
        return Err(RefactronError::syntax(
            format!("{} ({})", detail, language.display_name()),
            file,
            Some(line),
            Some(column),
        ));
    }

    let mut nodes = Vec::with_capacity(root.descendant_count());
    convert(root, None, None, source, &mut nodes);
    Ok(SyntaxTree::from_parts(
        source.to_string(),
        file.to_path_buf(),
        language,
        nodes,
    ))
}

fn parse_raw(source: &str, file: &Path, language: Language) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&get_language(language))
        .map_err(|e| RefactronError::unknown(format!("failed to load grammar: {}", e)))?;
    parser
        .parse(source, None)
        .ok_or_else(|| RefactronError::syntax("parser produced no tree", file, None, None))
}

/// Check whether `source` parses cleanly with either grammar for `file`.
pub fn parses_cleanly(source: &str, file: &Path) -> bool {
    parse_source(source, file).is_ok()
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() || child.is_missing() {
            if let Some(found) = first_error(child) {
                return Some(found);
            }
        }
    }
    None
}

fn convert(
    node: Node,
    field: Option<&'static str>,
    parent: Option<NodeId>,
    source: &str,
    nodes: &mut Vec<SyntaxNode>,
) -> NodeId {
    let id = NodeId::from_index(nodes.len());
    nodes.push(SyntaxNode {
        kind: classify(node, source),
        ts_kind: node.kind(),
        field,
        span: node.start_byte()..node.end_byte(),
        start: Position::new(node.start_position().row + 1, node.start_position().column),
        end: Position::new(node.end_position().row + 1, node.end_position().column),
        parent,
        children: Vec::new(),
    });

    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            let child = cursor.node();
            if child.is_named() {
                let child_id = convert(child, cursor.field_name(), Some(id), source, nodes);
                nodes[id.index()].children.push(child_id);
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    id
}

fn text_of(node: Node, source: &str) -> String {
    source[node.start_byte()..node.end_byte()].to_string()
}

fn has_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == token);
    found
}

fn field_text(node: Node, field: &str, source: &str) -> Option<String> {
    node.child_by_field_name(field).map(|n| text_of(n, source))
}

fn classify(node: Node, source: &str) -> NodeKind {
    match node.kind() {
        "program" => NodeKind::Program,
        "function_declaration"
        | "generator_function_declaration"
        | "function_expression"
        | "function"
        | "generator_function"
        | "arrow_function" => NodeKind::Function {
            name: field_text(node, "name", source).or_else(|| declarator_name(node, source)),
            is_arrow: node.kind() == "arrow_function",
            is_async: has_token(node, "async"),
        },
        "method_definition" => NodeKind::Method {
            name: field_text(node, "name", source).unwrap_or_else(|| "<computed>".to_string()),
            is_async: has_token(node, "async"),
        },
        "class_declaration" | "class" | "abstract_class_declaration" => NodeKind::Class {
            name: field_text(node, "name", source).or_else(|| declarator_name(node, source)),
        },
        "interface_declaration" => NodeKind::Interface {
            name: field_text(node, "name", source).unwrap_or_default(),
        },
        "class_body" => NodeKind::ClassBody,
        "statement_block" => NodeKind::Block,
        "lexical_declaration" => {
            let keyword = node
                .child_by_field_name("kind")
                .or_else(|| node.child(0))
                .map(|k| k.kind());
            NodeKind::VariableDeclaration {
                keyword: if keyword == Some("let") {
                    DeclarationKeyword::Let
                } else {
                    DeclarationKeyword::Const
                },
            }
        }
        "variable_declaration" => NodeKind::VariableDeclaration {
            keyword: DeclarationKeyword::Var,
        },
        "variable_declarator" => NodeKind::VariableDeclarator,
        "if_statement" => NodeKind::If,
        "else_clause" => NodeKind::Else,
        "for_statement" | "for_in_statement" => NodeKind::For,
        "while_statement" | "do_statement" => NodeKind::While,
        "switch_statement" => NodeKind::Switch,
        "switch_case" | "switch_default" => NodeKind::SwitchCase,
        "return_statement" => NodeKind::Return,
        "throw_statement" => NodeKind::Throw,
        "break_statement" => NodeKind::Break,
        "continue_statement" => NodeKind::Continue,
        "expression_statement" => NodeKind::ExpressionStatement,
        "binary_expression" => NodeKind::Binary {
            operator: node
                .child_by_field_name("operator")
                .map(|op| op.kind().to_string())
                .unwrap_or_default(),
        },
        "unary_expression" => NodeKind::Unary {
            operator: node
                .child_by_field_name("operator")
                .map(|op| op.kind().to_string())
                .unwrap_or_default(),
        },
        "parenthesized_expression" => NodeKind::Parenthesized,
        "call_expression" => NodeKind::Call,
        "new_expression" => NodeKind::New,
        "member_expression" => NodeKind::Member,
        "await_expression" => NodeKind::Await,
        "yield_expression" => NodeKind::Yield,
        "identifier" => NodeKind::Identifier {
            name: text_of(node, source),
        },
        "shorthand_property_identifier" => NodeKind::ShorthandProperty {
            name: text_of(node, source),
        },
        "shorthand_property_identifier_pattern" => NodeKind::ShorthandPattern {
            name: text_of(node, source),
        },
        "property_identifier" | "private_property_identifier" => NodeKind::PropertyName {
            name: text_of(node, source),
        },
        "type_identifier" => NodeKind::TypeIdentifier {
            name: text_of(node, source),
        },
        "this" => NodeKind::This,
        "comment" => NodeKind::Comment,
        "ERROR" => NodeKind::Error,
        _ => NodeKind::Other,
    }
}

/// Name of the variable an anonymous function or class expression is assigned to.
fn declarator_name(node: Node, source: &str) -> Option<String> {
    let parent = node.parent()?;
    if parent.kind() == "variable_declarator" {
        let name = parent.child_by_field_name("name")?;
        if name.kind() == "identifier" {
            return Some(text_of(name, source));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_javascript() {
        let tree = parse_source("function hello() { return 'world'; }", Path::new("t.js")).unwrap();
        assert_eq!(tree.language(), Language::JavaScript);
        assert!(tree.len() > 3);
    }

    #[test]
    fn test_parse_typescript_from_extension() {
        let source = "function hello(name: string): string { return name; }";
        let tree = parse_source(source, Path::new("t.ts")).unwrap();
        assert_eq!(tree.language(), Language::TypeScript);
    }

    #[test]
    fn test_typescript_in_js_file_uses_fallback() {
        let source = "interface Shape { area(): number; }";
        let tree = parse_source(source, Path::new("t.js")).unwrap();
        assert_eq!(tree.language(), Language::TypeScript);
    }

    #[test]
    fn test_syntax_error_reports_position() {
        let err = parse_source("function (", Path::new("broken.js")).unwrap_err();
        match err {
            RefactronError::Syntax { line, .. } => assert_eq!(line, Some(1)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_lexical_keyword_classification() {
        let tree = parse_source("let a = 1; const b = 2; var c = 3;", Path::new("t.js")).unwrap();
        let keywords: Vec<_> = tree
            .node_ids()
            .filter_map(|id| match tree.kind(id) {
                NodeKind::VariableDeclaration { keyword } => Some(*keyword),
                _ => None,
            })
            .collect();
        assert_eq!(
            keywords,
            vec![
                DeclarationKeyword::Let,
                DeclarationKeyword::Const,
                DeclarationKeyword::Var
            ]
        );
    }

    #[test]
    fn test_async_arrow_detected() {
        let tree = parse_source("const load = async () => { await go(); };", Path::new("t.js")).unwrap();
        let func = tree.find_all(|n| n.is_function_like())[0];
        assert!(matches!(
            tree.kind(func),
            NodeKind::Function { is_async: true, is_arrow: true, .. }
        ));
    }
}
