//! Syntax tree primitives: parsing, traversal, scopes, regeneration,
//! similarity and diff text.

mod diff;
mod edit;
mod parser;
mod scope;
mod similarity;
pub mod text;
mod tree;

pub use diff::{apply_unified_diff, unified_diff};
pub use edit::TreeEditor;
pub use parser::{parse_source, parse_with_language, parses_cleanly};
pub use scope::{
    pattern_identifiers, Binding, BindingId, BindingKind, ClassMember, DuplicateDeclaration,
    ScopeData, ScopeId, ScopeTable,
};
pub use similarity::{collapse_whitespace, levenshtein, normalized_node_text, similarity};
pub use tree::{DeclarationKeyword, NodeId, NodeKind, SyntaxNode, SyntaxTree};
