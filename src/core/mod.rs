//! Core value types shared by every pipeline stage.

mod types;

pub use types::{
    CodeBlock, Effort, IdentifierKind, Language, Location, Position, RiskLevel, Scope, ScopeKind,
    Severity,
};
