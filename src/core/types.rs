//! Common type definitions used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Source language variant, which selects the tree-sitter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    Jsx,
    TypeScript,
    Tsx,
}

impl Language {
    /// Map a file extension to a language variant.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "js" | "mjs" | "cjs" => Some(Self::JavaScript),
            "jsx" => Some(Self::Jsx),
            "ts" | "mts" | "cts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            _ => None,
        }
    }

    /// Determine the language from a path, defaulting to JavaScript.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .unwrap_or(Self::JavaScript)
    }

    /// The grammar tried when the primary grammar rejects the input.
    pub fn fallback(&self) -> Self {
        match self {
            Self::JavaScript | Self::Jsx => Self::TypeScript,
            Self::TypeScript => Self::JavaScript,
            Self::Tsx => Self::Jsx,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::JavaScript => "JavaScript",
            Self::Jsx => "JSX",
            Self::TypeScript => "TypeScript",
            Self::Tsx => "TSX",
        }
    }
}

/// A 1-based line and 0-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Half-open source range. `start <= end` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: PathBuf,
    pub start: Position,
    pub end: Position,
}

impl Location {
    /// Create a location, swapping the endpoints if they arrive reversed.
    pub fn new(file: impl Into<PathBuf>, start: Position, end: Position) -> Self {
        let (start, end) = if start <= end {
            (start, end)
        } else {
            (end, start)
        };
        Self {
            file: file.into(),
            start,
            end,
        }
    }

    /// Convenience constructor for whole-line ranges.
    pub fn lines(file: impl Into<PathBuf>, start_line: usize, end_line: usize) -> Self {
        Self::new(
            file,
            Position::new(start_line, 0),
            Position::new(end_line, usize::MAX),
        )
    }

    pub fn start_line(&self) -> usize {
        self.start.line
    }

    pub fn end_line(&self) -> usize {
        self.end.line
    }

    /// Number of lines spanned, counting both endpoints.
    pub fn line_count(&self) -> usize {
        self.end.line - self.start.line + 1
    }

    pub fn contains(&self, other: &Location) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: &Location) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether this location covers the same lines as `other`.
    pub fn same_lines(&self, other: &Location) -> bool {
        self.start.line == other.start.line && self.end.line == other.end.line
    }

    /// Shift the location so that `first_line` becomes line 1.
    pub fn relative_to(&self, first_line: usize) -> Location {
        let offset = first_line.saturating_sub(1);
        Location {
            file: self.file.clone(),
            start: Position::new(self.start.line - offset, self.start.column),
            end: Position::new(self.end.line - offset, self.end.column),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.file.display(), self.start, self.end)
    }
}

/// A candidate extraction unit: source text plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub code: String,
    pub location: Location,
}

impl CodeBlock {
    pub fn new(code: impl Into<String>, location: Location) -> Self {
        Self {
            code: code.into(),
            location,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Local,
    Class,
    Module,
    Global,
}

/// Lexical binding context, e.g. the local scope of function `f`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub kind: ScopeKind,
    pub name: String,
}

impl Scope {
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            kind: ScopeKind::Local,
            name: name.into(),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self {
            kind: ScopeKind::Class,
            name: name.into(),
        }
    }

    pub fn module() -> Self {
        Self {
            kind: ScopeKind::Module,
            name: "module".to_string(),
        }
    }

    pub fn global() -> Self {
        Self {
            kind: ScopeKind::Global,
            name: "global".to_string(),
        }
    }

    /// Module and global scopes both denote the top level of a file.
    pub fn is_top_level(&self) -> bool {
        matches!(self.kind, ScopeKind::Module | ScopeKind::Global)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ScopeKind::Local => write!(f, "local '{}'", self.name),
            ScopeKind::Class => write!(f, "class '{}'", self.name),
            ScopeKind::Module => write!(f, "module scope"),
            ScopeKind::Global => write!(f, "global scope"),
        }
    }
}

/// What an identifier names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    Variable,
    Function,
    Class,
    Parameter,
    Method,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Variable => "variable",
            Self::Function => "function",
            Self::Class => "class",
            Self::Parameter => "parameter",
            Self::Method => "method",
        };
        f.write_str(s)
    }
}

/// Smell severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn weight(&self) -> i32 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

/// Risk that a rewrite changes behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn weight(&self) -> i32 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

/// Estimated effort to review and apply a rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Low,
    Medium,
    High,
}

impl Effort {
    pub fn weight(&self) -> i32 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    /// Minutes used for plan duration estimates.
    pub fn minutes(&self) -> u32 {
        match self {
            Self::Low => 5,
            Self::Medium => 15,
            Self::High => 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_normalizes_reversed_endpoints() {
        let loc = Location::new("a.js", Position::new(9, 0), Position::new(3, 4));
        assert!(loc.start <= loc.end);
        assert_eq!(loc.start_line(), 3);
        assert_eq!(loc.line_count(), 7);
    }

    #[test]
    fn test_location_containment_and_overlap() {
        let outer = Location::new("a.js", Position::new(1, 0), Position::new(10, 1));
        let inner = Location::new("a.js", Position::new(2, 2), Position::new(4, 3));
        let after = Location::new("a.js", Position::new(11, 0), Position::new(12, 0));
        assert!(outer.contains(&inner));
        assert!(outer.overlaps(&inner));
        assert!(!outer.overlaps(&after));
    }

    #[test]
    fn test_relative_to_shifts_lines() {
        let loc = Location::new("a.js", Position::new(12, 2), Position::new(14, 3));
        let rel = loc.relative_to(10);
        assert_eq!(rel.start, Position::new(3, 2));
        assert_eq!(rel.end, Position::new(5, 3));
    }

    #[test]
    fn test_language_detection() {
        assert_eq!(Language::from_path(Path::new("a.ts")), Language::TypeScript);
        assert_eq!(Language::from_path(Path::new("a.tsx")), Language::Tsx);
        assert_eq!(Language::from_path(Path::new("a.mjs")), Language::JavaScript);
        assert_eq!(Language::from_path(Path::new("README")), Language::JavaScript);
        assert_eq!(Language::JavaScript.fallback(), Language::TypeScript);
    }

    #[test]
    fn test_weights_and_minutes() {
        assert_eq!(Severity::High.weight(), 3);
        assert_eq!(RiskLevel::Low.weight(), 1);
        assert_eq!(Effort::Medium.minutes(), 15);
        assert!(Severity::Low < Severity::High);
    }
}
