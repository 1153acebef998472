//! Code smell detection.
//!
//! A source file is parsed once; the five detectors are independent
//! read-only walks over the same immutable tree and run concurrently.
//! A file that fails to parse yields an error and no smells.

mod conditional;
mod duplication;
mod long_method;
mod naming;
mod solid;

use crate::ast::{parse_source, ScopeTable, SyntaxTree};
use crate::config::{DetectionThresholds, RefactoringConfig};
use crate::core::{CodeBlock, IdentifierKind, Location, Scope, Severity};
use crate::errors::Result;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub use naming::NamingIssue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SolidPrinciple {
    SingleResponsibility,
    InterfaceSegregation,
    DependencyInversion,
}

impl SolidPrinciple {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Self::SingleResponsibility => "SRP",
            Self::InterfaceSegregation => "ISP",
            Self::DependencyInversion => "DIP",
        }
    }
}

impl fmt::Display for SolidPrinciple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

/// A detected defect. Each variant carries only the fields relevant to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CodeSmell {
    LongMethod {
        method_name: String,
        line_count: usize,
        threshold: usize,
        extractable_blocks: Vec<CodeBlock>,
        severity: Severity,
        location: Location,
    },
    Duplication {
        instances: Vec<CodeBlock>,
        similarity: f64,
        severity: Severity,
        location: Location,
    },
    ComplexConditional {
        complexity: usize,
        nesting_level: usize,
        /// Case count when the conditional is a `switch`.
        switch_cases: Option<usize>,
        severity: Severity,
        location: Location,
    },
    PoorNaming {
        name: String,
        identifier_kind: IdentifierKind,
        scope: Scope,
        issue: NamingIssue,
        severity: Severity,
        location: Location,
    },
    SolidViolation {
        principle: SolidPrinciple,
        class_name: String,
        violation: String,
        severity: Severity,
        location: Location,
    },
}

impl CodeSmell {
    pub fn severity(&self) -> Severity {
        match self {
            Self::LongMethod { severity, .. }
            | Self::Duplication { severity, .. }
            | Self::ComplexConditional { severity, .. }
            | Self::PoorNaming { severity, .. }
            | Self::SolidViolation { severity, .. } => *severity,
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            Self::LongMethod { location, .. }
            | Self::Duplication { location, .. }
            | Self::ComplexConditional { location, .. }
            | Self::PoorNaming { location, .. }
            | Self::SolidViolation { location, .. } => location,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::LongMethod { .. } => "long_method",
            Self::Duplication { .. } => "duplication",
            Self::ComplexConditional { .. } => "complex_conditional",
            Self::PoorNaming { .. } => "poor_naming",
            Self::SolidViolation { .. } => "solid_violation",
        }
    }

    /// One-line human description.
    pub fn message(&self) -> String {
        match self {
            Self::LongMethod {
                method_name,
                line_count,
                threshold,
                ..
            } => format!(
                "Function '{}' has {} lines (threshold: {})",
                method_name, line_count, threshold
            ),
            Self::Duplication {
                instances,
                similarity,
                ..
            } => format!(
                "{} similar blocks ({:.0}% similar)",
                instances.len(),
                similarity * 100.0
            ),
            Self::ComplexConditional {
                complexity,
                nesting_level,
                switch_cases: Some(cases),
                ..
            } => format!(
                "switch with {} cases (complexity {}, nesting {})",
                cases, complexity, nesting_level
            ),
            Self::ComplexConditional {
                complexity,
                nesting_level,
                ..
            } => format!(
                "Conditional with complexity {} at nesting level {}",
                complexity, nesting_level
            ),
            Self::PoorNaming {
                name,
                identifier_kind,
                issue,
                ..
            } => format!("{} '{}' {}", identifier_kind, name, issue),
            Self::SolidViolation {
                principle,
                class_name,
                violation,
                ..
            } => format!("{} violation in '{}': {}", principle, class_name, violation),
        }
    }
}

/// Severity scaled by how far `value` exceeds `threshold` (threshold × 2 → high).
pub(crate) fn ratio_severity(value: usize, threshold: usize) -> Severity {
    let ratio = value as f64 / threshold.max(1) as f64;
    if ratio > 2.0 {
        Severity::High
    } else if ratio > 1.5 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

#[derive(Debug, Clone, Default)]
pub struct SmellDetector {
    thresholds: DetectionThresholds,
}

impl SmellDetector {
    pub fn new(thresholds: DetectionThresholds) -> Self {
        Self { thresholds }
    }

    pub fn from_config(config: &RefactoringConfig) -> Self {
        Self::new(config.thresholds.clone())
    }

    pub fn thresholds(&self) -> &DetectionThresholds {
        &self.thresholds
    }

    /// Parse `source` and run every detector over it.
    pub fn detect(&self, source: &str, file: &Path) -> Result<Vec<CodeSmell>> {
        let tree = parse_source(source, file)?;
        Ok(self.detect_in_tree(&tree))
    }

    /// Run every detector over an already parsed tree, sorted by position.
    pub fn detect_in_tree(&self, tree: &SyntaxTree) -> Vec<CodeSmell> {
        let t = &self.thresholds;
        let ((long, dup), (cond, (naming, solid))) = rayon::join(
            || {
                rayon::join(
                    || long_method::detect(tree, t.long_method_threshold),
                    || duplication::detect(tree, t.duplication_threshold),
                )
            },
            || {
                rayon::join(
                    || {
                        conditional::detect(
                            tree,
                            t.complexity_threshold,
                            t.nesting_level_threshold,
                        )
                    },
                    || {
                        rayon::join(
                            || naming::detect(tree, &ScopeTable::build(tree)),
                            || solid::detect(tree),
                        )
                    },
                )
            },
        );

        let mut smells: Vec<CodeSmell> = long
            .into_iter()
            .chain(dup)
            .chain(cond)
            .chain(naming)
            .chain(solid)
            .collect();
        smells.sort_by(|a, b| a.location().start.cmp(&b.location().start));
        log::debug!(
            "Detected {} smells in {}",
            smells.len(),
            tree.file().display()
        );
        smells
    }

    /// Detect across many independent files in parallel. Results keep input order.
    pub fn detect_many(&self, inputs: &[(PathBuf, String)]) -> Vec<(PathBuf, Result<Vec<CodeSmell>>)> {
        inputs
            .par_iter()
            .map(|(path, source)| {
                let result = self.detect(source, path);
                if let Err(e) = &result {
                    log::warn!("Skipping {}: {}", path.display(), e);
                }
                (path.clone(), result)
            })
            .collect()
    }
}
