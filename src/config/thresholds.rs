use serde::{Deserialize, Serialize};

/// Smell detection thresholds.
///
/// ```toml
/// long_method_threshold = 20
/// complexity_threshold = 10
/// duplication_threshold = 0.85
/// nesting_level_threshold = 4
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionThresholds {
    /// Function length in lines above which a long-method smell is reported
    #[serde(default = "default_long_method", alias = "longMethodThreshold")]
    pub long_method_threshold: usize,

    /// Conditional complexity above which a complex-conditional smell is reported
    #[serde(default = "default_complexity", alias = "complexityThreshold")]
    pub complexity_threshold: usize,

    /// Similarity in `[0, 1]` at or above which two blocks count as duplicates
    #[serde(default = "default_duplication", alias = "duplicationThreshold")]
    pub duplication_threshold: f64,

    /// Nesting depth above which a conditional is reported
    #[serde(default = "default_nesting", alias = "nestingLevelThreshold")]
    pub nesting_level_threshold: usize,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            long_method_threshold: default_long_method(),
            complexity_threshold: default_complexity(),
            duplication_threshold: default_duplication(),
            nesting_level_threshold: default_nesting(),
        }
    }
}

impl DetectionThresholds {
    /// Range problems as `(field, message)` pairs.
    pub fn problems(&self) -> Vec<(&'static str, String)> {
        let mut problems = Vec::new();
        if self.long_method_threshold == 0 {
            problems.push((
                "long_method_threshold",
                "must be at least 1 line".to_string(),
            ));
        }
        if self.complexity_threshold == 0 {
            problems.push(("complexity_threshold", "must be at least 1".to_string()));
        }
        if self.nesting_level_threshold == 0 {
            problems.push(("nesting_level_threshold", "must be at least 1".to_string()));
        }
        if !(self.duplication_threshold > 0.0 && self.duplication_threshold <= 1.0) {
            problems.push((
                "duplication_threshold",
                format!(
                    "must be in (0, 1], got {}",
                    self.duplication_threshold
                ),
            ));
        }
        problems
    }
}

fn default_long_method() -> usize {
    20
}
fn default_complexity() -> usize {
    10
}
fn default_duplication() -> f64 {
    0.85
}
fn default_nesting() -> usize {
    4
}
