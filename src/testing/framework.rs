use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestFramework {
    Jest,
    Vitest,
    Mocha,
    /// Node's built-in `node --test` runner.
    NodeTest,
    /// A configured shell command.
    Custom(String),
}

impl TestFramework {
    pub fn name(&self) -> &str {
        match self {
            Self::Jest => "jest",
            Self::Vitest => "vitest",
            Self::Mocha => "mocha",
            Self::NodeTest => "node --test",
            Self::Custom(command) => command,
        }
    }

    /// Whether the framework's output can be requested as JSON.
    pub fn has_structured_output(&self) -> bool {
        matches!(self, Self::Jest | Self::Vitest | Self::Mocha)
    }
}

impl fmt::Display for TestFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const JEST_CONFIGS: &[&str] = &[
    "jest.config.js",
    "jest.config.ts",
    "jest.config.mjs",
    "jest.config.cjs",
    "jest.config.json",
];

const VITEST_CONFIGS: &[&str] = &[
    "vitest.config.js",
    "vitest.config.ts",
    "vitest.config.mjs",
    "vitest.config.mts",
];

const MOCHA_CONFIGS: &[&str] = &[
    ".mocharc.js",
    ".mocharc.cjs",
    ".mocharc.json",
    ".mocharc.yml",
    ".mocharc.yaml",
];

const TEST_DIRS: &[&str] = &["test", "tests", "__tests__"];

const SOURCE_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs", "ts", "tsx", "mts", "cts"];

const MAX_SCAN_DEPTH: usize = 6;

/// Signals collected from a project directory.
#[derive(Debug, Default)]
pub struct FrameworkDetector {
    declares_jest: bool,
    declares_vitest: bool,
    declares_mocha: bool,
    script_uses_node_test: bool,
    has_jest_config: bool,
    has_vitest_config: bool,
    has_mocha_config: bool,
    test_file_count: usize,
}

impl FrameworkDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyze_project(&mut self, root: &Path) {
        self.analyze_manifest(root);
        self.has_jest_config = JEST_CONFIGS.iter().any(|f| root.join(f).is_file());
        self.has_vitest_config = VITEST_CONFIGS.iter().any(|f| root.join(f).is_file());
        self.has_mocha_config = MOCHA_CONFIGS.iter().any(|f| root.join(f).is_file());
        self.test_file_count = test_files(root).len();
    }

    fn analyze_manifest(&mut self, root: &Path) {
        let path = root.join("package.json");
        let Ok(text) = fs::read_to_string(&path) else {
            return;
        };
        let manifest: serde_json::Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Ignoring unreadable {}: {}", path.display(), e);
                return;
            }
        };
        let declares = |name: &str| {
            ["dependencies", "devDependencies"]
                .iter()
                .any(|section| manifest[section].get(name).is_some())
        };
        self.declares_jest = declares("jest");
        self.declares_vitest = declares("vitest");
        self.declares_mocha = declares("mocha");

        if let Some(script) = manifest["scripts"]["test"].as_str() {
            self.declares_vitest |= script.contains("vitest");
            self.declares_jest |= script.contains("jest");
            self.declares_mocha |= script.contains("mocha");
            self.script_uses_node_test = script.contains("node --test");
        }
    }

    pub fn detect_framework(&self) -> Option<TestFramework> {
        if self.declares_vitest || self.has_vitest_config {
            Some(TestFramework::Vitest)
        } else if self.declares_jest || self.has_jest_config {
            Some(TestFramework::Jest)
        } else if self.declares_mocha || self.has_mocha_config {
            Some(TestFramework::Mocha)
        } else if self.script_uses_node_test || self.test_file_count > 0 {
            Some(TestFramework::NodeTest)
        } else {
            None
        }
    }
}

pub fn detect_test_framework(root: &Path) -> Option<TestFramework> {
    let mut detector = FrameworkDetector::new();
    detector.analyze_project(root);
    let framework = detector.detect_framework();
    log::debug!(
        "Test framework for {}: {}",
        root.display(),
        framework.as_ref().map(|f| f.name()).unwrap_or("none")
    );
    framework
}

/// Files named like tests (`*.test.*`, `*.spec.*`) or living in a test
/// directory, skipping `node_modules` and hidden directories.
pub fn test_files(root: &Path) -> Vec<std::path::PathBuf> {
    WalkDir::new(root)
        .max_depth(MAX_SCAN_DEPTH)
        .into_iter()
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            entry.depth() == 0 || !(name == "node_modules" || name.starts_with('.'))
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_test_file(root, path))
        .collect()
}

fn is_test_file(root: &Path, path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    if !SOURCE_EXTENSIONS.contains(&ext) {
        return false;
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    if stem.ends_with(".test") || stem.ends_with(".spec") {
        return true;
    }
    path.strip_prefix(root)
        .map(|relative| {
            relative
                .parent()
                .map(|dir| {
                    dir.components()
                        .any(|c| c.as_os_str().to_str().is_some_and(|name| TEST_DIRS.contains(&name)))
                })
                .unwrap_or(false)
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        dir
    }

    #[test]
    fn test_detects_from_dev_dependencies() {
        let dir = project(&[("package.json", r#"{"devDependencies": {"jest": "^29.0.0"}}"#)]);
        assert_eq!(detect_test_framework(dir.path()), Some(TestFramework::Jest));
    }

    #[test]
    fn test_detects_from_test_script() {
        let dir = project(&[("package.json", r#"{"scripts": {"test": "vitest run"}}"#)]);
        assert_eq!(detect_test_framework(dir.path()), Some(TestFramework::Vitest));
    }

    #[test]
    fn test_detects_from_config_file() {
        let dir = project(&[(".mocharc.json", "{}")]);
        assert_eq!(detect_test_framework(dir.path()), Some(TestFramework::Mocha));
    }

    #[test]
    fn test_test_files_fall_back_to_node_runner() {
        let dir = project(&[
            ("src/cart.js", "module.exports = {};"),
            ("src/cart.test.js", "test('x', () => {});"),
        ]);
        assert_eq!(detect_test_framework(dir.path()), Some(TestFramework::NodeTest));
    }

    #[test]
    fn test_no_tests_detected() {
        let dir = project(&[
            ("src/cart.js", "module.exports = {};"),
            ("node_modules/lib/test/index.js", ""),
        ]);
        assert_eq!(detect_test_framework(dir.path()), None);
        assert!(test_files(dir.path()).is_empty());
    }

    #[test]
    fn test_test_directory_files() {
        let dir = project(&[("__tests__/cart.js", ""), ("test/fixtures/data.json", "{}")]);
        let files = test_files(dir.path());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("__tests__/cart.js"));
    }
}
