//! Turning runner output into counts.
//!
//! Jest and Vitest share a JSON report shape; Mocha has its own. Anything
//! else (node's TAP reporter, custom commands) is read with a handful of
//! line patterns that cover the common summary formats.

use super::{TestFailureDetail, TestResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JestReport {
    num_passed_tests: usize,
    num_failed_tests: usize,
    #[serde(default)]
    test_results: Vec<JestFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JestFile {
    #[serde(default)]
    assertion_results: Vec<JestAssertion>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JestAssertion {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    status: String,
    #[serde(default)]
    failure_messages: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MochaReport {
    stats: MochaStats,
    #[serde(default)]
    failures: Vec<MochaFailure>,
}

#[derive(Debug, Deserialize)]
struct MochaStats {
    passes: usize,
    failures: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MochaFailure {
    #[serde(default)]
    full_title: Option<String>,
    #[serde(default)]
    err: Option<MochaError>,
}

#[derive(Debug, Deserialize)]
struct MochaError {
    #[serde(default)]
    message: Option<String>,
}

/// The outermost `{ ... }` in `text`; runners often print banners around it.
fn json_payload(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or_default().trim().to_string()
}

pub fn parse_jest_json(text: &str, duration: Duration) -> Option<TestResult> {
    let report: JestReport = serde_json::from_str(json_payload(text)?).ok()?;
    let mut errors: Vec<TestFailureDetail> = report
        .test_results
        .iter()
        .flat_map(|file| file.assertion_results.iter())
        .filter(|a| a.status == "failed")
        .map(|a| TestFailureDetail {
            name: a
                .full_name
                .clone()
                .or_else(|| a.title.clone())
                .unwrap_or_else(|| "unnamed test".to_string()),
            message: a
                .failure_messages
                .first()
                .map(|m| first_line(m))
                .unwrap_or_default(),
        })
        .collect();
    // Suites that fail to load report no assertions, only a message.
    errors.extend(
        report
            .test_results
            .iter()
            .filter(|f| f.assertion_results.is_empty() && f.status.as_deref() == Some("failed"))
            .map(|f| TestFailureDetail {
                name: f.name.clone().unwrap_or_else(|| "test suite".to_string()),
                message: f.message.as_deref().map(first_line).unwrap_or_default(),
            }),
    );
    Some(TestResult {
        passed: report.num_passed_tests,
        failed: report.num_failed_tests,
        errors,
        duration,
    })
}

pub fn parse_mocha_json(text: &str, duration: Duration) -> Option<TestResult> {
    let report: MochaReport = serde_json::from_str(json_payload(text)?).ok()?;
    let errors = report
        .failures
        .into_iter()
        .map(|f| TestFailureDetail {
            name: f.full_title.unwrap_or_else(|| "unnamed test".to_string()),
            message: f
                .err
                .and_then(|e| e.message)
                .map(|m| first_line(&m))
                .unwrap_or_default(),
        })
        .collect();
    Some(TestResult {
        passed: report.stats.passes,
        failed: report.stats.failures,
        errors,
        duration,
    })
}

static TAP_PASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#\s*pass\s+(\d+)").expect("valid regex"));
static TAP_FAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#\s*fail\s+(\d+)").expect("valid regex"));
static SUMMARY_PASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d+)\s+(?:passing|passed)\b").expect("valid regex"));
static SUMMARY_FAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d+)\s+(?:failing|failed)\b").expect("valid regex"));
static TAP_NOT_OK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*not ok\s+\d+\s*-?\s*(.*)$").expect("valid regex"));

fn last_count(re: &Regex, text: &str) -> Option<usize> {
    re.captures_iter(text)
        .last()
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Summary counts from TAP or plain-text output. `None` when no count is
/// found at all.
pub fn parse_text(text: &str, duration: Duration) -> Option<TestResult> {
    let passed = last_count(&TAP_PASS, text).or_else(|| last_count(&SUMMARY_PASS, text));
    let failed = last_count(&TAP_FAIL, text).or_else(|| last_count(&SUMMARY_FAIL, text));
    if passed.is_none() && failed.is_none() {
        return None;
    }
    let errors = TAP_NOT_OK
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|name| !name.is_empty() && !name.contains("# SKIP") && !name.contains("# TODO"))
        .map(|name| TestFailureDetail {
            name: name.to_string(),
            message: String::new(),
        })
        .collect();
    Some(TestResult {
        passed: passed.unwrap_or(0),
        failed: failed.unwrap_or(0),
        errors,
        duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_jest_report_with_banner() {
        let text = indoc! {r#"
            > project@1.0.0 test
            {"numPassedTests": 3, "numFailedTests": 1, "testResults": [
              {"assertionResults": [
                {"fullName": "cart totals", "status": "passed", "failureMessages": []},
                {"fullName": "cart rejects empty", "status": "failed",
                 "failureMessages": ["Error: expected true\n    at cart.test.js:4"]}
              ]}
            ]}
        "#};
        let result = parse_jest_json(text, Duration::ZERO).unwrap();
        assert_eq!((result.passed, result.failed), (3, 1));
        assert_eq!(
            result.errors,
            vec![TestFailureDetail {
                name: "cart rejects empty".to_string(),
                message: "Error: expected true".to_string(),
            }]
        );
    }

    #[test]
    fn test_jest_suite_load_failure() {
        let text = r#"{"numPassedTests": 0, "numFailedTests": 0, "testResults": [
            {"name": "/p/cart.test.js", "status": "failed", "message": "SyntaxError: bad", "assertionResults": []}
        ]}"#;
        let result = parse_jest_json(text, Duration::ZERO).unwrap();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].message, "SyntaxError: bad");
    }

    #[test]
    fn test_mocha_report() {
        let text = r#"{"stats": {"passes": 5, "failures": 1},
            "failures": [{"fullTitle": "order total", "err": {"message": "expected 3 to equal 4"}}]}"#;
        let result = parse_mocha_json(text, Duration::ZERO).unwrap();
        assert_eq!((result.passed, result.failed), (5, 1));
        assert_eq!(result.errors[0].name, "order total");
    }

    #[test]
    fn test_tap_output() {
        let text = indoc! {"
            TAP version 13
            ok 1 - adds
            not ok 2 - subtracts
            ok 3 - skipped # SKIP
            1..3
            # tests 3
            # pass 2
            # fail 1
        "};
        let result = parse_text(text, Duration::ZERO).unwrap();
        assert_eq!((result.passed, result.failed), (2, 1));
        assert_eq!(result.errors[0].name, "subtracts");
    }

    #[test]
    fn test_plain_summary() {
        let result = parse_text("  12 passing (40ms)\n  2 failing\n", Duration::ZERO).unwrap();
        assert_eq!((result.passed, result.failed), (12, 2));
    }

    #[test]
    fn test_unrecognized_output() {
        assert!(parse_text("Segmentation fault", Duration::ZERO).is_none());
        assert!(parse_jest_json("no json here", Duration::ZERO).is_none());
    }
}
