use serde::Serialize;

use crate::expect::Expectation;
use crate::failure::AssertionFailure;
use crate::query::{MatchResult, SelectorKind};

/// Outcome of one command-line check, as printed by the `check` subcommand.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub kind: SelectorKind,
    pub path: String,
    pub expectation: Expectation,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<AssertionFailure>,
}

impl CheckReport {
    pub fn new(
        kind: SelectorKind,
        path: &str,
        expectation: &Expectation,
        outcome: Result<(), AssertionFailure>,
    ) -> Self {
        let failure = outcome.err();
        Self {
            kind,
            path: path.to_string(),
            expectation: expectation.clone(),
            passed: failure.is_none(),
            failure,
        }
    }
}

/// Render a query result as one line per matched node.
///
/// Example output:
/// ```text
/// css li: 2 matches
/// [1] "Home"
/// [2] "About"
/// ```
pub fn matches_to_text(kind: SelectorKind, path: &str, result: &MatchResult) -> String {
    let mut output = format!("{kind} {path}: {} {}\n", result.count(), plural(result.count()));
    for (i, text) in result.texts().enumerate() {
        output.push_str(&format!("[{}] {:?}\n", i + 1, text.trim()));
    }
    output
}

/// Render a check outcome: `ok` plus the expectation, or the failure diagnostic.
pub fn check_to_text(report: &CheckReport) -> String {
    match &report.failure {
        None => format!("ok: {} {} {}\n", report.kind, report.path, report.expectation),
        Some(failure) => {
            let mut output = format!("FAILED: {failure}\n");
            if let Some(expected) = &failure.expected {
                output.push_str(&format!("  expected: {expected}\n"));
            }
            if let Some(actual) = &failure.actual {
                output.push_str(&format!("  actual: {actual}\n"));
            }
            output
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        "match"
    } else {
        "matches"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_lists_matches_in_order() {
        let result: MatchResult = ["Home".to_string(), " About ".to_string()]
            .into_iter()
            .collect();
        let text = matches_to_text(SelectorKind::Css, "li", &result);
        assert_eq!(text, "css li: 2 matches\n[1] \"Home\"\n[2] \"About\"\n");
    }

    #[test]
    fn single_match_is_singular() {
        let result: MatchResult = std::iter::once("x".to_string()).collect();
        assert!(matches_to_text(SelectorKind::XPath, "//p", &result).starts_with("xpath //p: 1 match\n"));
    }

    #[test]
    fn passing_check_prints_expectation() {
        let report = CheckReport::new(SelectorKind::Css, "li", &Expectation::Count(2), Ok(()));
        assert_eq!(check_to_text(&report), "ok: css li occurs exactly 2 times\n");
    }

    #[test]
    fn failing_check_prints_diagnostic_and_values() {
        let failure = AssertionFailure::new("li", "boom").expected("3").actual("2");
        let report = CheckReport::new(
            SelectorKind::Css,
            "li",
            &Expectation::Count(3),
            Err(failure),
        );
        assert_eq!(
            check_to_text(&report),
            "FAILED: boom\n  expected: 3\n  actual: 2\n"
        );
    }

    #[test]
    fn json_omits_failure_when_passed() {
        let report = CheckReport::new(SelectorKind::Css, "li", &Expectation::Exists, Ok(()));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["passed"], true);
        assert_eq!(json["kind"], "css");
        assert_eq!(json["expectation"]["mode"], "exists");
        assert!(json.get("failure").is_none());
    }
}
