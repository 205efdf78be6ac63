//! Predicates over a query's match result.
//!
//! Every content-based expectation, positive or negated, first requires at
//! least one match. A selector that matches nothing is always reported as
//! "does not exist", never as a content mismatch.

use std::fmt;

use serde::Serialize;

use crate::failure::{AssertionFailure, QueryError};
use crate::pattern;
use crate::query::{MatchResult, SelectorKind};

/// What a query's result is expected to satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "value", rename_all = "kebab-case")]
pub enum Expectation {
    Exists,
    NotExists,
    Count(usize),
    NotCount(usize),
    CountMin(usize),
    CountMax(usize),
    /// Some node's text equals the string exactly.
    ContentContains(String),
    NotContentContains(String),
    /// Some node's text contains a match for the pattern.
    ContentRegex(String),
    NotContentRegex(String),
}

impl Expectation {
    /// The expected value in printable form, if the mode carries one.
    pub fn expected_value(&self) -> Option<String> {
        match self {
            Self::Exists | Self::NotExists => None,
            Self::Count(n) | Self::NotCount(n) | Self::CountMin(n) | Self::CountMax(n) => {
                Some(n.to_string())
            }
            Self::ContentContains(s)
            | Self::NotContentContains(s)
            | Self::ContentRegex(s)
            | Self::NotContentRegex(s) => Some(s.clone()),
        }
    }

    fn needs_content(&self) -> bool {
        matches!(
            self,
            Self::ContentContains(_)
                | Self::NotContentContains(_)
                | Self::ContentRegex(_)
                | Self::NotContentRegex(_)
        )
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exists => f.write_str("exists"),
            Self::NotExists => f.write_str("does not exist"),
            Self::Count(n) => write!(f, "occurs exactly {n} times"),
            Self::NotCount(n) => write!(f, "does not occur exactly {n} times"),
            Self::CountMin(n) => write!(f, "occurs at least {n} times"),
            Self::CountMax(n) => write!(f, "occurs at most {n} times"),
            Self::ContentContains(s) => write!(f, "contains content {s:?}"),
            Self::NotContentContains(s) => write!(f, "does not contain content {s:?}"),
            Self::ContentRegex(p) => write!(f, "contains content matching {p:?}"),
            Self::NotContentRegex(p) => write!(f, "does not contain content matching {p:?}"),
        }
    }
}

/// What the query actually produced, as far as the failed predicate is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum Observed {
    /// No node matched.
    Missing,
    Count(usize),
    /// Text of every inspected node, in document order.
    Texts(Vec<String>),
    /// Text of the node that violated a negated content expectation.
    Offending(String),
}

/// A predicate that did not hold for a query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub kind: SelectorKind,
    pub path: String,
    pub expectation: Expectation,
    pub observed: Observed,
}

impl Mismatch {
    fn new(kind: SelectorKind, path: &str, expectation: &Expectation, observed: Observed) -> Self {
        Self {
            kind,
            path: path.to_string(),
            expectation: expectation.clone(),
            observed,
        }
    }

    fn diagnostic(&self) -> String {
        let path = &self.path;
        match (&self.expectation, &self.observed) {
            (_, Observed::Missing) => {
                format!("Failed asserting node DENOTED BY {path} EXISTS")
            }
            (Expectation::NotExists, _) => {
                format!("Failed asserting node DENOTED BY {path} DOES NOT EXIST")
            }
            (Expectation::Count(n), Observed::Count(actual)) => format!(
                "Failed asserting node DENOTED BY {path} OCCURS EXACTLY {n} times, actually occurs {actual} times"
            ),
            (Expectation::NotCount(n), _) => {
                format!("Failed asserting node DENOTED BY {path} DOES NOT OCCUR EXACTLY {n} times")
            }
            (Expectation::CountMin(n), Observed::Count(actual)) => format!(
                "Failed asserting node DENOTED BY {path} OCCURS AT LEAST {n} times, actually occurs {actual} times"
            ),
            (Expectation::CountMax(n), Observed::Count(actual)) => format!(
                "Failed asserting node DENOTED BY {path} OCCURS AT MOST {n} times, actually occurs {actual} times"
            ),
            (Expectation::ContentContains(s), Observed::Texts(texts)) => format!(
                "Failed asserting node denoted by {path} CONTAINS content \"{s}\", Contents: [{}]",
                texts.join(",")
            ),
            (Expectation::NotContentContains(s), _) => format!(
                "Failed asserting node DENOTED BY {path} DOES NOT CONTAIN content \"{s}\""
            ),
            (Expectation::ContentRegex(p), Observed::Texts(texts)) => format!(
                "Failed asserting node denoted by {path} CONTAINS content MATCHING \"{p}\", actual content is \"{}\"",
                texts.concat()
            ),
            (Expectation::NotContentRegex(p), _) => format!(
                "Failed asserting node DENOTED BY {path} DOES NOT CONTAIN content MATCHING \"{p}\""
            ),
            (expectation, observed) => {
                format!("Failed asserting node DENOTED BY {path} {expectation}, observed {observed:?}")
            }
        }
    }

    fn actual_value(&self) -> Option<String> {
        match &self.observed {
            Observed::Missing => Some("0".to_string()),
            Observed::Count(n) => Some(n.to_string()),
            Observed::Texts(texts) => Some(texts.join(",")),
            Observed::Offending(text) => Some(text.clone()),
        }
    }
}

impl From<Mismatch> for AssertionFailure {
    fn from(mismatch: Mismatch) -> Self {
        let mut failure = AssertionFailure::new(mismatch.path.clone(), mismatch.diagnostic());
        failure.expected = mismatch.expectation.expected_value();
        failure.actual = mismatch.actual_value();
        failure
    }
}

/// Outcome of checking one expectation against one result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssertionOutcome {
    Pass,
    Fail(Mismatch),
}

impl AssertionOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn into_result(self) -> Result<(), AssertionFailure> {
        match self {
            Self::Pass => Ok(()),
            Self::Fail(mismatch) => Err(mismatch.into()),
        }
    }
}

/// Judge `result` against `expectation`.
///
/// Errors only when a content pattern cannot be compiled. `kind` and `path`
/// are carried into the mismatch for reporting; they do not affect the
/// verdict.
pub fn evaluate(
    kind: SelectorKind,
    path: &str,
    result: &MatchResult,
    expectation: &Expectation,
) -> Result<AssertionOutcome, QueryError> {
    let count = result.count();
    let fail = |observed| Ok(AssertionOutcome::Fail(Mismatch::new(kind, path, expectation, observed)));

    if expectation.needs_content() && count == 0 {
        return fail(Observed::Missing);
    }

    match expectation {
        Expectation::Exists if count == 0 => fail(Observed::Missing),
        Expectation::NotExists if count != 0 => fail(Observed::Count(count)),
        Expectation::Count(n) if count != *n => fail(Observed::Count(count)),
        Expectation::NotCount(n) if count == *n => fail(Observed::Count(count)),
        Expectation::CountMin(n) if count < *n => fail(Observed::Count(count)),
        Expectation::CountMax(n) if count > *n => fail(Observed::Count(count)),
        Expectation::ContentContains(expected) => {
            if result.texts().any(|text| text == expected) {
                Ok(AssertionOutcome::Pass)
            } else {
                fail(Observed::Texts(owned_texts(result)))
            }
        }
        Expectation::NotContentContains(unexpected) => {
            match result.texts().find(|text| text == unexpected) {
                Some(text) => fail(Observed::Offending(text.to_string())),
                None => Ok(AssertionOutcome::Pass),
            }
        }
        Expectation::ContentRegex(source) => {
            let regex = pattern::compile(source)?;
            if result.texts().any(|text| regex.is_match(text)) {
                Ok(AssertionOutcome::Pass)
            } else {
                fail(Observed::Texts(owned_texts(result)))
            }
        }
        Expectation::NotContentRegex(source) => {
            let regex = pattern::compile(source)?;
            match result.texts().find(|text| regex.is_match(text)) {
                Some(text) => fail(Observed::Offending(text.to_string())),
                None => Ok(AssertionOutcome::Pass),
            }
        }
        _ => Ok(AssertionOutcome::Pass),
    }
}

fn owned_texts(result: &MatchResult) -> Vec<String> {
    result.texts().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(texts: &[&str]) -> MatchResult {
        texts.iter().map(|t| t.to_string()).collect()
    }

    fn check(texts: &[&str], expectation: Expectation) -> AssertionOutcome {
        evaluate(SelectorKind::Css, "li", &result(texts), &expectation).unwrap()
    }

    fn diagnostic(texts: &[&str], expectation: Expectation) -> String {
        check(texts, expectation).into_result().unwrap_err().diagnostic
    }

    #[test]
    fn exists_and_not_exists() {
        assert!(check(&["a"], Expectation::Exists).is_pass());
        assert!(!check(&[], Expectation::Exists).is_pass());
        assert!(check(&[], Expectation::NotExists).is_pass());
        assert_eq!(
            diagnostic(&["a"], Expectation::NotExists),
            "Failed asserting node DENOTED BY li DOES NOT EXIST"
        );
    }

    #[test]
    fn count_equals_only_exact_count() {
        for m in 0..5 {
            let outcome = check(&["a", "b"], Expectation::Count(m));
            assert_eq!(outcome.is_pass(), m == 2, "count {m}");
        }
    }

    #[test]
    fn count_mismatch_reports_expected_and_actual() {
        let failure = check(&["a", "b"], Expectation::Count(3)).into_result().unwrap_err();
        assert_eq!(
            failure.diagnostic,
            "Failed asserting node DENOTED BY li OCCURS EXACTLY 3 times, actually occurs 2 times"
        );
        assert_eq!(failure.expected.as_deref(), Some("3"));
        assert_eq!(failure.actual.as_deref(), Some("2"));
    }

    #[test]
    fn not_count() {
        assert!(check(&["a", "b"], Expectation::NotCount(3)).is_pass());
        assert_eq!(
            diagnostic(&["a", "b"], Expectation::NotCount(2)),
            "Failed asserting node DENOTED BY li DOES NOT OCCUR EXACTLY 2 times"
        );
    }

    #[test]
    fn count_bounds_are_monotonic() {
        let texts = ["a", "b", "c"];
        for n in 0..=3 {
            assert!(check(&texts, Expectation::CountMin(n)).is_pass(), "min {n}");
        }
        for n in 4..8 {
            assert!(!check(&texts, Expectation::CountMin(n)).is_pass(), "min {n}");
        }
        for n in 3..8 {
            assert!(check(&texts, Expectation::CountMax(n)).is_pass(), "max {n}");
        }
        for n in 0..3 {
            assert!(!check(&texts, Expectation::CountMax(n)).is_pass(), "max {n}");
        }
        assert_eq!(
            diagnostic(&texts, Expectation::CountMax(1)),
            "Failed asserting node DENOTED BY li OCCURS AT MOST 1 times, actually occurs 3 times"
        );
    }

    #[test]
    fn content_modes_require_existence_first() {
        let modes = [
            Expectation::ContentContains("x".into()),
            Expectation::NotContentContains("x".into()),
            Expectation::ContentRegex("x".into()),
            Expectation::NotContentRegex("x".into()),
        ];
        for mode in modes {
            assert_eq!(
                diagnostic(&[], mode),
                "Failed asserting node DENOTED BY li EXISTS"
            );
        }
    }

    #[test]
    fn content_contains_is_exact_equality() {
        assert!(!check(&["foobar"], Expectation::ContentContains("foo".into())).is_pass());
        assert!(check(&["x", "foo"], Expectation::ContentContains("foo".into())).is_pass());
        assert_eq!(
            diagnostic(&["foobar", "baz"], Expectation::ContentContains("foo".into())),
            "Failed asserting node denoted by li CONTAINS content \"foo\", Contents: [foobar,baz]"
        );
    }

    #[test]
    fn not_content_contains_checks_every_node() {
        assert!(check(&["foobar"], Expectation::NotContentContains("foo".into())).is_pass());
        let failure = check(&["a", "foo", "foo"], Expectation::NotContentContains("foo".into()))
            .into_result()
            .unwrap_err();
        assert_eq!(
            failure.diagnostic,
            "Failed asserting node DENOTED BY li DOES NOT CONTAIN content \"foo\""
        );
        assert_eq!(failure.actual.as_deref(), Some("foo"));
    }

    #[test]
    fn content_regex_is_a_search() {
        assert!(check(&["foobar"], Expectation::ContentRegex("ba.".into())).is_pass());
        assert!(check(&["nope", "foobar"], Expectation::ContentRegex("/^FOO/i".into())).is_pass());
        assert_eq!(
            diagnostic(&["ab", "cd"], Expectation::ContentRegex("z".into())),
            "Failed asserting node denoted by li CONTAINS content MATCHING \"z\", actual content is \"abcd\""
        );
    }

    #[test]
    fn not_content_regex_checks_every_node() {
        assert!(check(&["abc", "def"], Expectation::NotContentRegex("z".into())).is_pass());
        assert!(!check(&["abc", "xyz"], Expectation::NotContentRegex("z".into())).is_pass());
    }

    #[test]
    fn invalid_content_pattern_is_an_error() {
        let err = evaluate(
            SelectorKind::XPath,
            "//li",
            &result(&["a"]),
            &Expectation::ContentRegex("(".into()),
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::InvalidPattern { .. }));
    }

    #[test]
    fn selector_kind_does_not_change_verdict() {
        let matched = result(&["a", "b"]);
        for expectation in [Expectation::Count(2), Expectation::CountMin(3), Expectation::Exists] {
            let css = evaluate(SelectorKind::Css, "p", &matched, &expectation).unwrap();
            let xpath = evaluate(SelectorKind::XPath, "p", &matched, &expectation).unwrap();
            assert_eq!(css.is_pass(), xpath.is_pass());
        }
    }
}
