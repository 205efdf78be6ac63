use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Errors raised while executing a query, independent of any assertion outcome.
///
/// These are never turned into a pass or a fail: a selector that cannot be
/// parsed is a bug in the test, not an observation about the response.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid CSS selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("invalid XPath expression {path:?}: {reason}")]
    InvalidXPath { path: String, reason: String },

    #[error("response body is not well-formed XML: {0}")]
    MalformedDocument(String),

    #[error("XPath expression {path:?} evaluated to a {found}, not a node-set")]
    NotANodeSet { path: String, found: &'static str },

    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A failed assertion: the expected condition did not hold.
///
/// `diagnostic` is the human-readable description; the remaining fields carry
/// the same facts in structured form for reporters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionFailure {
    /// What was inspected: a selector, a header name, `Location`, `module`, ...
    pub subject: String,
    pub diagnostic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    /// Caller-supplied message printed above the diagnostic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AssertionFailure {
    pub fn new(subject: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            diagnostic: diagnostic.into(),
            expected: None,
            actual: None,
            message: None,
        }
    }

    pub fn expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }

    /// Attach a custom message. Empty messages are ignored.
    pub fn with_message(mut self, message: Option<&str>) -> Self {
        if let Some(message) = message.filter(|m| !m.is_empty()) {
            self.message = Some(message.to_string());
        }
        self
    }
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{message}\n{}", self.diagnostic),
            None => f.write_str(&self.diagnostic),
        }
    }
}

impl std::error::Error for AssertionFailure {}

/// Result of running one assertion: either it failed, or the query behind it
/// could not be executed at all.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Failed(#[from] AssertionFailure),

    #[error(transparent)]
    Query(#[from] QueryError),
}

impl CheckError {
    pub fn with_message(self, message: Option<&str>) -> Self {
        match self {
            Self::Failed(failure) => Self::Failed(failure.with_message(message)),
            other => other,
        }
    }

    /// The assertion failure, if this was one.
    pub fn failure(&self) -> Option<&AssertionFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            Self::Query(_) => None,
        }
    }
}
