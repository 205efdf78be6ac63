use std::collections::BTreeMap;
use std::fmt;

use scraper::{Html, Selector};
use serde::Serialize;
use tracing::debug;

use crate::failure::QueryError;
use crate::xpath;

/// Prefix → namespace URI bindings, consulted by XPath queries only.
pub type Namespaces = BTreeMap<String, String>;

/// Which query language a path is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    Css,
    XPath,
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css => f.write_str("css"),
            Self::XPath => f.write_str("xpath"),
        }
    }
}

/// The input to a single query: the response body plus the namespace
/// bindings registered at the time of the call.
#[derive(Debug, Clone, Copy)]
pub struct QueryTarget<'a> {
    pub document: &'a str,
    pub namespaces: &'a Namespaces,
}

impl<'a> QueryTarget<'a> {
    pub fn new(document: &'a str, namespaces: &'a Namespaces) -> Self {
        Self {
            document,
            namespaces,
        }
    }
}

/// A matched node, reduced to its text value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedNode {
    pub text: String,
}

/// Matched nodes in document order. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub nodes: Vec<MatchedNode>,
}

impl MatchResult {
    pub fn count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.text.as_str())
    }
}

impl FromIterator<String> for MatchResult {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().map(|text| MatchedNode { text }).collect(),
        }
    }
}

/// Run `path` against the target document.
///
/// CSS selectors are resolved against an HTML5 parse and never see namespace
/// bindings. XPath expressions use the bindings carried by the target.
pub fn execute(
    target: QueryTarget<'_>,
    kind: SelectorKind,
    path: &str,
) -> Result<MatchResult, QueryError> {
    let result = match kind {
        SelectorKind::Css => css(target.document, path)?,
        SelectorKind::XPath => xpath::evaluate(target.document, path, target.namespaces)?,
    };
    debug!(
        kind = %kind,
        path = %path,
        matches = result.count(),
        doc_len = target.document.len(),
        "query executed"
    );
    Ok(result)
}

fn css(document: &str, selector: &str) -> Result<MatchResult, QueryError> {
    let parsed = Selector::parse(selector).map_err(|e| QueryError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })?;
    let html = Html::parse_document(document);
    Ok(html
        .select(&parsed)
        .map(|el| el.text().collect::<String>())
        .collect())
}
