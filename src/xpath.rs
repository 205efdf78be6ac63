//! XPath evaluation over response bodies.
//!
//! XML bodies are parsed as namespace-aware XML, so their elements live in
//! whatever namespace the document declares and must be addressed through
//! registered prefixes. HTML and XHTML pages go through the lenient HTML5
//! parser and are rebuilt as a namespace-free tree, so `//li` works the way it
//! does in a browser console and entities like `&nbsp;` resolve.

use std::borrow::Cow;

use scraper::{ElementRef, Html};
use sxd_document::dom::{Document, Element};
use sxd_document::{parser, Package};
use sxd_xpath::{Context, Factory, Value};
use tracing::debug;

use crate::failure::QueryError;
use crate::query::{MatchResult, Namespaces};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    Html,
    Xhtml,
    Xml,
}

/// Classify a response body by its prologue.
pub fn detect(document: &str) -> DocumentType {
    if document.contains("DTD XHTML") {
        DocumentType::Xhtml
    } else if document.trim_start().starts_with("<?xml") {
        DocumentType::Xml
    } else {
        DocumentType::Html
    }
}

pub fn evaluate(
    body: &str,
    path: &str,
    namespaces: &Namespaces,
) -> Result<MatchResult, QueryError> {
    let doc_type = detect(body);
    let package = match doc_type {
        DocumentType::Html | DocumentType::Xhtml => from_html(body),
        DocumentType::Xml => parser::parse(&strip_doctype(body))
            .map_err(|err| QueryError::MalformedDocument(format!("{err:?}")))?,
    };
    let document = package.as_document();

    let xpath = Factory::new()
        .build(path)
        .map_err(|err| QueryError::InvalidXPath {
            path: path.to_string(),
            reason: err.to_string(),
        })?
        .ok_or_else(|| QueryError::InvalidXPath {
            path: path.to_string(),
            reason: "empty expression".to_string(),
        })?;

    let mut context = Context::new();
    for (prefix, uri) in namespaces {
        context.set_namespace(prefix, uri);
    }

    let value = xpath
        .evaluate(&context, document.root())
        .map_err(|err| QueryError::InvalidXPath {
            path: path.to_string(),
            reason: err.to_string(),
        })?;

    debug!(doc_type = ?doc_type, namespaces = namespaces.len(), "xpath evaluated");

    match value {
        Value::Nodeset(nodes) => Ok(nodes
            .document_order()
            .into_iter()
            .map(|node| node.string_value())
            .collect()),
        Value::Boolean(_) => Err(not_a_nodeset(path, "boolean")),
        Value::Number(_) => Err(not_a_nodeset(path, "number")),
        Value::String(_) => Err(not_a_nodeset(path, "string")),
    }
}

fn not_a_nodeset(path: &str, found: &'static str) -> QueryError {
    QueryError::NotANodeSet {
        path: path.to_string(),
        found,
    }
}

/// Remove a `<!DOCTYPE ...>` declaration, internal subset included. The XML
/// parser rejects them and queries never need them.
fn strip_doctype(source: &str) -> Cow<'_, str> {
    let Some(start) = source.find("<!DOCTYPE") else {
        return Cow::Borrowed(source);
    };
    let rest = &source[start..];
    let subset_end = match (rest.find('['), rest.find('>')) {
        (Some(open), Some(close)) if open < close => {
            rest[open..].find(']').map_or(open, |i| open + i)
        }
        _ => 0,
    };
    match rest[subset_end..].find('>') {
        Some(close) => {
            let end = start + subset_end + close + 1;
            Cow::Owned(format!("{}{}", &source[..start], &source[end..]))
        }
        None => Cow::Borrowed(source),
    }
}

/// Rebuild an HTML5 parse tree as an XPath-queryable document.
fn from_html(source: &str) -> Package {
    let html = Html::parse_document(source);
    let package = Package::new();
    {
        let document = package.as_document();
        let root = document.root();
        for child in html.tree.root().children() {
            if let Some(element) = ElementRef::wrap(child) {
                root.append_child(copy_element(&document, element));
            } else if let Some(comment) = child.value().as_comment() {
                root.append_child(document.create_comment(comment));
            }
        }
    }
    package
}

fn copy_element<'d>(document: &Document<'d>, source: ElementRef<'_>) -> Element<'d> {
    let element = document.create_element(source.value().name());
    for (name, value) in source.value().attrs() {
        element.set_attribute_value(name, value);
    }
    for child in source.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            element.append_child(copy_element(document, child_element));
        } else if let Some(text) = child.value().as_text() {
            element.append_child(document.create_text(text));
        } else if let Some(comment) = child.value().as_comment() {
            element.append_child(document.create_comment(comment));
        }
    }
    element
}
