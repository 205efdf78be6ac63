//! Checks over response headers, the redirect location and the status line.

use axum::http::header::LOCATION;

use crate::failure::{AssertionFailure, CheckError};
use crate::pattern;
use crate::response::{HeaderValues, TestResponse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderCheck {
    Present(String),
    Absent(String),
    /// Some value of the header equals the string exactly.
    Contains { name: String, value: String },
    NotContains { name: String, value: String },
    Regex { name: String, pattern: String },
    NotRegex { name: String, pattern: String },
}

impl HeaderCheck {
    pub fn evaluate(&self, response: &TestResponse) -> Result<(), CheckError> {
        match self {
            Self::Present(name) => match response.header(name) {
                Some(_) => Ok(()),
                None => Err(AssertionFailure::new(
                    name.as_str(),
                    format!("Failed asserting response header \"{name}\" found"),
                )
                .into()),
            },
            Self::Absent(name) => match response.header(name) {
                None => Ok(()),
                Some(values) => Err(AssertionFailure::new(
                    name.as_str(),
                    format!("Failed asserting response header \"{name}\" WAS NOT found"),
                )
                .actual(values.first())
                .into()),
            },
            Self::Contains { name, value } => {
                let values = existing(response, name)?;
                if values.iter().any(|v| v == value) {
                    return Ok(());
                }
                Err(AssertionFailure::new(
                    name.as_str(),
                    format!(
                        "Failed asserting response header \"{name}\" exists and contains \"{value}\", actual content is \"{}\"",
                        values.last()
                    ),
                )
                .expected(value.as_str())
                .actual(values.last())
                .into())
            }
            Self::NotContains { name, value } => {
                let values = existing(response, name)?;
                if values.iter().any(|v| v == value) {
                    return Err(AssertionFailure::new(
                        name.as_str(),
                        format!("Failed asserting response header \"{name}\" DOES NOT CONTAIN \"{value}\""),
                    )
                    .expected(value.as_str())
                    .actual(value.as_str())
                    .into());
                }
                Ok(())
            }
            Self::Regex { name, pattern } => {
                let values = existing(response, name)?;
                let regex = pattern::compile(pattern)?;
                if values.iter().any(|v| regex.is_match(v)) {
                    return Ok(());
                }
                Err(AssertionFailure::new(
                    name.as_str(),
                    format!(
                        "Failed asserting response header \"{name}\" exists and matches regex \"{pattern}\", actual content is \"{}\"",
                        values.last()
                    ),
                )
                .expected(pattern.as_str())
                .actual(values.last())
                .into())
            }
            Self::NotRegex { name, pattern } => {
                let values = existing(response, name)?;
                let regex = pattern::compile(pattern)?;
                let found = values.iter().find(|v| regex.is_match(v)).map(str::to_string);
                match found {
                    Some(matched) => Err(AssertionFailure::new(
                        name.as_str(),
                        format!("Failed asserting response header \"{name}\" DOES NOT MATCH regex \"{pattern}\""),
                    )
                    .expected(pattern.as_str())
                    .actual(matched)
                    .into()),
                    None => Ok(()),
                }
            }
        }
    }
}

/// Content checks need the header to exist before its values mean anything.
fn existing(response: &TestResponse, name: &str) -> Result<HeaderValues, AssertionFailure> {
    response.header(name).ok_or_else(|| {
        AssertionFailure::new(
            name,
            format!("Failed asserting response header, header \"{name}\" doesn't exist"),
        )
    })
}

/// Checks on the `Location` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectCheck {
    Redirect,
    NotRedirect,
    To(String),
    NotTo(String),
    Regex(String),
    NotRegex(String),
}

impl RedirectCheck {
    pub fn evaluate(&self, response: &TestResponse) -> Result<(), CheckError> {
        let location = response.header(LOCATION.as_str());
        let subject = "Location";

        if let Self::NotRedirect = self {
            return match location {
                None => Ok(()),
                Some(values) => Err(AssertionFailure::new(
                    subject,
                    format!(
                        "Failed asserting response is NOT a redirect, actual redirection is \"{}\"",
                        values.first()
                    ),
                )
                .actual(values.first())
                .into()),
            };
        }

        let Some(values) = location else {
            return Err(
                AssertionFailure::new(subject, "Failed asserting response is a redirect").into(),
            );
        };
        let actual = values.first();

        match self {
            Self::Redirect | Self::NotRedirect => Ok(()),
            Self::To(url) if url != actual => Err(AssertionFailure::new(
                subject,
                format!("Failed asserting response redirects to \"{url}\", actual redirection is \"{actual}\""),
            )
            .expected(url.as_str())
            .actual(actual)
            .into()),
            Self::NotTo(url) if url == actual => Err(AssertionFailure::new(
                subject,
                format!("Failed asserting response redirects to \"{url}\""),
            )
            .expected(url.as_str())
            .actual(actual)
            .into()),
            Self::Regex(pattern) if !pattern::is_match(pattern, actual)? => Err(AssertionFailure::new(
                subject,
                format!("Failed asserting response redirects to URL MATCHING \"{pattern}\", actual redirection is \"{actual}\""),
            )
            .expected(pattern.as_str())
            .actual(actual)
            .into()),
            Self::NotRegex(pattern) if pattern::is_match(pattern, actual)? => Err(AssertionFailure::new(
                subject,
                format!("Failed asserting response DOES NOT redirect to URL MATCHING \"{pattern}\""),
            )
            .expected(pattern.as_str())
            .actual(actual)
            .into()),
            _ => Ok(()),
        }
    }
}

/// Checks on the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusCheck {
    Code(u16),
    NotCode(u16),
    ReasonPhrase(String),
}

impl StatusCheck {
    pub fn evaluate(&self, response: &TestResponse) -> Result<(), AssertionFailure> {
        let actual = response.status().as_u16();
        match self {
            Self::Code(code) if *code != actual => Err(AssertionFailure::new(
                "status",
                format!("Failed asserting response code \"{code}\", actual status code is \"{actual}\""),
            )
            .expected(code.to_string())
            .actual(actual.to_string())),
            Self::NotCode(code) if *code == actual => Err(AssertionFailure::new(
                "status",
                format!("Failed asserting response code was NOT \"{code}\""),
            )
            .expected(code.to_string())
            .actual(actual.to_string())),
            Self::ReasonPhrase(phrase) if phrase != response.reason_phrase() => {
                let actual = response.reason_phrase();
                Err(AssertionFailure::new(
                    "reason-phrase",
                    format!("Failed asserting response reason phrase \"{phrase}\", actual reason phrase is \"{actual}\""),
                )
                .expected(phrase.as_str())
                .actual(actual))
            }
            _ => Ok(()),
        }
    }
}
