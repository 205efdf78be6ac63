//! Functional-test scaffold: dispatch requests against an application and
//! assert on what came back.
//!
//! Every `assert_*` method records one performed assertion with the case's
//! reporter and panics with the diagnostic when the expectation does not
//! hold. `check` is the non-panicking core they share.
//!
//! Any catalog method can carry a custom message shown above the diagnostic:
//!
//! ```ignore
//! case.on_failure("the menu lists every section")
//!     .assert_query_count("ul#menu li", 4);
//! ```

use std::cell::Cell;
use std::rc::Rc;

use anyhow::Result;
use tracing::{debug, info};

use crate::app::{Application, DispatchInfo};
use crate::expect::{self, Expectation};
use crate::failure::CheckError;
use crate::headers::{HeaderCheck, RedirectCheck, StatusCheck};
use crate::query::{self, Namespaces, QueryTarget, SelectorKind};
use crate::response::{TestRequest, TestResponse};
use crate::routing::{DispatchCheck, RedirectRouteCheck};

/// Receives one event per performed assertion, pass or fail.
pub trait AssertionReporter {
    fn assertion_performed(&self);
}

/// Counts performed assertions. Clones share the count.
#[derive(Debug, Clone, Default)]
pub struct AssertionCounter(Rc<Cell<usize>>);

impl AssertionCounter {
    pub fn count(&self) -> usize {
        self.0.get()
    }
}

impl AssertionReporter for AssertionCounter {
    fn assertion_performed(&self) {
        self.0.set(self.0.get() + 1);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Query {
        kind: SelectorKind,
        path: String,
        expectation: Expectation,
    },
    Header(HeaderCheck),
    Redirect(RedirectCheck),
    RedirectRoute(RedirectRouteCheck),
    Status(StatusCheck),
    Dispatch(DispatchCheck),
}

/// One assertion, optionally carrying a message printed above its diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    pub check: Check,
    pub message: Option<String>,
}

impl Assertion {
    pub fn new(check: Check) -> Self {
        Self {
            check,
            message: None,
        }
    }

    pub fn css(path: impl Into<String>, expectation: Expectation) -> Self {
        Self::query(SelectorKind::Css, path, expectation)
    }

    pub fn xpath(path: impl Into<String>, expectation: Expectation) -> Self {
        Self::query(SelectorKind::XPath, path, expectation)
    }

    pub fn query(kind: SelectorKind, path: impl Into<String>, expectation: Expectation) -> Self {
        Self::new(Check::Query {
            kind,
            path: path.into(),
            expectation,
        })
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl From<HeaderCheck> for Assertion {
    fn from(check: HeaderCheck) -> Self {
        Self::new(Check::Header(check))
    }
}

impl From<RedirectCheck> for Assertion {
    fn from(check: RedirectCheck) -> Self {
        Self::new(Check::Redirect(check))
    }
}

impl From<RedirectRouteCheck> for Assertion {
    fn from(check: RedirectRouteCheck) -> Self {
        Self::new(Check::RedirectRoute(check))
    }
}

impl From<StatusCheck> for Assertion {
    fn from(check: StatusCheck) -> Self {
        Self::new(Check::Status(check))
    }
}

impl From<DispatchCheck> for Assertion {
    fn from(check: DispatchCheck) -> Self {
        Self::new(Check::Dispatch(check))
    }
}

pub struct HttpControllerTestCase<A: Application> {
    application: A,
    request: Option<TestRequest>,
    response: Option<TestResponse>,
    xpath_namespaces: Namespaces,
    reporter: Box<dyn AssertionReporter>,
    failure_message: Option<String>,
}

impl<A: Application> HttpControllerTestCase<A> {
    pub fn new(application: A) -> Self {
        Self {
            application,
            request: None,
            response: None,
            xpath_namespaces: Namespaces::new(),
            reporter: Box::new(AssertionCounter::default()),
            failure_message: None,
        }
    }

    pub fn with_reporter(mut self, reporter: impl AssertionReporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    pub fn application(&self) -> &A {
        &self.application
    }

    pub fn application_mut(&mut self) -> &mut A {
        &mut self.application
    }

    /// The request for the next dispatch, created blank on first access.
    pub fn request(&mut self) -> &mut TestRequest {
        self.request.get_or_insert_with(TestRequest::default)
    }

    /// The current response, created blank on first access.
    pub fn response(&mut self) -> &mut TestResponse {
        self.response.get_or_insert_with(TestResponse::default)
    }

    pub fn last_dispatch(&self) -> &DispatchInfo {
        self.application.last_dispatch()
    }

    /// Set the request URI to `url` and dispatch the current request.
    pub fn dispatch(&mut self, url: &str) -> Result<&mut TestResponse> {
        self.request().set_uri(url);
        self.dispatch_request()
    }

    /// Dispatch the current request as configured.
    pub fn dispatch_request(&mut self) -> Result<&mut TestResponse> {
        let request = self.request.get_or_insert_with(TestRequest::default);
        let response = self.application.dispatch(request)?;
        info!(status = %response.status(), "request dispatched");
        Ok(self.response.insert(response))
    }

    /// Drop the current request; the next access creates a blank one.
    pub fn reset_request(&mut self) -> &mut Self {
        self.request = None;
        self
    }

    pub fn reset_response(&mut self) -> &mut Self {
        self.response = None;
        self
    }

    /// Forget request, response and dispatch metadata, e.g. between two
    /// trips to the application within one test.
    pub fn reset(&mut self) -> &mut Self {
        self.reset_request().reset_response();
        self.application.reset();
        debug!("test case reset");
        self
    }

    /// Replace the namespace bindings used by subsequent XPath assertions.
    pub fn register_xpath_namespaces<I, K, V>(&mut self, namespaces: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.xpath_namespaces = namespaces
            .into_iter()
            .map(|(prefix, uri)| (prefix.into(), uri.into()))
            .collect();
        self
    }

    /// Message for the next assertion only, printed above its diagnostic if
    /// it fails. A message set on the `Assertion` itself takes precedence.
    pub fn on_failure(&mut self, message: impl Into<String>) -> &mut Self {
        self.failure_message = Some(message.into());
        self
    }

    /// Run an assertion without panicking.
    pub fn check(&mut self, assertion: &Assertion) -> Result<(), CheckError> {
        self.reporter.assertion_performed();
        let pending = self.failure_message.take();
        let response = self.response.get_or_insert_with(TestResponse::default);

        let result = match &assertion.check {
            Check::Query {
                kind,
                path,
                expectation,
            } => {
                let target = QueryTarget::new(response.body(), &self.xpath_namespaces);
                let matched = query::execute(target, *kind, path)?;
                expect::evaluate(*kind, path, &matched, expectation)?
                    .into_result()
                    .map_err(CheckError::from)
            }
            Check::Header(check) => check.evaluate(response),
            Check::Redirect(check) => check.evaluate(response),
            Check::RedirectRoute(check) => check
                .evaluate(response, &self.application)
                .map_err(CheckError::from),
            Check::Status(check) => check.evaluate(response).map_err(CheckError::from),
            Check::Dispatch(check) => check
                .evaluate(self.application.last_dispatch())
                .map_err(CheckError::from),
        };
        let message = assertion.message.as_deref().or(pending.as_deref());
        result.map_err(|err| err.with_message(message))
    }

    /// Run an assertion, panicking with its diagnostic on failure.
    #[track_caller]
    pub fn assert_that(&mut self, assertion: impl Into<Assertion>) {
        let assertion = assertion.into();
        if let Err(err) = self.check(&assertion) {
            panic!("{err}");
        }
    }

    // ── CSS selector assertions ────────────────────────────────────────────

    #[track_caller]
    pub fn assert_query(&mut self, path: &str) {
        self.assert_that(Assertion::css(path, Expectation::Exists));
    }

    #[track_caller]
    pub fn assert_not_query(&mut self, path: &str) {
        self.assert_that(Assertion::css(path, Expectation::NotExists));
    }

    #[track_caller]
    pub fn assert_query_count(&mut self, path: &str, count: usize) {
        self.assert_that(Assertion::css(path, Expectation::Count(count)));
    }

    #[track_caller]
    pub fn assert_not_query_count(&mut self, path: &str, count: usize) {
        self.assert_that(Assertion::css(path, Expectation::NotCount(count)));
    }

    #[track_caller]
    pub fn assert_query_count_min(&mut self, path: &str, count: usize) {
        self.assert_that(Assertion::css(path, Expectation::CountMin(count)));
    }

    #[track_caller]
    pub fn assert_query_count_max(&mut self, path: &str, count: usize) {
        self.assert_that(Assertion::css(path, Expectation::CountMax(count)));
    }

    #[track_caller]
    pub fn assert_query_content_contains(&mut self, path: &str, text: &str) {
        self.assert_that(Assertion::css(path, Expectation::ContentContains(text.into())));
    }

    #[track_caller]
    pub fn assert_not_query_content_contains(&mut self, path: &str, text: &str) {
        self.assert_that(Assertion::css(path, Expectation::NotContentContains(text.into())));
    }

    #[track_caller]
    pub fn assert_query_content_regex(&mut self, path: &str, pattern: &str) {
        self.assert_that(Assertion::css(path, Expectation::ContentRegex(pattern.into())));
    }

    #[track_caller]
    pub fn assert_not_query_content_regex(&mut self, path: &str, pattern: &str) {
        self.assert_that(Assertion::css(path, Expectation::NotContentRegex(pattern.into())));
    }

    // ── XPath assertions ───────────────────────────────────────────────────

    #[track_caller]
    pub fn assert_xpath_query(&mut self, path: &str) {
        self.assert_that(Assertion::xpath(path, Expectation::Exists));
    }

    #[track_caller]
    pub fn assert_not_xpath_query(&mut self, path: &str) {
        self.assert_that(Assertion::xpath(path, Expectation::NotExists));
    }

    #[track_caller]
    pub fn assert_xpath_query_count(&mut self, path: &str, count: usize) {
        self.assert_that(Assertion::xpath(path, Expectation::Count(count)));
    }

    #[track_caller]
    pub fn assert_not_xpath_query_count(&mut self, path: &str, count: usize) {
        self.assert_that(Assertion::xpath(path, Expectation::NotCount(count)));
    }

    #[track_caller]
    pub fn assert_xpath_query_count_min(&mut self, path: &str, count: usize) {
        self.assert_that(Assertion::xpath(path, Expectation::CountMin(count)));
    }

    #[track_caller]
    pub fn assert_xpath_query_count_max(&mut self, path: &str, count: usize) {
        self.assert_that(Assertion::xpath(path, Expectation::CountMax(count)));
    }

    #[track_caller]
    pub fn assert_xpath_query_content_contains(&mut self, path: &str, text: &str) {
        self.assert_that(Assertion::xpath(path, Expectation::ContentContains(text.into())));
    }

    #[track_caller]
    pub fn assert_not_xpath_query_content_contains(&mut self, path: &str, text: &str) {
        self.assert_that(Assertion::xpath(path, Expectation::NotContentContains(text.into())));
    }

    #[track_caller]
    pub fn assert_xpath_query_content_regex(&mut self, path: &str, pattern: &str) {
        self.assert_that(Assertion::xpath(path, Expectation::ContentRegex(pattern.into())));
    }

    #[track_caller]
    pub fn assert_not_xpath_query_content_regex(&mut self, path: &str, pattern: &str) {
        self.assert_that(Assertion::xpath(path, Expectation::NotContentRegex(pattern.into())));
    }

    // ── Headers ────────────────────────────────────────────────────────────

    #[track_caller]
    pub fn assert_has_response_header(&mut self, name: &str) {
        self.assert_that(HeaderCheck::Present(name.into()));
    }

    #[track_caller]
    pub fn assert_not_has_response_header(&mut self, name: &str) {
        self.assert_that(HeaderCheck::Absent(name.into()));
    }

    #[track_caller]
    pub fn assert_response_header_contains(&mut self, name: &str, value: &str) {
        self.assert_that(HeaderCheck::Contains {
            name: name.into(),
            value: value.into(),
        });
    }

    #[track_caller]
    pub fn assert_not_response_header_contains(&mut self, name: &str, value: &str) {
        self.assert_that(HeaderCheck::NotContains {
            name: name.into(),
            value: value.into(),
        });
    }

    #[track_caller]
    pub fn assert_response_header_regex(&mut self, name: &str, pattern: &str) {
        self.assert_that(HeaderCheck::Regex {
            name: name.into(),
            pattern: pattern.into(),
        });
    }

    #[track_caller]
    pub fn assert_not_response_header_regex(&mut self, name: &str, pattern: &str) {
        self.assert_that(HeaderCheck::NotRegex {
            name: name.into(),
            pattern: pattern.into(),
        });
    }

    // ── Redirects ──────────────────────────────────────────────────────────

    #[track_caller]
    pub fn assert_redirect(&mut self) {
        self.assert_that(RedirectCheck::Redirect);
    }

    #[track_caller]
    pub fn assert_not_redirect(&mut self) {
        self.assert_that(RedirectCheck::NotRedirect);
    }

    #[track_caller]
    pub fn assert_redirect_to(&mut self, url: &str) {
        self.assert_that(RedirectCheck::To(url.into()));
    }

    #[track_caller]
    pub fn assert_not_redirect_to(&mut self, url: &str) {
        self.assert_that(RedirectCheck::NotTo(url.into()));
    }

    /// The redirect target resolves to the named route of the application.
    #[track_caller]
    pub fn assert_redirect_to_route(&mut self, route: &str) {
        self.assert_that(RedirectRouteCheck::To(route.into()));
    }

    #[track_caller]
    pub fn assert_not_redirect_to_route(&mut self, route: &str) {
        self.assert_that(RedirectRouteCheck::NotTo(route.into()));
    }

    #[track_caller]
    pub fn assert_redirect_regex(&mut self, pattern: &str) {
        self.assert_that(RedirectCheck::Regex(pattern.into()));
    }

    #[track_caller]
    pub fn assert_not_redirect_regex(&mut self, pattern: &str) {
        self.assert_that(RedirectCheck::NotRegex(pattern.into()));
    }

    // ── Status line ────────────────────────────────────────────────────────

    #[track_caller]
    pub fn assert_response_status_code(&mut self, code: u16) {
        self.assert_that(StatusCheck::Code(code));
    }

    #[track_caller]
    pub fn assert_not_response_status_code(&mut self, code: u16) {
        self.assert_that(StatusCheck::NotCode(code));
    }

    #[track_caller]
    pub fn assert_response_reason_phrase(&mut self, phrase: &str) {
        self.assert_that(StatusCheck::ReasonPhrase(phrase.into()));
    }

    // ── Dispatch identity ──────────────────────────────────────────────────

    #[track_caller]
    pub fn assert_module_name(&mut self, module: &str) {
        self.assert_that(DispatchCheck::Module(module.into()));
    }

    #[track_caller]
    pub fn assert_not_module_name(&mut self, module: &str) {
        self.assert_that(DispatchCheck::NotModule(module.into()));
    }

    #[track_caller]
    pub fn assert_controller_name(&mut self, controller: &str) {
        self.assert_that(DispatchCheck::Controller(controller.into()));
    }

    #[track_caller]
    pub fn assert_not_controller_name(&mut self, controller: &str) {
        self.assert_that(DispatchCheck::NotController(controller.into()));
    }

    #[track_caller]
    pub fn assert_action_name(&mut self, action: &str) {
        self.assert_that(DispatchCheck::Action(action.into()));
    }

    #[track_caller]
    pub fn assert_not_action_name(&mut self, action: &str) {
        self.assert_that(DispatchCheck::NotAction(action.into()));
    }

    #[track_caller]
    pub fn assert_matched_route_name(&mut self, route: &str) {
        self.assert_that(DispatchCheck::Route(route.into()));
    }

    #[track_caller]
    pub fn assert_not_matched_route_name(&mut self, route: &str) {
        self.assert_that(DispatchCheck::NotRoute(route.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Application that never matches anything; responses are set by hand.
    #[derive(Default)]
    struct Static {
        info: DispatchInfo,
        body: String,
    }

    impl Application for Static {
        fn dispatch(&mut self, request: &TestRequest) -> Result<TestResponse> {
            let mut response = TestResponse::new();
            response.set_body(format!("{}{}", self.body, request.target()));
            Ok(response)
        }

        fn last_dispatch(&self) -> &DispatchInfo {
            &self.info
        }

        fn reset(&mut self) {
            self.info = DispatchInfo::default();
        }
    }

    fn case_with_body(body: &str) -> HttpControllerTestCase<Static> {
        let mut case = HttpControllerTestCase::new(Static::default());
        case.response().set_body(body);
        case
    }

    #[test]
    fn response_is_created_on_first_access() {
        let mut case = HttpControllerTestCase::new(Static::default());
        assert_eq!(case.response().body(), "");
        case.response().set_body("x");
        assert_eq!(case.response().body(), "x");
        case.reset_response();
        assert_eq!(case.response().body(), "");
    }

    #[test]
    fn dispatch_replaces_response_and_uses_request() {
        let mut case = HttpControllerTestCase::new(Static {
            body: "seen:".into(),
            ..Static::default()
        });
        case.request().add_query("q", "1");
        case.dispatch("/search").unwrap();
        assert_eq!(case.response().body(), "seen:/search?q=1");
    }

    #[test]
    fn reset_request_drops_parameters() {
        let mut case = HttpControllerTestCase::new(Static::default());
        case.request().set_uri("/a").add_query("q", "1");
        case.reset_request();
        assert_eq!(case.request().target(), "/");
    }

    #[test]
    fn every_check_is_reported_pass_or_fail() {
        let counter = AssertionCounter::default();
        let mut case = case_with_body("<ul><li>a</li></ul>").with_reporter(counter.clone());
        assert!(case.check(&Assertion::css("li", Expectation::Exists)).is_ok());
        assert!(case.check(&Assertion::css("li", Expectation::Count(5))).is_err());
        assert!(case.check(&RedirectCheck::Redirect.into()).is_err());
        assert_eq!(counter.count(), 3);
    }

    #[test]
    fn custom_message_prefixes_diagnostic() {
        let mut case = case_with_body("<ul><li>a</li><li>b</li></ul>");
        let err = case
            .check(&Assertion::css("li", Expectation::Count(3)).with_message("menu items"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "menu items\nFailed asserting node DENOTED BY li OCCURS EXACTLY 3 times, actually occurs 2 times"
        );
    }

    #[test]
    fn on_failure_message_applies_to_next_assertion_only() {
        let mut case = case_with_body("<ul><li>a</li></ul>");
        let err = case
            .on_failure("one item")
            .check(&Assertion::css("li", Expectation::Count(2)))
            .unwrap_err();
        assert!(err.to_string().starts_with("one item\n"));

        let err = case.check(&Assertion::css("li", Expectation::Count(2))).unwrap_err();
        assert!(err.to_string().starts_with("Failed asserting"));

        case.on_failure("consumed").assert_query("li");
        let err = case.check(&Assertion::css("li", Expectation::NotExists)).unwrap_err();
        assert!(err.to_string().starts_with("Failed asserting"));
    }

    #[test]
    fn assertion_message_overrides_on_failure() {
        let mut case = case_with_body("<p>x</p>");
        let err = case
            .on_failure("pending")
            .check(&Assertion::css("li", Expectation::Exists).with_message("own"))
            .unwrap_err();
        assert!(err.to_string().starts_with("own\n"));
    }

    #[test]
    #[should_panic(expected = "sidebar\nFailed asserting response header \"X-Frame\" found")]
    fn on_failure_prefixes_catalog_panics() {
        let mut case = case_with_body("");
        case.on_failure("sidebar").assert_has_response_header("X-Frame");
    }

    #[test]
    fn namespaces_apply_to_xpath_only_and_are_replaced() {
        let feed = r#"<?xml version="1.0"?><feed xmlns="urn:feed"><entry>x</entry></feed>"#;
        let mut case = case_with_body(feed);
        case.assert_xpath_query_count("//entry", 0);
        case.register_xpath_namespaces([("f", "urn:feed")]);
        case.assert_xpath_query_count("//f:entry", 1);
        case.assert_query_count("entry", 1);
        case.register_xpath_namespaces([("g", "urn:feed")]);
        case.assert_xpath_query("//g:entry");
    }

    #[test]
    fn malformed_selector_is_not_a_failure() {
        let mut case = case_with_body("<p>x</p>");
        let err = case.check(&Assertion::css("p[", Expectation::Exists)).unwrap_err();
        assert!(matches!(err, CheckError::Query(_)));
    }

    #[test]
    #[should_panic(expected = "Failed asserting node DENOTED BY li OCCURS EXACTLY 3 times, actually occurs 2 times")]
    fn assert_query_count_panics_with_diagnostic() {
        let mut case = case_with_body("<ul><li>a</li><li>b</li></ul>");
        case.assert_query_count("li", 3);
    }

    #[test]
    #[should_panic(expected = "Failed asserting node DENOTED BY li EXISTS")]
    fn content_assertion_on_missing_node_reports_existence() {
        let mut case = case_with_body("<p>x</p>");
        case.assert_query_content_contains("li", "x");
    }

    #[test]
    fn dispatch_identity_uses_application_metadata() {
        let mut case = HttpControllerTestCase::new(Static {
            info: DispatchInfo {
                module: "admin".into(),
                controller: "users".into(),
                action: "list".into(),
                route: "admin/users".into(),
            },
            ..Static::default()
        });
        case.assert_module_name("Admin");
        case.assert_controller_name("users");
        case.assert_action_name("list");
        case.assert_matched_route_name("admin/users");
        case.reset();
        case.assert_not_matched_route_name("admin/users");
    }
}
