use axum::http::header::LOCATION;

use crate::app::{Application, DispatchInfo};
use crate::failure::AssertionFailure;
use crate::response::TestResponse;

/// Checks on what handled the last dispatch.
///
/// Module, controller and action names compare case-insensitively; route
/// names compare exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchCheck {
    Module(String),
    NotModule(String),
    Controller(String),
    NotController(String),
    Action(String),
    NotAction(String),
    Route(String),
    NotRoute(String),
}

impl DispatchCheck {
    pub fn evaluate(&self, info: &DispatchInfo) -> Result<(), AssertionFailure> {
        match self {
            Self::Module(expected) => expect_name("module", &info.module, expected),
            Self::NotModule(unexpected) => reject_name("module", &info.module, unexpected)
                .map_err(|f| {
                    retitle(f, format!("Failed asserting last module used was NOT \"{unexpected}\""))
                }),
            Self::Controller(expected) => expect_name("controller", &info.controller, expected),
            Self::NotController(unexpected) => {
                reject_name("controller", &info.controller, unexpected)
            }
            Self::Action(expected) => expect_name("action", &info.action, expected),
            Self::NotAction(unexpected) => reject_name("action", &info.action, unexpected),
            Self::Route(expected) if *expected != info.route => Err(AssertionFailure::new(
                "route",
                format!(
                    "Failed asserting matched route was \"{expected}\", actual route is {}",
                    info.route
                ),
            )
            .expected(expected.as_str())
            .actual(info.route.as_str())),
            Self::NotRoute(unexpected) if *unexpected == info.route => Err(AssertionFailure::new(
                "route",
                format!("Failed asserting route matched was NOT \"{unexpected}\""),
            )
            .expected(unexpected.as_str())
            .actual(info.route.as_str())),
            Self::Route(_) | Self::NotRoute(_) => Ok(()),
        }
    }
}

/// Checks on which route the `Location` header of the response leads to.
///
/// `To` requires a redirect. `NotTo` passes when there is no redirect at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectRouteCheck {
    To(String),
    NotTo(String),
}

impl RedirectRouteCheck {
    pub fn evaluate<A>(&self, response: &TestResponse, application: &A) -> Result<(), AssertionFailure>
    where
        A: Application + ?Sized,
    {
        let location = response.header(LOCATION.as_str());
        let matched = location
            .as_ref()
            .and_then(|values| application.match_route(values.first()));

        match self {
            Self::To(_) if location.is_none() => Err(AssertionFailure::new(
                "Location",
                "Failed asserting response is a redirect",
            )),
            Self::To(route) if matched != Some(route.as_str()) => {
                let actual = matched.unwrap_or_default();
                Err(AssertionFailure::new(
                    "Location",
                    format!(
                        "Failed asserting response redirects to route \"{route}\", actual route is \"{actual}\""
                    ),
                )
                .expected(route.as_str())
                .actual(actual))
            }
            Self::NotTo(route) if matched == Some(route.as_str()) => Err(AssertionFailure::new(
                "Location",
                format!("Failed asserting response does NOT redirect to route \"{route}\""),
            )
            .expected(route.as_str())
            .actual(route.as_str())),
            Self::To(_) | Self::NotTo(_) => Ok(()),
        }
    }
}

fn expect_name(what: &str, actual: &str, expected: &str) -> Result<(), AssertionFailure> {
    if actual.eq_ignore_ascii_case(expected) {
        return Ok(());
    }
    Err(AssertionFailure::new(
        what,
        format!("Failed asserting last {what} used <\"{actual}\"> was \"{expected}\""),
    )
    .expected(expected)
    .actual(actual))
}

fn reject_name(what: &str, actual: &str, unexpected: &str) -> Result<(), AssertionFailure> {
    if !actual.eq_ignore_ascii_case(unexpected) {
        return Ok(());
    }
    Err(AssertionFailure::new(
        what,
        format!("Failed asserting last {what} used <\"{actual}\"> was NOT \"{unexpected}\""),
    )
    .expected(unexpected)
    .actual(actual))
}

fn retitle(mut failure: AssertionFailure, diagnostic: String) -> AssertionFailure {
    failure.diagnostic = diagnostic;
    failure
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> DispatchInfo {
        DispatchInfo {
            module: "Blog".into(),
            controller: "Post".into(),
            action: "show".into(),
            route: "blog/post".into(),
        }
    }

    #[test]
    fn names_compare_case_insensitively() {
        assert!(DispatchCheck::Module("blog".into()).evaluate(&info()).is_ok());
        assert!(DispatchCheck::Controller("POST".into()).evaluate(&info()).is_ok());
        assert!(DispatchCheck::Action("Show".into()).evaluate(&info()).is_ok());
        assert!(DispatchCheck::NotAction("index".into()).evaluate(&info()).is_ok());
    }

    #[test]
    fn name_mismatch_reports_actual() {
        let failure = DispatchCheck::Controller("Index".into()).evaluate(&info()).unwrap_err();
        assert_eq!(
            failure.diagnostic,
            "Failed asserting last controller used <\"Post\"> was \"Index\""
        );
        assert_eq!(failure.actual.as_deref(), Some("Post"));
    }

    #[test]
    fn not_module_diagnostic_omits_actual() {
        let failure = DispatchCheck::NotModule("blog".into()).evaluate(&info()).unwrap_err();
        assert_eq!(
            failure.diagnostic,
            "Failed asserting last module used was NOT \"blog\""
        );
    }

    #[test]
    fn route_names_compare_exactly() {
        assert!(DispatchCheck::Route("blog/post".into()).evaluate(&info()).is_ok());
        assert!(DispatchCheck::NotRoute("Blog/Post".into()).evaluate(&info()).is_ok());
        let failure = DispatchCheck::Route("home".into()).evaluate(&info()).unwrap_err();
        assert_eq!(
            failure.diagnostic,
            "Failed asserting matched route was \"home\", actual route is blog/post"
        );
    }

    /// Resolves `/home` and anything under `/posts/`.
    #[derive(Default)]
    struct Routes {
        info: DispatchInfo,
    }

    impl Application for Routes {
        fn dispatch(&mut self, _: &crate::response::TestRequest) -> anyhow::Result<TestResponse> {
            Ok(TestResponse::new())
        }

        fn last_dispatch(&self) -> &DispatchInfo {
            &self.info
        }

        fn reset(&mut self) {}

        fn match_route(&self, location: &str) -> Option<&str> {
            match location {
                "/home" => Some("home"),
                l if l.starts_with("/posts/") => Some("post"),
                _ => None,
            }
        }
    }

    fn redirecting_to(location: &str) -> TestResponse {
        let mut response = TestResponse::new();
        response.add_header("Location", location).unwrap();
        response
    }

    #[test]
    fn redirect_to_route_requires_a_redirect() {
        let response = TestResponse::new();
        let failure = RedirectRouteCheck::To("home".into())
            .evaluate(&response, &Routes::default())
            .unwrap_err();
        assert_eq!(failure.diagnostic, "Failed asserting response is a redirect");
        assert!(RedirectRouteCheck::NotTo("home".into()).evaluate(&response, &Routes::default()).is_ok());
    }

    #[test]
    fn redirect_to_route_compares_matched_name() {
        let response = redirecting_to("/posts/9");
        assert!(RedirectRouteCheck::To("post".into()).evaluate(&response, &Routes::default()).is_ok());
        assert!(RedirectRouteCheck::NotTo("home".into()).evaluate(&response, &Routes::default()).is_ok());

        let failure = RedirectRouteCheck::To("home".into())
            .evaluate(&response, &Routes::default())
            .unwrap_err();
        assert_eq!(
            failure.diagnostic,
            "Failed asserting response redirects to route \"home\", actual route is \"post\""
        );
        let failure = RedirectRouteCheck::NotTo("post".into())
            .evaluate(&response, &Routes::default())
            .unwrap_err();
        assert_eq!(
            failure.diagnostic,
            "Failed asserting response does NOT redirect to route \"post\""
        );
    }

    #[test]
    fn unroutable_location_matches_no_route() {
        let response = redirecting_to("/elsewhere");
        let failure = RedirectRouteCheck::To("home".into())
            .evaluate(&response, &Routes::default())
            .unwrap_err();
        assert_eq!(failure.actual.as_deref(), Some(""));
    }

    #[test]
    fn nothing_dispatched_has_empty_names() {
        let info = DispatchInfo::default();
        assert!(DispatchCheck::Route("home".into()).evaluate(&info).is_err());
        assert!(DispatchCheck::NotRoute("home".into()).evaluate(&info).is_ok());
    }
}
