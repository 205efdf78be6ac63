//! The application under test.
//!
//! `Application` is the seam between the assertion layer and whatever handles
//! requests. `RouterApplication` is the in-process implementation on top of an
//! axum `Router`: requests never touch a socket.

use std::collections::HashMap;

use anyhow::{Context as _, Result};
use axum::extract::{MatchedPath, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::MethodRouter;
use axum::Router;
use serde::Serialize;
use tokio::runtime::Runtime;
use tower::ServiceExt;
use tracing::{debug, info};
use url::Url;

use crate::response::{TestRequest, TestResponse};

pub trait Application {
    /// Handle one request and capture the full response.
    fn dispatch(&mut self, request: &TestRequest) -> Result<TestResponse>;

    /// What handled the most recent dispatch. All names are empty before the
    /// first dispatch, after `reset`, or when no route matched.
    fn last_dispatch(&self) -> &DispatchInfo;

    fn reset(&mut self);

    /// Name of the route a request for `location` would be routed to,
    /// without dispatching it. Applications without a routing table never
    /// match.
    fn match_route(&self, location: &str) -> Option<&str> {
        let _ = location;
        None
    }
}

/// Identity of the handler that served a dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchInfo {
    pub module: String,
    pub controller: String,
    pub action: String,
    pub route: String,
}

impl From<&RouteSpec> for DispatchInfo {
    fn from(spec: &RouteSpec) -> Self {
        Self {
            module: spec.module.clone(),
            controller: spec.controller.clone(),
            action: spec.action.clone(),
            route: spec.name.clone(),
        }
    }
}

/// A named route and the module/controller/action it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub name: String,
    pub path: String,
    pub module: String,
    pub controller: String,
    pub action: String,
}

impl RouteSpec {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            module: String::new(),
            controller: String::new(),
            action: String::new(),
        }
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn controller(mut self, controller: impl Into<String>) -> Self {
        self.controller = controller.into();
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }
}

pub struct RouterApplicationBuilder {
    router: Router,
    routes: Vec<RouteSpec>,
}

impl RouterApplicationBuilder {
    /// Register a handler under `spec.path`. Registering several method
    /// routers on one path is allowed; the last `RouteSpec` names the route.
    pub fn route(mut self, spec: RouteSpec, handler: MethodRouter) -> Self {
        self.router = self.router.route(&spec.path, handler);
        self.routes.push(spec);
        self
    }

    /// Bootstrap: wire route tracking and start the runtime requests are
    /// dispatched on.
    pub fn build(self) -> Result<RouterApplication> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start dispatch runtime")?;

        let router = if self.routes.is_empty() {
            self.router
        } else {
            self.router
                .route_layer(middleware::from_fn(record_matched_path))
        };

        let routes: HashMap<String, RouteSpec> = self
            .routes
            .into_iter()
            .map(|spec| (spec.path.clone(), spec))
            .collect();
        info!(routes = routes.len(), "application bootstrapped");

        Ok(RouterApplication {
            router,
            routes,
            runtime,
            last_dispatch: DispatchInfo::default(),
        })
    }
}

/// An axum router dispatched in-process on its own current-thread runtime.
///
/// Dispatch blocks on that runtime, so the application must be driven from
/// synchronous code (plain `#[test]` functions), not from inside another
/// tokio runtime.
pub struct RouterApplication {
    router: Router,
    routes: HashMap<String, RouteSpec>,
    runtime: Runtime,
    last_dispatch: DispatchInfo,
}

impl RouterApplication {
    pub fn builder() -> RouterApplicationBuilder {
        RouterApplicationBuilder {
            router: Router::new(),
            routes: Vec::new(),
        }
    }
}

impl Application for RouterApplication {
    fn dispatch(&mut self, request: &TestRequest) -> Result<TestResponse> {
        let http_request = request.to_http()?;
        info!(method = %http_request.method(), uri = %http_request.uri(), "dispatching request");

        let router = self.router.clone();
        let (response, matched) = self.runtime.block_on(async move {
            let response = router
                .oneshot(http_request)
                .await
                .context("Router failed to handle request")?;
            let matched = response
                .extensions()
                .get::<MatchedPath>()
                .map(|path| path.as_str().to_string());
            let response = TestResponse::from_http(response).await?;
            Ok::<_, anyhow::Error>((response, matched))
        })?;

        self.last_dispatch = matched
            .as_deref()
            .and_then(|path| self.routes.get(path))
            .map(DispatchInfo::from)
            .unwrap_or_default();
        debug!(
            status = %response.status(),
            route = %self.last_dispatch.route,
            body_len = response.body().len(),
            "dispatch complete"
        );
        Ok(response)
    }

    fn last_dispatch(&self) -> &DispatchInfo {
        &self.last_dispatch
    }

    fn reset(&mut self) {
        self.last_dispatch = DispatchInfo::default();
    }

    fn match_route(&self, location: &str) -> Option<&str> {
        let path = location_path(location);
        if let Some(spec) = self.routes.get(&path) {
            return Some(spec.name.as_str());
        }
        self.routes
            .values()
            .filter(|spec| path_matches(&spec.path, &path))
            .max_by(|a, b| {
                literal_segments(&a.path)
                    .cmp(&literal_segments(&b.path))
                    .then_with(|| b.name.cmp(&a.name))
            })
            .map(|spec| spec.name.as_str())
    }
}

/// Path component of a redirect target, absolute or relative.
fn location_path(location: &str) -> String {
    match Url::parse(location) {
        Ok(url) => url.path().to_string(),
        Err(_) => location
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Match `path` against an axum route pattern: `{name}` takes one non-empty
/// segment, `{*name}` takes the rest.
fn path_matches(pattern: &str, path: &str) -> bool {
    let mut actual = path.split('/');
    for expected in pattern.split('/') {
        if expected.starts_with("{*") {
            return actual.next().is_some_and(|segment| !segment.is_empty());
        }
        let Some(segment) = actual.next() else {
            return false;
        };
        let is_param = expected.starts_with('{') && expected.ends_with('}');
        if (is_param && segment.is_empty()) || (!is_param && segment != expected) {
            return false;
        }
    }
    actual.next().is_none()
}

fn literal_segments(pattern: &str) -> usize {
    pattern
        .split('/')
        .filter(|segment| !segment.starts_with('{'))
        .count()
}

/// Copy the matched route pattern onto the response so it survives the trip
/// out of the router.
async fn record_matched_path(request: Request, next: Next) -> Response {
    let matched = request.extensions().get::<MatchedPath>().cloned();
    let mut response = next.run(request).await;
    if let Some(matched) = matched {
        response.extensions_mut().insert(matched);
    }
    response
}
