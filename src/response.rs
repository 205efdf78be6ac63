use anyhow::{Context as _, Result};
use axum::body::Body;
use axum::http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::Response;

/// Request that will be handed to the application on the next dispatch.
///
/// Setters never fail; invalid header names or URIs surface when the request
/// is converted at dispatch time.
#[derive(Debug, Clone)]
pub struct TestRequest {
    method: Method,
    uri: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    post: Vec<(String, String)>,
    body: String,
}

impl Default for TestRequest {
    fn default() -> Self {
        Self {
            method: Method::GET,
            uri: "/".to_string(),
            headers: Vec::new(),
            query: Vec::new(),
            post: Vec::new(),
            body: String::new(),
        }
    }
}

impl TestRequest {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn set_method(&mut self, method: Method) -> &mut Self {
        self.method = method;
        self
    }

    pub fn set_uri(&mut self, uri: impl Into<String>) -> &mut Self {
        self.uri = uri.into();
        self
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a query-string parameter, appended to the URI at dispatch.
    pub fn add_query(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Add a form parameter. Any form parameter makes the body
    /// `application/x-www-form-urlencoded` and replaces the raw body.
    pub fn add_post(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.post.push((name.into(), value.into()));
        self
    }

    pub fn set_body(&mut self, body: impl Into<String>) -> &mut Self {
        self.body = body.into();
        self
    }

    pub fn clear_query(&mut self) -> &mut Self {
        self.query.clear();
        self
    }

    pub fn clear_post(&mut self) -> &mut Self {
        self.post.clear();
        self
    }

    /// Full request target, including encoded query parameters.
    pub fn target(&self) -> String {
        if self.query.is_empty() {
            return self.uri.clone();
        }
        let separator = if self.uri.contains('?') { '&' } else { '?' };
        format!("{}{separator}{}", self.uri, encode_pairs(&self.query))
    }

    pub(crate) fn to_http(&self) -> Result<Request<Body>> {
        let target = self.target();
        let body = if self.post.is_empty() {
            self.body.clone()
        } else {
            encode_pairs(&self.post)
        };

        let mut request = Request::builder()
            .method(self.method.clone())
            .uri(target.as_str())
            .body(Body::from(body))
            .with_context(|| format!("invalid request target {target:?}"))?;

        let headers = request.headers_mut();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("invalid request header name {name:?}"))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for request header {name}"))?;
            headers.append(name, value);
        }
        if !self.post.is_empty() && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            );
        }
        Ok(request)
    }
}

fn encode_pairs(pairs: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// All values of one response header, in the order they were sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderValues(Vec<String>);

impl HeaderValues {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn first(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or_default()
    }

    pub fn last(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Response captured from the last dispatch, or a blank one.
#[derive(Debug, Clone)]
pub struct TestResponse {
    status: StatusCode,
    reason_phrase: Option<String>,
    headers: HeaderMap,
    body: String,
}

impl Default for TestResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            reason_phrase: None,
            headers: HeaderMap::new(),
            body: String::new(),
        }
    }
}

impl TestResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn from_http(response: Response) -> Result<Self> {
        let (parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX)
            .await
            .context("failed to read response body")?;
        Ok(Self {
            status: parts.status,
            reason_phrase: None,
            headers: parts.headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    /// Custom reason phrase if one was set, otherwise the canonical phrase
    /// for the status code (empty for unknown codes).
    pub fn reason_phrase(&self) -> &str {
        self.reason_phrase
            .as_deref()
            .or_else(|| self.status.canonical_reason())
            .unwrap_or_default()
    }

    pub fn set_reason_phrase(&mut self, phrase: impl Into<String>) -> &mut Self {
        self.reason_phrase = Some(phrase.into());
        self
    }

    /// Look a header up by name. Name matching is whatever the header map
    /// does (case-insensitive). `None` means absent; a header sent with an
    /// empty value is present.
    pub fn header(&self, name: &str) -> Option<HeaderValues> {
        let values: Vec<String> = self
            .headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(HeaderValues(values))
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Append a header value, keeping any existing values for the name.
    pub fn add_header(&mut self, name: &str, value: &str) -> Result<&mut Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("invalid header name {name:?}"))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("invalid value for header {name}"))?;
        self.headers.append(name, value);
        Ok(self)
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<String>) -> &mut Self {
        self.body = body.into();
        self
    }
}
