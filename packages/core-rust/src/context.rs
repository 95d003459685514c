use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use serde::de::DeserializeOwned;

use crate::error::ClassifiedError;

/// Header carrying the caller-supplied or generated request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request context handed to every handler.
/// Read-only view of the incoming request; cloning shares the same data.
#[derive(Debug, Clone)]
pub struct RequestContext {
    inner: Arc<Inner>,
}

#[derive(Debug, Clone)]
struct Inner {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: Vec<(String, String)>,
    body: Bytes,
    request_id: String,
}

impl RequestContext {
    /// Creates a context with no headers, params, or body.
    #[must_use]
    pub fn new(method: Method, uri: Uri) -> Self {
        Self::from_parts(method, uri, HeaderMap::new(), Vec::new(), Bytes::new())
    }

    /// Creates a context from already-extracted request parts.
    ///
    /// The request id is taken from the `x-request-id` header when present
    /// and valid UTF-8, otherwise a fresh UUID v4 is generated.
    #[must_use]
    pub fn from_parts(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        params: Vec<(String, String)>,
        body: Bytes,
    ) -> Self {
        let request_id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_string);
        Self {
            inner: Arc::new(Inner {
                method,
                uri,
                headers,
                params,
                body,
                request_id,
            }),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        Arc::make_mut(&mut self.inner).headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner)
            .params
            .push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        Arc::make_mut(&mut self.inner).body = body.into();
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.inner.uri.path()
    }

    /// Raw query string, without the leading `?`.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.inner.uri.query()
    }

    /// Decoded query pairs, in order.
    ///
    /// Percent-escapes and `+` are decoded. A key with no `=` maps to an
    /// empty value.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query()
            .and_then(|q| serde_urlencoded::from_str(q).ok())
            .unwrap_or_default()
    }

    /// First decoded query value for `name`.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query_pairs()
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Deserializes the query string into `T`. A missing query string is
    /// treated as empty.
    ///
    /// # Errors
    ///
    /// Returns a bad-request [`ClassifiedError`] when the query does not fit
    /// `T`.
    pub fn query_deserialize<T: DeserializeOwned>(&self) -> Result<T, ClassifiedError> {
        serde_urlencoded::from_str(self.query().unwrap_or(""))
            .map_err(|e| ClassifiedError::bad_request(format!("invalid query string: {e}")))
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    /// Header value as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Path parameter captured by the router.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.inner
            .params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Path parameter that must be present; absence is a 400.
    ///
    /// # Errors
    ///
    /// Returns a bad-request [`ClassifiedError`] naming the missing parameter.
    pub fn require_param(&self, name: &str) -> Result<&str, ClassifiedError> {
        self.param(name)
            .ok_or_else(|| ClassifiedError::bad_request(format!("missing path parameter `{name}`")))
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.inner.body
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns a bad-request [`ClassifiedError`] when the body is not valid
    /// JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClassifiedError> {
        serde_json::from_slice(&self.inner.body)
            .map_err(|e| ClassifiedError::bad_request(format!("invalid JSON body: {e}")))
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.inner.request_id
    }
}
