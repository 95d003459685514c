//! Response sink: the write side of the host pipeline.
//!
//! [`ResponseSink`] is the narrow interface handlers, the adapter, and the
//! terminator write through. [`ResponseWriter`] is the implementation the
//! axum bridge hands out; it buffers the response and is turned into an
//! `axum::response::Response` once the handler chain is done.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::header::{InvalidHeaderValue, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::warn;

// ---------------------------------------------------------------------------
// ResponseSink trait
// ---------------------------------------------------------------------------

/// Operations the host pipeline exposes for building a response.
///
/// A sink is *committed* once a body has been written. After that, status
/// and body writes are ignored; only one terminal write ever reaches the wire.
pub trait ResponseSink: Send + Sync {
    /// Sets the wire status.
    fn write_status(&self, status: StatusCode);

    /// Writes `body` as the JSON response body. This is the terminal write.
    fn write_json(&self, body: Value);

    /// Sets a response header, replacing any previous value.
    fn write_header(&self, name: HeaderName, value: HeaderValue);

    /// Appends a `Set-Cookie` header.
    ///
    /// # Errors
    ///
    /// Returns an error if the rendered cookie is not a valid header value.
    fn write_cookie(
        &self,
        name: &str,
        value: &str,
        options: &CookieOptions,
    ) -> Result<(), InvalidHeaderValue>;

    /// Whether a body has already been written.
    fn is_committed(&self) -> bool;
}

// ---------------------------------------------------------------------------
// CookieOptions
// ---------------------------------------------------------------------------

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// Attributes rendered into a `Set-Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: Option<String>,
    pub domain: Option<String>,
    pub max_age: Option<Duration>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: Some("/".to_string()),
            domain: None,
            max_age: None,
            http_only: false,
            secure: false,
            same_site: None,
        }
    }
}

impl CookieOptions {
    /// Renders `name=value` followed by the configured attributes.
    #[must_use]
    pub fn render(&self, name: &str, value: &str) -> String {
        let mut cookie = format!("{name}={value}");
        if let Some(path) = &self.path {
            let _ = write!(cookie, "; Path={path}");
        }
        if let Some(domain) = &self.domain {
            let _ = write!(cookie, "; Domain={domain}");
        }
        if let Some(max_age) = self.max_age {
            let _ = write!(cookie, "; Max-Age={}", max_age.as_secs());
        }
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        if let Some(same_site) = self.same_site {
            let _ = write!(cookie, "; SameSite={}", same_site.as_str());
        }
        cookie
    }
}

// ---------------------------------------------------------------------------
// ResponseWriter
// ---------------------------------------------------------------------------

/// Buffered, shareable response sink.
///
/// Clones refer to the same response; [`ResponseWriter::same_sink`] compares
/// identity, which is how the adapter recognizes a handler returning the sink
/// it was given.
#[derive(Debug, Clone, Default)]
pub struct ResponseWriter {
    state: Arc<Mutex<ResponseState>>,
}

#[derive(Debug, Default)]
struct ResponseState {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Option<Value>,
    body_writes: u32,
}

impl ResponseWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if both handles refer to the same response.
    #[must_use]
    pub fn same_sink(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Status set so far, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.state.lock().status
    }

    /// Body written so far, if any.
    #[must_use]
    pub fn body(&self) -> Option<Value> {
        self.state.lock().body.clone()
    }

    #[must_use]
    pub fn header(&self, name: &HeaderName) -> Option<HeaderValue> {
        self.state.lock().headers.get(name).cloned()
    }

    /// All `Set-Cookie` values, in write order.
    #[must_use]
    pub fn cookies(&self) -> Vec<HeaderValue> {
        self.state
            .lock()
            .headers
            .get_all(SET_COOKIE)
            .iter()
            .cloned()
            .collect()
    }

    /// Number of body writes attempted, including ignored ones.
    #[must_use]
    pub fn body_writes(&self) -> u32 {
        self.state.lock().body_writes
    }

    /// Takes the buffered response out of the shared state.
    ///
    /// Status defaults to 200. Without a body the response is empty.
    #[must_use]
    pub fn take_response(&self) -> Response {
        let state = std::mem::take(&mut *self.state.lock());
        let mut response = match state.body {
            Some(body) => Json(body).into_response(),
            None => Response::default(),
        };
        *response.status_mut() = state.status.unwrap_or(StatusCode::OK);
        response.headers_mut().extend(state.headers);
        response
    }
}

impl ResponseSink for ResponseWriter {
    fn write_status(&self, status: StatusCode) {
        let mut state = self.state.lock();
        if state.body.is_some() {
            warn!(status = status.as_u16(), "status written after response was committed; ignoring");
            return;
        }
        state.status = Some(status);
    }

    fn write_json(&self, body: Value) {
        let mut state = self.state.lock();
        state.body_writes += 1;
        if state.body.is_some() {
            warn!(writes = state.body_writes, "response body already written; ignoring");
            return;
        }
        state.body = Some(body);
    }

    fn write_header(&self, name: HeaderName, value: HeaderValue) {
        self.state.lock().headers.insert(name, value);
    }

    fn write_cookie(
        &self,
        name: &str,
        value: &str,
        options: &CookieOptions,
    ) -> Result<(), InvalidHeaderValue> {
        let header = HeaderValue::try_from(options.render(name, value))?;
        self.state.lock().headers.append(SET_COOKIE, header);
        Ok(())
    }

    fn is_committed(&self) -> bool {
        self.state.lock().body.is_some()
    }
}

impl IntoResponse for ResponseWriter {
    fn into_response(self) -> Response {
        self.take_response()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;
    use serde_json::json;

    #[test]
    fn clones_are_the_same_sink() {
        let a = ResponseWriter::new();
        let b = a.clone();
        let c = ResponseWriter::new();
        assert!(a.same_sink(&b));
        assert!(!a.same_sink(&c));
    }

    #[test]
    fn first_body_write_wins() {
        let sink = ResponseWriter::new();
        sink.write_json(json!({ "first": true }));
        sink.write_json(json!({ "second": true }));
        assert_eq!(sink.body(), Some(json!({ "first": true })));
        assert_eq!(sink.body_writes(), 2);
        assert!(sink.is_committed());
    }

    #[test]
    fn status_after_commit_is_ignored() {
        let sink = ResponseWriter::new();
        sink.write_status(StatusCode::CREATED);
        sink.write_json(json!(1));
        sink.write_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(sink.status(), Some(StatusCode::CREATED));
    }

    #[test]
    fn cookie_rendering_includes_attributes() {
        let options = CookieOptions {
            max_age: Some(Duration::from_secs(3600)),
            http_only: true,
            secure: true,
            same_site: Some(SameSite::Lax),
            ..CookieOptions::default()
        };
        assert_eq!(
            options.render("sid", "abc"),
            "sid=abc; Path=/; Max-Age=3600; HttpOnly; Secure; SameSite=Lax"
        );
    }

    #[test]
    fn cookies_accumulate() {
        let sink = ResponseWriter::new();
        sink.write_cookie("a", "1", &CookieOptions::default()).unwrap();
        sink.write_cookie("b", "2", &CookieOptions::default()).unwrap();
        assert_eq!(sink.cookies().len(), 2);
    }

    #[test]
    fn invalid_cookie_value_is_rejected() {
        let sink = ResponseWriter::new();
        assert!(sink
            .write_cookie("a", "bad\nvalue", &CookieOptions::default())
            .is_err());
        assert!(sink.cookies().is_empty());
    }

    #[test]
    fn take_response_defaults_to_200_and_empty_body() {
        let sink = ResponseWriter::new();
        let response = sink.take_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn take_response_carries_status_headers_and_json() {
        let sink = ResponseWriter::new();
        sink.write_status(StatusCode::ACCEPTED);
        sink.write_header(
            HeaderName::from_static("x-trace"),
            HeaderValue::from_static("t-1"),
        );
        sink.write_json(json!({ "ok": true }));

        let response = sink.into_response();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()["x-trace"], "t-1");
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    }
}
