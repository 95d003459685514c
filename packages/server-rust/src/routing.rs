//! Bridge between adapted handlers and axum routes.
//!
//! Each request runs through [`dispatch`]: the request is turned into a
//! [`RequestContext`], the adapted handler runs against a fresh
//! [`ResponseWriter`], and any failure handed to [`Next`] is written by the
//! [`ErrorTerminator`].

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequestParts, RawPathParams, Request};
use axum::response::Response;
use axum::routing::{MethodFilter, MethodRouter};
use bytes::Bytes;
use routekit_core::{ClassifiedError, RequestContext};
use tracing::debug;

use crate::controller::{Controller, ControllerError, ResolvedController};
use crate::handler::{Adapted, Handler};
use crate::pipeline::{Next, ResponseSink, ResponseWriter};
use crate::terminator::{self, ErrorTerminator};

/// Maximum buffered request body size.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Which terminator a route writes failures with.
#[derive(Debug, Clone)]
enum Termination {
    /// The process-wide terminator, looked up per request.
    Installed,
    Explicit(Arc<ErrorTerminator>),
}

impl Termination {
    fn get(&self) -> &ErrorTerminator {
        match self {
            Self::Installed => terminator::installed(),
            Self::Explicit(terminator) => terminator,
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Runs one request through `adapted` and produces its response.
///
/// The request body is buffered up to `body_limit` bytes; a body that
/// cannot be read is answered with 400. A handler that passes the request
/// on (`next.pass()`) without writing anything gets a 404, since no later
/// stage exists at this point.
pub async fn dispatch<H: Handler>(
    adapted: Adapted<H>,
    terminator: &ErrorTerminator,
    request: Request,
    body_limit: usize,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let params: Vec<(String, String)> = match RawPathParams::from_request_parts(&mut parts, &()).await {
        Ok(raw) => raw
            .iter()
            .map(|(name, value)| (name.to_owned(), value.to_owned()))
            .collect(),
        Err(_) => Vec::new(),
    };

    let sink = ResponseWriter::new();
    let (bytes, read_error) = match axum::body::to_bytes(body, body_limit).await {
        Ok(bytes) => (bytes, None),
        Err(err) => (Bytes::new(), Some(err)),
    };
    let ctx = RequestContext::from_parts(parts.method, parts.uri, parts.headers, params, bytes);

    if let Some(err) = read_error {
        let failure = ClassifiedError::bad_request(format!("failed to read request body: {err}"));
        terminator.terminate(failure.into(), &ctx, &sink);
        return sink.take_response();
    }

    let next = Next::new();
    adapted.call(ctx.clone(), sink.clone(), next.clone()).await;

    if let Some(failure) = next.take_failure() {
        terminator.terminate(failure, &ctx, &sink);
    } else if next.was_called() && !sink.is_committed() {
        debug!(
            request_id = ctx.request_id(),
            path = ctx.path(),
            "request passed on with no later stage"
        );
        let not_found =
            ClassifiedError::not_found(format!("no handler answered {} {}", ctx.method(), ctx.path()));
        terminator.terminate(not_found.into(), &ctx, &sink);
    }

    sink.take_response()
}

// ---------------------------------------------------------------------------
// Route builders
// ---------------------------------------------------------------------------

/// Builds the method router; `None` serves every method.
fn route<H, S>(
    filter: Option<MethodFilter>,
    adapted: Adapted<H>,
    termination: Termination,
) -> MethodRouter<S>
where
    H: Handler,
    S: Clone + Send + Sync + 'static,
{
    let handler = move |request: Request<Body>| {
        let adapted = adapted.clone();
        let termination = termination.clone();
        async move { dispatch(adapted, termination.get(), request, DEFAULT_BODY_LIMIT).await }
    };
    match filter {
        Some(filter) => axum::routing::on(filter, handler),
        None => axum::routing::any(handler),
    }
}

/// Serves `adapted` for the methods in `filter`, writing failures with the
/// process-wide terminator.
pub fn on<H, S>(filter: MethodFilter, adapted: Adapted<H>) -> MethodRouter<S>
where
    H: Handler,
    S: Clone + Send + Sync + 'static,
{
    route(Some(filter), adapted, Termination::Installed)
}

/// Like [`on`], with an explicit terminator instead of the installed one.
pub fn on_with<H, S>(
    filter: MethodFilter,
    adapted: Adapted<H>,
    terminator: Arc<ErrorTerminator>,
) -> MethodRouter<S>
where
    H: Handler,
    S: Clone + Send + Sync + 'static,
{
    route(Some(filter), adapted, Termination::Explicit(terminator))
}

/// Serves `adapted` for every HTTP method.
pub fn endpoint<H, S>(adapted: Adapted<H>) -> MethodRouter<S>
where
    H: Handler,
    S: Clone + Send + Sync + 'static,
{
    route(None, adapted, Termination::Installed)
}

pub fn get<H: Handler, S: Clone + Send + Sync + 'static>(adapted: Adapted<H>) -> MethodRouter<S> {
    on(MethodFilter::GET, adapted)
}

pub fn post<H: Handler, S: Clone + Send + Sync + 'static>(adapted: Adapted<H>) -> MethodRouter<S> {
    on(MethodFilter::POST, adapted)
}

pub fn put<H: Handler, S: Clone + Send + Sync + 'static>(adapted: Adapted<H>) -> MethodRouter<S> {
    on(MethodFilter::PUT, adapted)
}

pub fn patch<H: Handler, S: Clone + Send + Sync + 'static>(adapted: Adapted<H>) -> MethodRouter<S> {
    on(MethodFilter::PATCH, adapted)
}

pub fn delete<H: Handler, S: Clone + Send + Sync + 'static>(adapted: Adapted<H>) -> MethodRouter<S> {
    on(MethodFilter::DELETE, adapted)
}

/// Looks up `method` on `controller` and serves it for `filter`.
///
/// # Errors
///
/// Returns [`ControllerError::MissingMethod`] if the controller has no such
/// method, so route wiring fails before any request is served.
pub fn controller_route<C, S>(
    controller: &ResolvedController<C>,
    filter: MethodFilter,
    method: &str,
) -> Result<MethodRouter<S>, ControllerError>
where
    C: Controller,
    S: Clone + Send + Sync + 'static,
{
    Ok(on(filter, controller.get_method(method)?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
