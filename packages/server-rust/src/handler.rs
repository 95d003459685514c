//! Handler adapter: normalizes handlers of any shape into one terminal action.
//!
//! A handler may run synchronously or asynchronously, return an
//! [`Envelope`], a plain JSON value, nothing, or the sink it was given, and
//! may fail by returning an error or by panicking. [`wrap`] turns any of
//! these into an [`Adapted`] handler with the same call signature whose
//! outcome is exactly one of:
//!
//! - one write to the response sink (envelope or plain body),
//! - no write, because the handler already produced the response itself,
//! - one hand-off of the original failure to the [`Next`] continuation.
//!
//! Panics raised while invoking the handler and panics raised while its
//! future is polled are both caught and forwarded the same way as returned
//! errors.

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use routekit_core::{Envelope, RequestContext};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::pipeline::{Failure, Next, ResponseSink, ResponseWriter};

/// What a handler produces on success.
pub type HandlerResult = Result<HandlerOutput, Failure>;

/// Boxed future returned by [`Handler::call`].
pub type HandlerFuture = BoxFuture<'static, HandlerResult>;

// ---------------------------------------------------------------------------
// HandlerOutput
// ---------------------------------------------------------------------------

/// The return shapes a handler can produce.
#[derive(Debug)]
pub enum HandlerOutput {
    /// Final response: status and body come from the envelope.
    Envelope(Envelope),
    /// Plain body written with the host's default status.
    Body(Value),
    /// The handler returned a sink. If it is the sink it was given, the
    /// handler already wrote the response and nothing more is written.
    Sink(ResponseWriter),
    /// Explicit marker for "the response is already written".
    Handled,
    /// The handler returned nothing.
    Nothing,
}

impl HandlerOutput {
    /// Plain body from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns a fault if `value` cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, Failure> {
        Ok(Self::Body(serde_json::to_value(value)?))
    }
}

impl From<Envelope> for HandlerOutput {
    fn from(envelope: Envelope) -> Self {
        Self::Envelope(envelope)
    }
}

impl From<Value> for HandlerOutput {
    fn from(body: Value) -> Self {
        Self::Body(body)
    }
}

impl From<ResponseWriter> for HandlerOutput {
    fn from(sink: ResponseWriter) -> Self {
        Self::Sink(sink)
    }
}

impl From<()> for HandlerOutput {
    fn from((): ()) -> Self {
        Self::Nothing
    }
}

impl<T: Into<HandlerOutput>> From<Option<T>> for HandlerOutput {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Nothing, Into::into)
    }
}

// ---------------------------------------------------------------------------
// Handler trait
// ---------------------------------------------------------------------------

/// A per-route operation taking the (context, sink, continuation) triple.
pub trait Handler: Send + Sync + 'static {
    /// Starts the handler. Work done before the returned future is first
    /// polled counts as the synchronous part of the call.
    fn call(&self, ctx: RequestContext, sink: ResponseWriter, next: Next) -> HandlerFuture;
}

/// Handler backed by an async closure. See [`async_handler`].
#[derive(Clone)]
pub struct AsyncFn<F> {
    f: F,
}

/// Handler backed by a plain closure. See [`sync_handler`].
#[derive(Clone)]
pub struct SyncFn<F> {
    f: F,
}

/// Builds a handler from a closure returning a future of `Result<O, E>`.
pub fn async_handler<F, Fut, O, E>(f: F) -> AsyncFn<F>
where
    F: Fn(RequestContext, ResponseWriter, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
    O: Into<HandlerOutput>,
    E: Into<Failure>,
{
    AsyncFn { f }
}

/// Builds a handler from a closure returning `Result<O, E>` directly.
pub fn sync_handler<F, O, E>(f: F) -> SyncFn<F>
where
    F: Fn(RequestContext, ResponseWriter, Next) -> Result<O, E> + Send + Sync + 'static,
    O: Into<HandlerOutput>,
    E: Into<Failure>,
{
    SyncFn { f }
}

impl<F, Fut, O, E> Handler for AsyncFn<F>
where
    F: Fn(RequestContext, ResponseWriter, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
    O: Into<HandlerOutput>,
    E: Into<Failure>,
{
    fn call(&self, ctx: RequestContext, sink: ResponseWriter, next: Next) -> HandlerFuture {
        let fut = (self.f)(ctx, sink, next);
        Box::pin(async move { fut.await.map(Into::into).map_err(Into::into) })
    }
}

impl<F, O, E> Handler for SyncFn<F>
where
    F: Fn(RequestContext, ResponseWriter, Next) -> Result<O, E> + Send + Sync + 'static,
    O: Into<HandlerOutput>,
    E: Into<Failure>,
{
    fn call(&self, ctx: RequestContext, sink: ResponseWriter, next: Next) -> HandlerFuture {
        let result = (self.f)(ctx, sink, next);
        Box::pin(future::ready(result.map(Into::into).map_err(Into::into)))
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// A wrapped handler. Cheap to clone; clones share the wrapped handler.
pub struct Adapted<H> {
    inner: Arc<H>,
}

impl<H> Clone for Adapted<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: fmt::Debug> fmt::Debug for Adapted<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Adapted").field(&self.inner).finish()
    }
}

/// Wraps `handler` so that its outcome becomes a single terminal action.
pub fn wrap<H: Handler>(handler: H) -> Adapted<H> {
    Adapted {
        inner: Arc::new(handler),
    }
}

impl<H: Handler> Adapted<H> {
    /// Runs the wrapped handler for one request.
    ///
    /// Never panics and never returns a failure: failures are handed to
    /// `next`, successes are written to `sink`.
    pub fn call(
        &self,
        ctx: RequestContext,
        sink: ResponseWriter,
        next: Next,
    ) -> impl Future<Output = ()> + Send + 'static {
        run(Arc::clone(&self.inner), ctx, sink, next)
    }

    /// The wrapped handler.
    #[must_use]
    pub fn inner(&self) -> &H {
        &self.inner
    }
}

/// An adapted handler is itself a handler, so wrapping twice is harmless.
impl<H: Handler> Handler for Adapted<H> {
    fn call(&self, ctx: RequestContext, sink: ResponseWriter, next: Next) -> HandlerFuture {
        let fut = Adapted::call(self, ctx, sink, next);
        Box::pin(async move {
            fut.await;
            Ok(HandlerOutput::Handled)
        })
    }
}

async fn run<H: Handler>(handler: Arc<H>, ctx: RequestContext, sink: ResponseWriter, next: Next) {
    let invoked = panic::catch_unwind(AssertUnwindSafe(|| {
        Handler::call(&*handler, ctx, sink.clone(), next.clone())
    }));
    let pending = match invoked {
        Ok(pending) => pending,
        Err(payload) => {
            next.fail(Failure::from_panic(payload));
            return;
        }
    };

    match AssertUnwindSafe(pending).catch_unwind().await {
        Ok(Ok(output)) => settle(output, &sink),
        Ok(Err(failure)) => {
            debug!(failure = %failure, "handler failed; forwarding to error path");
            next.fail(failure);
        }
        Err(payload) => next.fail(Failure::from_panic(payload)),
    }
}

/// Performs the single terminal write for a successful outcome.
fn settle(output: HandlerOutput, sink: &ResponseWriter) {
    match output {
        HandlerOutput::Envelope(envelope) => {
            sink.write_status(envelope.code());
            sink.write_json(envelope.to_body());
        }
        HandlerOutput::Body(body) => sink.write_json(body),
        HandlerOutput::Sink(returned) => {
            if !returned.same_sink(sink) {
                warn!("handler returned a response sink it was not given; ignoring it");
            }
        }
        HandlerOutput::Handled | HandlerOutput::Nothing => {}
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
