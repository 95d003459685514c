//! Controller façade: turns a type's methods into adapted handlers.
//!
//! A [`Controller`] declares a static [`MethodTable`] mapping operation names
//! to methods taking the instance as receiver. [`create_controller`] resolves
//! the instance once through the chosen [`InstanceResolver`];
//! [`ResolvedController::get_method`] binds a method to that instance and
//! passes it through the handler adapter.

pub mod registry;
pub mod resolver;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future;
use routekit_core::RequestContext;
use tracing::{debug, error};

use crate::handler::{wrap, Adapted, Handler, HandlerFuture, HandlerOutput};
use crate::pipeline::{Failure, Next, ResponseWriter};

pub use registry::TypeRegistry;
pub use resolver::{
    Container, ContainerResolver, DirectResolver, InstanceResolver, MemoizedResolver, Resolution,
    ResolveError, SharedInstance,
};

// ---------------------------------------------------------------------------
// Controller trait
// ---------------------------------------------------------------------------

/// A type whose methods serve requests.
pub trait Controller: Send + Sync + Sized + 'static {
    /// Name used in logs and errors.
    const NAME: &'static str;

    /// Builds an instance without external dependencies.
    ///
    /// Controllers that need injected dependencies keep the default, which
    /// makes them resolvable through a container only.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotConstructible`] by default.
    fn construct() -> Result<Self, ResolveError> {
        Err(ResolveError::NotConstructible {
            controller: Self::NAME,
        })
    }

    /// The operations this controller exposes.
    fn methods() -> MethodTable<Self>;
}

// ---------------------------------------------------------------------------
// MethodTable
// ---------------------------------------------------------------------------

type MethodFn<C> =
    Arc<dyn Fn(Arc<C>, RequestContext, ResponseWriter, Next) -> HandlerFuture + Send + Sync>;

/// Operation name -> method, in declaration order.
pub struct MethodTable<C> {
    entries: Vec<(&'static str, MethodFn<C>)>,
}

impl<C: Send + Sync + 'static> MethodTable<C> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Declares an async method. A later declaration with the same name
    /// replaces the earlier one.
    #[must_use]
    pub fn method<F, Fut, O, E>(self, name: &'static str, f: F) -> Self
    where
        F: Fn(Arc<C>, RequestContext, ResponseWriter, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
        O: Into<HandlerOutput>,
        E: Into<Failure>,
    {
        self.insert(
            name,
            Arc::new(
                move |this: Arc<C>,
                      ctx: RequestContext,
                      sink: ResponseWriter,
                      next: Next|
                      -> HandlerFuture {
                let fut = f(this, ctx, sink, next);
                Box::pin(async move { fut.await.map(Into::into).map_err(Into::into) })
            }),
        )
    }

    /// Declares a synchronous method.
    #[must_use]
    pub fn sync_method<F, O, E>(self, name: &'static str, f: F) -> Self
    where
        F: Fn(Arc<C>, RequestContext, ResponseWriter, Next) -> Result<O, E> + Send + Sync + 'static,
        O: Into<HandlerOutput>,
        E: Into<Failure>,
    {
        self.insert(
            name,
            Arc::new(
                move |this: Arc<C>,
                      ctx: RequestContext,
                      sink: ResponseWriter,
                      next: Next|
                      -> HandlerFuture {
                let result = f(this, ctx, sink, next);
                Box::pin(future::ready(result.map(Into::into).map_err(Into::into)))
            }),
        )
    }

    fn insert(mut self, name: &'static str, method: MethodFn<C>) -> Self {
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = method;
        } else {
            self.entries.push((name, method));
        }
        self
    }

    /// The declared name and method for `name`.
    fn get(&self, name: &str) -> Option<(&'static str, MethodFn<C>)> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(n, method)| (*n, Arc::clone(method)))
    }

    /// Declared operation names, in declaration order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(name, _)| *name).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C: Send + Sync + 'static> Default for MethodTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// BoundMethod
// ---------------------------------------------------------------------------

/// A method bound to its controller instance.
pub struct BoundMethod<C> {
    controller: &'static str,
    name: &'static str,
    instance: Arc<C>,
    method: MethodFn<C>,
}

impl<C> BoundMethod<C> {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn instance(&self) -> &Arc<C> {
        &self.instance
    }
}

impl<C> fmt::Debug for BoundMethod<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.controller, self.name)
    }
}

impl<C: Send + Sync + 'static> Handler for BoundMethod<C> {
    fn call(&self, ctx: RequestContext, sink: ResponseWriter, next: Next) -> HandlerFuture {
        (self.method)(Arc::clone(&self.instance), ctx, sink, next)
    }
}

// ---------------------------------------------------------------------------
// ResolvedController
// ---------------------------------------------------------------------------

/// Errors from looking up controller methods.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    #[error("controller `{controller}` has no method `{method}` (available: {available:?})")]
    MissingMethod {
        controller: &'static str,
        method: String,
        available: Vec<&'static str>,
    },
}

/// A resolved instance together with its method table.
pub struct ResolvedController<C> {
    instance: Arc<C>,
    methods: Arc<MethodTable<C>>,
}

impl<C> Clone for ResolvedController<C> {
    fn clone(&self) -> Self {
        Self {
            instance: Arc::clone(&self.instance),
            methods: Arc::clone(&self.methods),
        }
    }
}

impl<C: Controller> ResolvedController<C> {
    /// The instance every bound method runs against.
    #[must_use]
    pub fn instance(&self) -> &Arc<C> {
        &self.instance
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        C::NAME
    }

    #[must_use]
    pub fn method_names(&self) -> Vec<&'static str> {
        self.methods.names()
    }

    /// Binds the named method to the instance and wraps it in the adapter.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::MissingMethod`] if the controller does not
    /// declare `name`.
    pub fn get_method(&self, name: &str) -> Result<Adapted<BoundMethod<C>>, ControllerError> {
        let Some((declared, method)) = self.methods.get(name) else {
            error!(controller = C::NAME, method = name, "unknown controller method");
            return Err(ControllerError::MissingMethod {
                controller: C::NAME,
                method: name.to_string(),
                available: self.methods.names(),
            });
        };

        Ok(wrap(BoundMethod {
            controller: C::NAME,
            name: declared,
            instance: Arc::clone(&self.instance),
            method,
        }))
    }

    /// Whether `name` is declared.
    #[must_use]
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.get(name).is_some()
    }
}

impl<C: Controller> fmt::Debug for ResolvedController<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedController")
            .field("controller", &C::NAME)
            .field("methods", &self.methods.names())
            .finish()
    }
}

/// Resolves `C` through `resolver` and prepares its method table.
///
/// # Errors
///
/// Returns the resolver's [`ResolveError`]. Callers wiring routes at startup
/// should abort on it: a missing dependency is a deployment defect.
pub fn create_controller<C, R>(resolver: &R) -> Result<ResolvedController<C>, ResolveError>
where
    C: Controller,
    R: InstanceResolver,
{
    let instance = resolver.resolve::<C>().inspect_err(|err| {
        error!(controller = C::NAME, error = %err, "controller resolution failed");
    })?;
    let methods = C::methods();
    debug!(controller = C::NAME, methods = ?methods.names(), "controller resolved");
    Ok(ResolvedController {
        instance,
        methods: Arc::new(methods),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use http::{Method, StatusCode, Uri};
    use routekit_core::{ClassifiedError, Envelope};
    use serde_json::json;

    use super::*;
    use crate::pipeline::ResponseSink;

    #[derive(Default)]
    struct Counter {
        hits: AtomicU32,
    }

    impl Counter {
        fn bump(&self) -> u32 {
            self.hits.fetch_add(1, Ordering::SeqCst) + 1
        }
    }

    impl Controller for Counter {
        const NAME: &'static str = "Counter";

        fn construct() -> Result<Self, ResolveError> {
            Ok(Self::default())
        }

        fn methods() -> MethodTable<Self> {
            MethodTable::new()
                .method("hit", |this: Arc<Self>, _ctx, _res, _next| async move {
                    Ok::<_, Failure>(Envelope::ok(json!({ "hits": this.bump() })))
                })
                .sync_method("peek", |this: Arc<Self>, _ctx, _res, _next| {
                    Ok::<_, Failure>(json!(this.hits.load(Ordering::SeqCst)))
                })
                .sync_method("reject", |_this, _ctx, _res, _next| {
                    Err::<(), _>(ClassifiedError::forbidden("counter is read-only"))
                })
                .sync_method("manual", |_this, _ctx, res: ResponseWriter, _next| {
                    res.write_status(StatusCode::ACCEPTED);
                    res.write_json(json!("queued"));
                    Ok::<_, Failure>(res)
                })
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new(Method::POST, Uri::from_static("/counter"))
    }

    async fn invoke<C: Controller>(
        controller: &ResolvedController<C>,
        name: &str,
    ) -> (ResponseWriter, Next) {
        let sink = ResponseWriter::new();
        let next = Next::new();
        controller
            .get_method(name)
            .unwrap()
            .call(ctx(), sink.clone(), next.clone())
            .await;
        (sink, next)
    }

    #[test]
    fn method_table_keeps_declaration_order_and_replaces_duplicates() {
        let table: MethodTable<Counter> = MethodTable::new()
            .sync_method("a", |_, _, _, _| Ok::<_, Failure>(()))
            .sync_method("b", |_, _, _, _| Ok::<_, Failure>(()))
            .sync_method("a", |_, _, _, _| Ok::<_, Failure>(()));
        assert_eq!(table.names(), vec!["a", "b"]);
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn bound_methods_share_the_resolved_instance() {
        let controller = create_controller::<Counter, _>(&DirectResolver).unwrap();
        invoke(&controller, "hit").await;
        let (sink, _) = invoke(&controller, "hit").await;

        assert_eq!(sink.status(), Some(StatusCode::OK));
        assert_eq!(sink.body().unwrap()["data"], json!({ "hits": 2 }));

        let (sink, _) = invoke(&controller, "peek").await;
        assert_eq!(sink.body(), Some(json!(2)));
    }

    #[tokio::test]
    async fn classified_rejection_goes_to_the_continuation() {
        let controller = create_controller::<Counter, _>(&DirectResolver).unwrap();
        let (sink, next) = invoke(&controller, "reject").await;

        assert_eq!(sink.body_writes(), 0);
        let failure = next.take_failure().unwrap();
        assert_eq!(
            failure.as_classified().map(ClassifiedError::code),
            Some(StatusCode::FORBIDDEN)
        );
    }

    #[tokio::test]
    async fn method_returning_its_sink_is_not_written_again() {
        let controller = create_controller::<Counter, _>(&DirectResolver).unwrap();
        let (sink, next) = invoke(&controller, "manual").await;
        assert_eq!(sink.status(), Some(StatusCode::ACCEPTED));
        assert_eq!(sink.body_writes(), 1);
        assert!(!next.was_called());
    }

    #[test]
    fn unknown_method_is_an_invariant_violation() {
        let controller = create_controller::<Counter, _>(&DirectResolver).unwrap();
        let err = controller.get_method("explode").unwrap_err();
        let ControllerError::MissingMethod {
            controller: name,
            method,
            available,
        } = err;
        assert_eq!(name, "Counter");
        assert_eq!(method, "explode");
        assert_eq!(available, vec!["hit", "peek", "reject", "manual"]);
        assert!(!controller.has_method("explode"));
        assert!(controller.has_method("hit"));
    }

    #[test]
    fn missing_container_fails_controller_creation() {
        let err = create_controller::<Counter, _>(&Resolution::container(None)).unwrap_err();
        assert!(matches!(err, ResolveError::DependencyUnavailable { .. }));
    }

    #[test]
    fn memoized_controllers_share_one_instance() {
        let resolver = MemoizedResolver::new();
        let a = create_controller::<Counter, _>(&resolver).unwrap();
        let b = create_controller::<Counter, _>(&resolver).unwrap();
        assert!(Arc::ptr_eq(a.instance(), b.instance()));
    }

    #[test]
    fn bound_method_debug_names_controller_and_method() {
        let controller = create_controller::<Counter, _>(&DirectResolver).unwrap();
        let adapted = controller.get_method("peek").unwrap();
        assert_eq!(format!("{:?}", adapted.inner()), "Counter::peek");
        assert_eq!(adapted.inner().name(), "peek");
    }
}
