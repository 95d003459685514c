//! Instance resolution strategies for controllers.
//!
//! The strategy is picked explicitly when a controller is created:
//! - [`DirectResolver`]: a fresh instance per resolution
//! - [`MemoizedResolver`]: at most one instance per controller type
//! - [`ContainerResolver`]: instances come from an external [`Container`]

use std::any::{Any, TypeId};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use super::Controller;

/// Type-erased shared instance, as stored by memoizing resolvers and containers.
pub type SharedInstance = Arc<dyn Any + Send + Sync>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures while obtaining a controller instance.
///
/// These happen while wiring routes, before any request exists, and are
/// meant to abort startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("no dependency container is configured; cannot resolve controller `{controller}`")]
    DependencyUnavailable { controller: &'static str },
    #[error("controller `{controller}` is not registered in the dependency container")]
    NotRegistered { controller: &'static str },
    #[error("container returned an instance of the wrong type for controller `{controller}`")]
    TypeMismatch { controller: &'static str },
    #[error("controller `{controller}` cannot be constructed directly; resolve it through a container")]
    NotConstructible { controller: &'static str },
}

// ---------------------------------------------------------------------------
// InstanceResolver trait
// ---------------------------------------------------------------------------

/// Produces the instance backing a controller.
pub trait InstanceResolver: Send + Sync {
    /// Resolves the instance for controller type `C`.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolveError`] when no instance can be produced.
    fn resolve<C: Controller>(&self) -> Result<Arc<C>, ResolveError>;
}

fn downcast<C: Controller>(instance: SharedInstance) -> Result<Arc<C>, ResolveError> {
    instance
        .downcast::<C>()
        .map_err(|_| ResolveError::TypeMismatch {
            controller: C::NAME,
        })
}

// ---------------------------------------------------------------------------
// DirectResolver
// ---------------------------------------------------------------------------

/// Constructs a new instance on every resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectResolver;

impl InstanceResolver for DirectResolver {
    fn resolve<C: Controller>(&self) -> Result<Arc<C>, ResolveError> {
        C::construct().map(Arc::new)
    }
}

// ---------------------------------------------------------------------------
// MemoizedResolver
// ---------------------------------------------------------------------------

/// Constructs each controller type at most once and hands out that instance.
///
/// Each type gets its own guarded cell. The map lock is only held while the
/// cell is looked up, so `construct()` may resolve other controllers through
/// the same resolver, and a slow constructor only blocks callers of its own
/// type. Concurrent first callers of one type all observe the same instance.
#[derive(Debug, Default)]
pub struct MemoizedResolver {
    cells: DashMap<TypeId, Arc<InstanceCell>>,
}

/// Guarded-once slot for one controller type.
#[derive(Debug, Default)]
struct InstanceCell {
    value: OnceLock<SharedInstance>,
    init: Mutex<()>,
}

static GLOBAL_MEMOIZED: OnceLock<Arc<MemoizedResolver>> = OnceLock::new();

impl MemoizedResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide memoizing resolver.
    pub fn global() -> Arc<MemoizedResolver> {
        Arc::clone(GLOBAL_MEMOIZED.get_or_init(|| Arc::new(MemoizedResolver::new())))
    }

    /// Whether an instance of `C` has been constructed.
    #[must_use]
    pub fn contains<C: Controller>(&self) -> bool {
        self.cells
            .get(&TypeId::of::<C>())
            .is_some_and(|cell| cell.value.get().is_some())
    }

    /// Number of memoized instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells
            .iter()
            .filter(|cell| cell.value().value.get().is_some())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cell(&self, key: TypeId) -> Arc<InstanceCell> {
        if let Some(cell) = self.cells.get(&key) {
            return Arc::clone(cell.value());
        }
        Arc::clone(self.cells.entry(key).or_default().value())
    }
}

impl InstanceResolver for MemoizedResolver {
    fn resolve<C: Controller>(&self) -> Result<Arc<C>, ResolveError> {
        let cell = self.cell(TypeId::of::<C>());
        if let Some(existing) = cell.value.get() {
            return downcast(Arc::clone(existing));
        }

        let _init = cell.init.lock();
        if let Some(existing) = cell.value.get() {
            return downcast(Arc::clone(existing));
        }
        debug!(controller = C::NAME, "constructing memoized controller");
        let constructed: SharedInstance = Arc::new(C::construct()?);
        let instance = cell.value.get_or_init(|| constructed);
        downcast(Arc::clone(instance))
    }
}

// ---------------------------------------------------------------------------
// ContainerResolver
// ---------------------------------------------------------------------------

/// External dependency-injection container, looked up by type.
pub trait Container: Send + Sync {
    /// Returns the instance registered for `type_id`, if any.
    fn resolve_any(&self, type_id: TypeId) -> Option<SharedInstance>;
}

/// Delegates instance creation to a [`Container`].
///
/// Built without a container, every resolution fails with
/// [`ResolveError::DependencyUnavailable`].
#[derive(Clone, Default)]
pub struct ContainerResolver {
    container: Option<Arc<dyn Container>>,
}

impl ContainerResolver {
    #[must_use]
    pub fn new(container: Arc<dyn Container>) -> Self {
        Self {
            container: Some(container),
        }
    }

    /// A resolver whose container is missing.
    #[must_use]
    pub fn unavailable() -> Self {
        Self { container: None }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.container.is_some()
    }
}

impl std::fmt::Debug for ContainerResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerResolver")
            .field("available", &self.is_available())
            .finish()
    }
}

impl InstanceResolver for ContainerResolver {
    fn resolve<C: Controller>(&self) -> Result<Arc<C>, ResolveError> {
        let container = self
            .container
            .as_ref()
            .ok_or(ResolveError::DependencyUnavailable {
                controller: C::NAME,
            })?;
        let instance = container
            .resolve_any(TypeId::of::<C>())
            .ok_or(ResolveError::NotRegistered {
                controller: C::NAME,
            })?;
        downcast(instance)
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Explicitly selected resolution strategy.
#[derive(Debug, Clone)]
pub enum Resolution {
    Direct(DirectResolver),
    Memoized(Arc<MemoizedResolver>),
    Container(ContainerResolver),
}

impl Resolution {
    #[must_use]
    pub fn direct() -> Self {
        Self::Direct(DirectResolver)
    }

    /// Memoized resolution backed by the process-wide resolver.
    #[must_use]
    pub fn memoized() -> Self {
        Self::Memoized(MemoizedResolver::global())
    }

    /// Container resolution. `None` models a missing container.
    #[must_use]
    pub fn container(container: Option<Arc<dyn Container>>) -> Self {
        Self::Container(container.map_or_else(ContainerResolver::unavailable, ContainerResolver::new))
    }
}

impl InstanceResolver for Resolution {
    fn resolve<C: Controller>(&self) -> Result<Arc<C>, ResolveError> {
        match self {
            Self::Direct(resolver) => resolver.resolve(),
            Self::Memoized(resolver) => resolver.resolve(),
            Self::Container(resolver) => resolver.resolve(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
