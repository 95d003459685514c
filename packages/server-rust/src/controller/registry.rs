use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use super::resolver::{Container, SharedInstance};

// ---------------------------------------------------------------------------
// TypeRegistry
// ---------------------------------------------------------------------------

/// Minimal type-keyed [`Container`]: one shared instance per type.
///
/// Instances are registered up front (typically at startup) and handed out
/// by `TypeId`. Registering a type again replaces the earlier instance.
/// Registration order is kept for diagnostics.
pub struct TypeRegistry {
    /// Type-based lookup: `TypeId` -> `Arc<dyn Any + Send + Sync>`.
    by_type: DashMap<TypeId, SharedInstance>,
    /// Type names in registration order.
    order: RwLock<Vec<&'static str>>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_type: DashMap::new(),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Registers `value` and returns the shared handle stored for it.
    pub fn register<T: Any + Send + Sync>(&self, value: T) -> Arc<T> {
        let arc = Arc::new(value);
        self.register_arc(Arc::clone(&arc));
        arc
    }

    /// Registers an already shared instance.
    pub fn register_arc<T: Any + Send + Sync>(&self, value: Arc<T>) {
        let previous = self.by_type.insert(TypeId::of::<T>(), value);
        if previous.is_none() {
            self.order.write().push(type_name::<T>());
        }
    }

    /// Retrieve an instance by its concrete type.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.by_type
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.value().clone().downcast::<T>().ok())
    }

    #[must_use]
    pub fn contains<T: Any>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    /// Registered type names, in first-registration order.
    #[must_use]
    pub fn registered(&self) -> Vec<&'static str> {
        self.order.read().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Container for TypeRegistry {
    fn resolve_any(&self, type_id: TypeId) -> Option<SharedInstance> {
        self.by_type.get(&type_id).map(|entry| Arc::clone(entry.value()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Mailer {
        from: &'static str,
    }

    struct Clock;

    #[test]
    fn register_and_get_by_type() {
        let registry = TypeRegistry::new();
        registry.register(Mailer { from: "noreply" });

        let mailer = registry.get::<Mailer>();
        assert!(mailer.is_some());
        assert_eq!(mailer.unwrap().from, "noreply");
    }

    #[test]
    fn get_by_type_unregistered_returns_none() {
        let registry = TypeRegistry::new();
        assert!(registry.get::<Clock>().is_none());
        assert!(!registry.contains::<Clock>());
    }

    #[test]
    fn register_returns_the_stored_instance() {
        let registry = TypeRegistry::new();
        let stored = registry.register(Clock);
        assert!(Arc::ptr_eq(&stored, &registry.get::<Clock>().unwrap()));
    }

    #[test]
    fn re_registering_replaces_without_duplicating_order() {
        let registry = TypeRegistry::new();
        registry.register(Mailer { from: "a" });
        registry.register(Clock);
        registry.register(Mailer { from: "b" });

        assert_eq!(registry.get::<Mailer>().unwrap().from, "b");
        assert_eq!(registry.len(), 2);
        let order = registry.registered();
        assert_eq!(order.len(), 2);
        assert!(order[0].ends_with("Mailer"));
        assert!(order[1].ends_with("Clock"));
    }

    #[test]
    fn resolve_any_serves_as_container() {
        let registry = TypeRegistry::new();
        registry.register(Clock);
        assert!(registry.resolve_any(TypeId::of::<Clock>()).is_some());
        assert!(registry.resolve_any(TypeId::of::<Mailer>()).is_none());
    }
}
