// Dependency resolution context
//
// The core never constructs its own singletons: collaborators are registered
// by the application bootstrap and requested by type from this container.

use crate::Error;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, trace};

/// Type-keyed registry of shared application collaborators.
#[derive(Clone, Default)]
pub struct Container {
    entries: Arc<RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>>,
}

impl Container {
    pub fn new() -> Self {
        debug!("creating dependency container");
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register an instance, replacing any previous registration of `T`.
    pub fn register<T: Any + Send + Sync>(&self, instance: T) {
        let name = std::any::type_name::<T>();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(TypeId::of::<T>(), Arc::new(instance));
        debug!(dependency = name, "dependency registered");
    }

    /// Register lazily; the factory runs once, at registration time.
    pub fn register_factory<T: Any + Send + Sync, F>(&self, factory: F)
    where
        F: FnOnce() -> T,
    {
        trace!(
            dependency = std::any::type_name::<T>(),
            "building dependency from factory"
        );
        self.register(factory());
    }

    /// Resolve a previously registered instance of `T`.
    pub fn resolve<T: Any + Send + Sync>(&self) -> Result<Arc<T>, Error> {
        let name = std::any::type_name::<T>();
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());

        let result = entries
            .get(&TypeId::of::<T>())
            .and_then(|any| any.clone().downcast::<T>().ok())
            .ok_or_else(|| Error::ProviderNotFound(name.to_string()));

        match &result {
            Ok(_) => trace!(dependency = name, "dependency resolved"),
            Err(_) => debug!(dependency = name, "dependency not registered"),
        }
        result
    }

    /// Whether an instance of `T` has been registered.
    pub fn has<T: Any + Send + Sync>(&self) -> bool {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.contains_key(&TypeId::of::<T>())
    }

    /// Drop every registration.
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let count = entries.len();
        entries.clear();
        debug!(count, "cleared dependency container");
    }
}
