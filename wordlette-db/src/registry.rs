//! Name-to-factory table for database drivers.
//!
//! Drivers are registered explicitly during bootstrap; nothing registers
//! itself as a side effect of being linked in.

use std::collections::HashMap;
use std::sync::Arc;

use wordlette_core::Error;

use crate::driver::DatabaseDriver;

type DriverFactory = Arc<dyn Fn() -> Arc<dyn DatabaseDriver> + Send + Sync>;

/// Maps driver names (as they appear in configuration) to constructors.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    factories: HashMap<String, DriverFactory>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn DatabaseDriver> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(driver = %name, "registered database driver");
        self.factories.insert(name, Arc::new(factory));
        self
    }

    /// Instantiate the driver registered under `name`.
    pub fn create(&self, name: &str) -> Result<Arc<dyn DatabaseDriver>, Error> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::UnknownDriver(name.to_string()))?;
        Ok(factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered driver names, sorted for stable output.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}
