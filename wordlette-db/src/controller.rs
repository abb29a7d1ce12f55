//! Session-level coordinator between configuration, drivers and models.

use std::sync::Arc;

use parking_lot::RwLock;

use wordlette_config::DatabaseSettings;
use wordlette_core::Error;

use crate::ast::Group;
use crate::driver::DatabaseDriver;
use crate::model::{ModelRegistry, ModelSchema, Record};
use crate::registry::DriverRegistry;
use crate::status::{DbStatus, DriverError};

/// Owns the active driver and forwards storage operations to it.
///
/// Two failure channels are kept apart: `connect` returns `Err` for
/// configuration mistakes (an unregistered driver name) and
/// `Ok(DbStatus::Error(..))` for engine-level failures. Everything after
/// a successful connect speaks [`DbStatus`] only.
pub struct DatabaseController {
    registry: DriverRegistry,
    settings: DatabaseSettings,
    driver: RwLock<Option<Arc<dyn DatabaseDriver>>>,
}

impl DatabaseController {
    pub fn new(registry: DriverRegistry, settings: DatabaseSettings) -> Self {
        Self {
            registry,
            settings,
            driver: RwLock::new(None),
        }
    }

    pub fn settings(&self) -> &DatabaseSettings {
        &self.settings
    }

    /// Instantiate the configured driver and open its connection.
    pub async fn connect(&self) -> Result<DbStatus<()>, Error> {
        let driver = self.registry.create(&self.settings.driver)?;
        tracing::info!(driver = %self.settings.driver, "connecting database");
        let status = driver.connect(&self.settings).await;
        if status.is_success() {
            *self.driver.write() = Some(driver);
        }
        Ok(status)
    }

    /// Close and drop the active driver, if any.
    pub async fn disconnect(&self) -> DbStatus<()> {
        let driver = self.driver.write().take();
        match driver {
            Some(driver) => driver.disconnect().await,
            None => DbStatus::Success(()),
        }
    }

    pub fn connected(&self) -> bool {
        self.driver
            .read()
            .as_ref()
            .map(|d| d.connected())
            .unwrap_or(false)
    }

    fn active(&self) -> Result<Arc<dyn DatabaseDriver>, DriverError> {
        self.driver
            .read()
            .as_ref()
            .cloned()
            .ok_or(DriverError::NotConnected)
    }

    pub async fn sync_schema(&self, models: &ModelRegistry) -> DbStatus<()> {
        match self.active() {
            Ok(driver) => driver.sync_schema(models).await,
            Err(e) => DbStatus::Error(e),
        }
    }

    pub async fn add(&self, records: &[Record]) -> DbStatus<()> {
        match self.active() {
            Ok(driver) => driver.add(records).await,
            Err(e) => DbStatus::Error(e),
        }
    }

    pub async fn update(&self, records: &[Record]) -> DbStatus<()> {
        match self.active() {
            Ok(driver) => driver.update(records).await,
            Err(e) => DbStatus::Error(e),
        }
    }

    pub async fn delete(&self, records: &[Record]) -> DbStatus<()> {
        match self.active() {
            Ok(driver) => driver.delete(records).await,
            Err(e) => DbStatus::Error(e),
        }
    }

    pub async fn fetch(
        &self,
        schema: &ModelSchema,
        filter: Option<&Group>,
    ) -> DbStatus<Vec<Record>> {
        match self.active() {
            Ok(driver) => driver.fetch(schema, filter).await,
            Err(e) => DbStatus::Error(e),
        }
    }
}

impl std::fmt::Debug for DatabaseController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseController")
            .field("driver", &self.settings.driver)
            .field("connected", &self.connected())
            .finish()
    }
}
