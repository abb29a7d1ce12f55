//! The driver abstraction every storage backend implements.

use async_trait::async_trait;

use wordlette_config::DatabaseSettings;

use crate::ast::Group;
use crate::model::{ModelRegistry, ModelSchema, Record};
use crate::status::DbStatus;

/// A connected (or connectable) storage backend.
///
/// Every operation reports through [`DbStatus`] rather than an error
/// return: callers branch on the outcome, they never unwind. Drivers are
/// shared behind `Arc`, so all methods take `&self` and implementations
/// manage their own interior locking.
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Open the backing store described by the settings.
    async fn connect(&self, settings: &DatabaseSettings) -> DbStatus<()>;

    /// Close the backing store. Disconnecting an unconnected driver is a
    /// successful no-op.
    async fn disconnect(&self) -> DbStatus<()>;

    /// Whether a connection is currently open.
    fn connected(&self) -> bool;

    /// Create any missing tables for the registered models.
    async fn sync_schema(&self, registry: &ModelRegistry) -> DbStatus<()>;

    /// Insert the given records.
    async fn add(&self, records: &[Record]) -> DbStatus<()>;

    /// Rewrite the given records, matched by primary key.
    async fn update(&self, records: &[Record]) -> DbStatus<()>;

    /// Delete the given records, matched by primary key.
    async fn delete(&self, records: &[Record]) -> DbStatus<()>;

    /// Fetch every record of `schema` matching `filter`, or all of them
    /// when no filter is given.
    async fn fetch(&self, schema: &ModelSchema, filter: Option<&Group>) -> DbStatus<Vec<Record>>;
}

impl std::fmt::Debug for dyn DatabaseDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseDriver").finish_non_exhaustive()
    }
}
