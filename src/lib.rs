//! Wordlette: a small web framework core built around three ideas —
//! a predicate-driven lifecycle state machine, type-keyed dependency
//! resolution, and storage drivers that report through status values
//! instead of raising.
//!
//! ```no_run
//! use wordlette::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let mut app = Application::builder()
//!         .config_path("wordlette.toml")
//!         .build()?;
//!     app.start().await?;
//!     assert!(app.is_serving());
//!     app.stop().await
//! }
//! ```

mod app;

pub use app::{Application, ApplicationBuilder};

pub use wordlette_config as config;
pub use wordlette_core as core;
pub use wordlette_db as db;
pub use wordlette_events as events;

pub use wordlette_core::{
    BoxError, Container, Error, ErrorKind, HttpRequest, HttpResponse, Nullable, Router,
    StateMachine, StateOutcome,
};

/// Common imports for application code.
pub mod prelude {
    pub use crate::app::{Application, ApplicationBuilder};
    pub use wordlette_config::{AppSettings, ConfigLoader, DatabaseSettings};
    pub use wordlette_core::machine::{
        State, StateBehavior, StateMachine, StateOutcome, always, predicate,
    };
    pub use wordlette_core::{
        BoxError, Container, Error, ErrorKind, FormSpec, HttpRequest, HttpResponse, Nullable,
        RequestKind, RouteBuilder, RouteTable, Router, error_handler, form_handler,
        request_handler,
    };
    pub use wordlette_db::{
        CompareOp, DatabaseController, DatabaseDriver, DbStatus, DriverRegistry, FieldDef,
        FieldRef, FieldType, Group, ModelRegistry, ModelSchema, Record, ScalarValue, SqliteDriver,
        compare, when,
    };
    pub use wordlette_events::{Event, EventDispatch, ListenerGuard, ListenerHandle};
}
