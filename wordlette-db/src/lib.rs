//! Storage layer: query AST, model schemas, drivers and the controller
//! that ties them to configuration.
//!
//! Queries are built explicitly and compiled per driver:
//!
//! ```
//! use wordlette_db::ast::{CompareOp, FieldRef, compare, when};
//! use wordlette_db::model::{FieldDef, FieldType, ModelSchema};
//! use wordlette_db::sql;
//!
//! let schema = ModelSchema::new(
//!     "pages",
//!     vec![
//!         FieldDef::new("id", FieldType::Int),
//!         FieldDef::new("title", FieldType::Text),
//!     ],
//! );
//! let filter = when([compare(FieldRef::new("pages", "title"), CompareOp::Eq, "home")]);
//! let query = sql::select(&schema, Some(&filter)).unwrap();
//! assert_eq!(query.sql, "SELECT * FROM pages WHERE pages.title = ?;");
//! ```

pub mod ast;
pub mod controller;
pub mod driver;
pub mod model;
pub mod registry;
pub mod sql;
pub mod sqlite;
pub mod status;

pub use ast::{
    CompareOp, Comparison, FieldRef, Group, LogicalOp, Operand, ScalarValue, compare, when,
};
pub use controller::DatabaseController;
pub use driver::DatabaseDriver;
pub use model::{FieldDef, FieldType, ModelRegistry, ModelSchema, Record};
pub use registry::DriverRegistry;
pub use sql::{CompiledQuery, CompiledWrite};
pub use sqlite::SqliteDriver;
pub use status::{DbStatus, DriverError, capture};
