//! Settings value objects and loading for Wordlette applications.
//!
//! The core only ever consumes fully constructed settings; file format
//! handling stays here at the process boundary.

pub mod error;
pub mod loader;
pub mod settings;

pub use error::{ConfigError, Result};
pub use loader::ConfigLoader;
pub use settings::{AppSettings, DatabaseSettings};
