//! The success/error result of a database operation.
//!
//! Distinct from [`wordlette_core::Nullable`]: a `DbStatus` carries either
//! a result payload or the captured engine error. Drivers never let an
//! engine error propagate as a panic or a `Result::Err`; callers branch on
//! the returned status. An empty query result is a *success* with an empty
//! list, not an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("database engine error: {0}")]
    Engine(String),

    #[error("driver is not connected")]
    NotConnected,

    #[error("malformed query: {0}")]
    MalformedQuery(String),

    #[error("model `{table}` has no usable column layout")]
    NoColumns { table: String },
}

// Total equality by rendered message; two errors with the same story
// compare equal regardless of variant internals.
impl PartialEq for DriverError {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

#[derive(Debug)]
pub enum DbStatus<T> {
    Success(T),
    Error(DriverError),
}

impl<T> DbStatus<T> {
    /// Truthiness: `Success` regardless of payload, including empty lists
    /// and zeros.
    pub fn is_success(&self) -> bool {
        matches!(self, DbStatus::Success(_))
    }

    pub fn is_error(&self) -> bool {
        !self.is_success()
    }

    pub fn ok(self) -> Option<T> {
        match self {
            DbStatus::Success(v) => Some(v),
            DbStatus::Error(_) => None,
        }
    }

    pub fn err(self) -> Option<DriverError> {
        match self {
            DbStatus::Success(_) => None,
            DbStatus::Error(e) => Some(e),
        }
    }

    pub fn unwrap_or(self, default: T) -> T {
        self.ok().unwrap_or(default)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> DbStatus<U> {
        match self {
            DbStatus::Success(v) => DbStatus::Success(f(v)),
            DbStatus::Error(e) => DbStatus::Error(e),
        }
    }
}

// Total, non-raising equality: statuses of different kinds are simply
// unequal; payloads and errors compare only within their own kind.
impl<T: PartialEq> PartialEq for DbStatus<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DbStatus::Success(a), DbStatus::Success(b)) => a == b,
            (DbStatus::Error(a), DbStatus::Error(b)) => a == b,
            _ => false,
        }
    }
}

/// Run a fallible engine call, converting its error into a status.
pub fn capture<T, E: std::fmt::Display>(
    result: std::result::Result<T, E>,
) -> DbStatus<T> {
    match result {
        Ok(v) => DbStatus::Success(v),
        Err(e) => DbStatus::Error(DriverError::Engine(e.to_string())),
    }
}
