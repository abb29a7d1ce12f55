//! A tagged value-or-absent container.
//!
//! Functions that "may not find" something return [`Nullable`] instead of
//! raising: callers pattern-match or use the accessors. A `Null` may carry
//! the underlying error that caused the absence, so diagnostics survive the
//! trip across a lookup boundary.

use crate::error::{BoxError, Error};

/// Either a present value or an absence with an optional cause.
#[derive(Debug)]
pub enum Nullable<T> {
    Value(T),
    Null(Option<BoxError>),
}

impl<T> Nullable<T> {
    /// An absence with no recorded cause.
    pub fn null() -> Self {
        Nullable::Null(None)
    }

    /// An absence caused by `err`.
    pub fn null_because(err: impl Into<BoxError>) -> Self {
        Nullable::Null(Some(err.into()))
    }

    /// The payload, or [`Error::NoValue`] wrapping the stored cause.
    pub fn value(self) -> Result<T, Error> {
        match self {
            Nullable::Value(v) => Ok(v),
            Nullable::Null(cause) => Err(Error::NoValue { cause }),
        }
    }

    /// The payload, or `default` when absent.
    pub fn value_or(self, default: T) -> T {
        match self {
            Nullable::Value(v) => v,
            Nullable::Null(_) => default,
        }
    }

    /// The inverse accessor: the stored cause, if any. `None` on `Value`.
    pub fn exception(&self) -> Option<&BoxError> {
        match self {
            Nullable::Value(_) => None,
            Nullable::Null(cause) => cause.as_ref(),
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Nullable::Value(_))
    }

    pub fn is_null(&self) -> bool {
        !self.is_value()
    }

    /// Map the payload, preserving absence and its cause.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Nullable<U> {
        match self {
            Nullable::Value(v) => Nullable::Value(f(v)),
            Nullable::Null(cause) => Nullable::Null(cause),
        }
    }
}

impl<T> From<Option<T>> for Nullable<T> {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => Nullable::Value(v),
            None => Nullable::null(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessor() {
        let n = Nullable::Value(42);
        assert!(n.is_value());
        assert_eq!(n.value().unwrap(), 42);
    }

    #[test]
    fn test_null_is_falsy() {
        let n: Nullable<i32> = Nullable::null();
        assert!(n.is_null());
        assert!(!n.is_value());
        assert!(n.value().is_err());
    }

    #[test]
    fn test_value_or_default() {
        let n: Nullable<&str> = Nullable::null();
        assert_eq!(n.value_or("fallback"), "fallback");
        assert_eq!(Nullable::Value("hit").value_or("fallback"), "hit");
    }

    #[test]
    fn test_null_carries_cause() {
        let n: Nullable<i32> = Nullable::null_because("row missing");
        assert_eq!(n.exception().unwrap().to_string(), "row missing");

        match n.value() {
            Err(Error::NoValue { cause: Some(c) }) => {
                assert_eq!(c.to_string(), "row missing");
            }
            other => panic!("expected NoValue with cause, got {:?}", other),
        }
    }

    #[test]
    fn test_from_option() {
        let some: Nullable<u8> = Some(7).into();
        let none: Nullable<u8> = None.into();
        assert!(some.is_value());
        assert!(none.is_null());
    }

    #[test]
    fn test_map_preserves_absence() {
        let n: Nullable<i32> = Nullable::null_because("gone");
        let mapped = n.map(|v| v * 2);
        assert!(mapped.is_null());
        assert!(mapped.exception().is_some());
    }
}
