// Error types for the Wordlette core

use thiserror::Error;

/// Boxed error type used for user-supplied hook and handler failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no value present")]
    NoValue {
        #[source]
        cause: Option<BoxError>,
    },

    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    #[error("route not found: {0}")]
    RouteNotFound(String),

    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("route declares no request handlers")]
    NoRouteHandlers,

    #[error("cannot register inconsistent handler types: {0}")]
    InconsistentHandlers(String),

    #[error("no form compatible with the submitted fields")]
    NoCompatibleForm,

    #[error("missing parameter `{param}` for route `{route}`")]
    MissingRouteParam { route: String, param: String },

    #[error("unknown route name: {0}")]
    UnknownRoute(String),

    #[error("transition from {from} to {to} is impossible")]
    TransitionImpossible { from: String, to: String },

    #[error("transition from {from} to {to} failed")]
    TransitionFailed {
        from: String,
        to: String,
        #[source]
        source: BoxError,
    },

    #[error("no database driver registered under `{0}`")]
    UnknownDriver(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("handler error: {0}")]
    Handler(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The HTTP status an unrecovered error should render as.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::RouteNotFound(_) | Error::UnknownRoute(_) => 404,
            Error::MethodNotAllowed(_) => 405,
            Error::NoCompatibleForm => 400,
            _ => 500,
        }
    }

    /// The kind used to match registered error handlers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoValue { .. } => ErrorKind::NoValue,
            Error::ProviderNotFound(_) => ErrorKind::ProviderNotFound,
            Error::RouteNotFound(_) => ErrorKind::RouteNotFound,
            Error::MethodNotAllowed(_) => ErrorKind::MethodNotAllowed,
            Error::NoRouteHandlers => ErrorKind::NoRouteHandlers,
            Error::InconsistentHandlers(_) => ErrorKind::InconsistentHandlers,
            Error::NoCompatibleForm => ErrorKind::NoCompatibleForm,
            Error::MissingRouteParam { .. } => ErrorKind::MissingRouteParam,
            Error::UnknownRoute(_) => ErrorKind::UnknownRoute,
            Error::TransitionImpossible { .. } => ErrorKind::TransitionImpossible,
            Error::TransitionFailed { .. } => ErrorKind::TransitionFailed,
            Error::UnknownDriver(_) => ErrorKind::UnknownDriver,
            Error::Config(_) => ErrorKind::Config,
            Error::Handler(_) => ErrorKind::Handler,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Discriminant of [`Error`], used to key per-route error handlers.
///
/// `Any` is a registration-only wildcard matching every error kind; an
/// exact-kind handler always wins over a wildcard one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoValue,
    ProviderNotFound,
    RouteNotFound,
    MethodNotAllowed,
    NoRouteHandlers,
    InconsistentHandlers,
    NoCompatibleForm,
    MissingRouteParam,
    UnknownRoute,
    TransitionImpossible,
    TransitionFailed,
    UnknownDriver,
    Config,
    Handler,
    Internal,
    Any,
}
