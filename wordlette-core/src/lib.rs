//! Wordlette core: the lifecycle state machine, the dependency container,
//! and the route dispatch layer.
//!
//! The application boot sequence drives a [`machine::StateMachine`] forward;
//! each state's `enter` hook requests its collaborators from the
//! [`container::Container`] and performs one side effect (registering
//! routes, connecting a database) before signaling the next transition.

pub mod container;
pub mod error;
pub mod http;
pub mod machine;
pub mod nullable;
pub mod route;
pub mod router;

pub use container::Container;
pub use error::{BoxError, Error, ErrorKind};
pub use http::{HttpRequest, HttpResponse};
pub use machine::{
    Predicate, State, StateBehavior, StateMachine, StateMachineBuilder, StateOutcome, always,
    predicate,
};
pub use nullable::Nullable;
pub use route::{
    ErrorHandlerFn, FormHandlerFn, FormSpec, RequestHandlerFn, RequestKind, RouteBuilder,
    RouteTable, error_handler, form_handler, request_handler,
};
pub use router::{ErrorPageFn, Router};
