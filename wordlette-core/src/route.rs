//! Per-route handler tables and the dispatch algorithm.
//!
//! A route declares its handlers up front through [`RouteBuilder`]: request
//! handlers keyed by [`RequestKind`], form handlers keyed by a declared
//! field set, and error handlers keyed by [`ErrorKind`]. Building the table
//! validates the declaration, so a misconfigured route fails at startup
//! rather than on its first request.

use crate::error::{Error, ErrorKind};
use crate::http::{HttpRequest, HttpResponse};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// The six request-method categories a handler can claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
}

impl RequestKind {
    /// Classify an HTTP method string.
    pub fn classify(method: &str) -> Result<Self, Error> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Ok(RequestKind::Get),
            "POST" => Ok(RequestKind::Post),
            "PUT" => Ok(RequestKind::Put),
            "DELETE" => Ok(RequestKind::Delete),
            "PATCH" => Ok(RequestKind::Patch),
            "HEAD" => Ok(RequestKind::Head),
            other => Err(Error::MethodNotAllowed(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Get => "GET",
            RequestKind::Post => "POST",
            RequestKind::Put => "PUT",
            RequestKind::Delete => "DELETE",
            RequestKind::Patch => "PATCH",
            RequestKind::Head => "HEAD",
        }
    }
}

pub type RequestHandlerFn =
    Arc<dyn Fn(HttpRequest) -> BoxFuture<'static, Result<HttpResponse, Error>> + Send + Sync>;

pub type FormHandlerFn = Arc<
    dyn Fn(HttpRequest, HashMap<String, String>) -> BoxFuture<'static, Result<HttpResponse, Error>>
        + Send
        + Sync,
>;

pub type ErrorHandlerFn =
    Arc<dyn Fn(HttpRequest, Error) -> BoxFuture<'static, Result<HttpResponse, Error>> + Send + Sync>;

/// Wrap an async request handler closure.
pub fn request_handler<F, Fut>(f: F) -> RequestHandlerFn
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

/// Wrap an async form handler closure.
pub fn form_handler<F, Fut>(f: F) -> FormHandlerFn
where
    F: Fn(HttpRequest, HashMap<String, String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
{
    Arc::new(move |req, fields| Box::pin(f(req, fields)))
}

/// Wrap an async error handler closure.
pub fn error_handler<F, Fut>(f: F) -> ErrorHandlerFn
where
    F: Fn(HttpRequest, Error) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
{
    Arc::new(move |req, err| Box::pin(f(req, err)))
}

/// A form's declared input: its name and required field set.
#[derive(Debug, Clone)]
pub struct FormSpec {
    pub name: String,
    pub fields: Vec<String>,
}

impl FormSpec {
    pub fn new(name: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            name: name.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Whether every required field was submitted.
    fn accepts(&self, submitted: &HashMap<String, String>) -> bool {
        self.fields.iter().all(|f| submitted.contains_key(f))
    }
}

/// Collects a route's handlers; validation happens in [`RouteBuilder::build`].
#[derive(Default)]
pub struct RouteBuilder {
    request_handlers: Vec<(RequestKind, RequestHandlerFn)>,
    form_handlers: Vec<(FormSpec, FormHandlerFn)>,
    error_handlers: Vec<(ErrorKind, ErrorHandlerFn)>,
}

impl RouteBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one request kind.
    pub fn on(mut self, kind: RequestKind, handler: RequestHandlerFn) -> Self {
        self.request_handlers.push((kind, handler));
        self
    }

    /// Register one handler under several request kinds at once.
    pub fn on_any(mut self, kinds: &[RequestKind], handler: RequestHandlerFn) -> Self {
        for kind in kinds {
            self.request_handlers.push((*kind, handler.clone()));
        }
        self
    }

    /// Register a form handler; selection compares the submitted field set
    /// against `spec`.
    pub fn on_form(mut self, spec: FormSpec, handler: FormHandlerFn) -> Self {
        self.form_handlers.push((spec, handler));
        self
    }

    /// Register an error handler for one error kind, or [`ErrorKind::Any`]
    /// as a wildcard.
    pub fn on_error(mut self, kind: ErrorKind, handler: ErrorHandlerFn) -> Self {
        self.error_handlers.push((kind, handler));
        self
    }

    /// Validate and freeze the table.
    ///
    /// A route with no request handlers, or with two handlers claiming the
    /// same request kind, is a configuration error.
    pub fn build(self) -> Result<RouteTable, Error> {
        if self.request_handlers.is_empty() {
            return Err(Error::NoRouteHandlers);
        }

        let mut by_kind: HashMap<RequestKind, RequestHandlerFn> = HashMap::new();
        for (kind, handler) in self.request_handlers {
            if by_kind.insert(kind, handler).is_some() {
                return Err(Error::InconsistentHandlers(format!(
                    "two handlers claim {}",
                    kind.as_str()
                )));
            }
        }

        Ok(RouteTable {
            request_handlers: by_kind,
            form_handlers: self.form_handlers,
            error_handlers: self.error_handlers,
        })
    }
}

/// A route's frozen dispatch table.
pub struct RouteTable {
    request_handlers: HashMap<RequestKind, RequestHandlerFn>,
    form_handlers: Vec<(FormSpec, FormHandlerFn)>,
    error_handlers: Vec<(ErrorKind, ErrorHandlerFn)>,
}

impl RouteTable {
    pub fn builder() -> RouteBuilder {
        RouteBuilder::new()
    }

    /// Dispatch one request through the table.
    ///
    /// Handler failures get exactly one recovery attempt through the error
    /// handlers; a failure inside the chosen error handler propagates.
    pub async fn dispatch(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let kind = RequestKind::classify(&request.method)?;
        debug!(method = kind.as_str(), path = %request.path, "dispatching request");

        match self.invoke(kind, request.clone()).await {
            Ok(response) => Ok(response),
            Err(err) => self.recover(request, err).await,
        }
    }

    async fn invoke(&self, kind: RequestKind, request: HttpRequest) -> Result<HttpResponse, Error> {
        if !self.form_handlers.is_empty() {
            if let Some(fields) = request.form_fields() {
                let index = self.select_form(&fields)?;
                let (spec, handler) = &self.form_handlers[index];
                debug!(form = %spec.name, "form handler selected");
                return handler(request, fields).await;
            }
        }

        let handler = self
            .request_handlers
            .get(&kind)
            .ok_or_else(|| Error::MethodNotAllowed(kind.as_str().to_string()))?;
        handler(request).await
    }

    /// Pick the compatible form with the most matching fields. Exact ties
    /// keep the first-declared form.
    fn select_form(&self, submitted: &HashMap<String, String>) -> Result<usize, Error> {
        let mut best: Option<(usize, usize)> = None;
        for (index, (spec, _)) in self.form_handlers.iter().enumerate() {
            if !spec.accepts(submitted) {
                continue;
            }
            let matched = spec.fields.len();
            match best {
                Some((_, count)) if matched > count => best = Some((index, matched)),
                Some((kept, count)) if matched == count => {
                    warn!(
                        kept = %self.form_handlers[kept].0.name,
                        discarded = %spec.name,
                        fields = matched,
                        "form selection tie, keeping first declared"
                    );
                }
                None => best = Some((index, matched)),
                _ => {}
            }
        }
        best.map(|(index, _)| index).ok_or(Error::NoCompatibleForm)
    }

    /// Exact error kind wins; the wildcard runs only when no exact handler
    /// is registered. No handler means the error propagates unchanged.
    async fn recover(&self, request: HttpRequest, err: Error) -> Result<HttpResponse, Error> {
        let kind = err.kind();
        let handler = self
            .error_handlers
            .iter()
            .find(|(registered, _)| *registered == kind)
            .or_else(|| {
                self.error_handlers
                    .iter()
                    .find(|(registered, _)| *registered == ErrorKind::Any)
            });

        match handler {
            Some((registered, handler)) => {
                debug!(kind = ?registered, "recovering with error handler");
                handler(request, err).await
            }
            None => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(tag: &'static str) -> RequestHandlerFn {
        request_handler(move |_req| async move { Ok(HttpResponse::text(200, tag)) })
    }

    #[test]
    fn test_build_requires_request_handler() {
        let result = RouteTable::builder().build();
        assert!(matches!(result, Err(Error::NoRouteHandlers)));
    }

    #[test]
    fn test_duplicate_kind_rejected() {
        let result = RouteTable::builder()
            .on(RequestKind::Get, tagged("a"))
            .on(RequestKind::Get, tagged("b"))
            .build();
        assert!(matches!(result, Err(Error::InconsistentHandlers(_))));
    }

    #[tokio::test]
    async fn test_get_and_post_dispatch_separately() {
        let table = RouteTable::builder()
            .on(RequestKind::Get, tagged("got"))
            .on(RequestKind::Post, tagged("posted"))
            .build()
            .unwrap();

        let got = table.dispatch(HttpRequest::new("GET", "/")).await.unwrap();
        assert_eq!(got.body_text(), "got");

        let posted = table.dispatch(HttpRequest::new("POST", "/")).await.unwrap();
        assert_eq!(posted.body_text(), "posted");

        let err = table
            .dispatch(HttpRequest::new("PUT", "/"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MethodNotAllowed(_)));
    }

    #[tokio::test]
    async fn test_on_any_registers_each_kind() {
        let table = RouteTable::builder()
            .on_any(&[RequestKind::Get, RequestKind::Head], tagged("either"))
            .build()
            .unwrap();

        let resp = table.dispatch(HttpRequest::new("HEAD", "/")).await.unwrap();
        assert_eq!(resp.body_text(), "either");
    }

    #[tokio::test]
    async fn test_form_selection_prefers_highest_match() {
        let table = RouteTable::builder()
            .on(RequestKind::Post, tagged("plain"))
            .on_form(
                FormSpec::new("login", &["user", "pass"]),
                form_handler(|_req, _fields| async { Ok(HttpResponse::text(200, "login")) }),
            )
            .on_form(
                FormSpec::new("register", &["user", "pass", "email"]),
                form_handler(|_req, _fields| async { Ok(HttpResponse::text(200, "register")) }),
            )
            .build()
            .unwrap();

        let req = HttpRequest::form_submission(
            "/account",
            &[("user", "ada"), ("pass", "x"), ("email", "a@b.c")],
        );
        let resp = table.dispatch(req).await.unwrap();
        assert_eq!(resp.body_text(), "register");

        let req = HttpRequest::form_submission("/account", &[("user", "ada"), ("pass", "x")]);
        let resp = table.dispatch(req).await.unwrap();
        assert_eq!(resp.body_text(), "login");
    }

    #[tokio::test]
    async fn test_form_tie_keeps_first_declared() {
        let table = RouteTable::builder()
            .on(RequestKind::Post, tagged("plain"))
            .on_form(
                FormSpec::new("first", &["a", "b"]),
                form_handler(|_req, _fields| async { Ok(HttpResponse::text(200, "first")) }),
            )
            .on_form(
                FormSpec::new("second", &["c", "d"]),
                form_handler(|_req, _fields| async { Ok(HttpResponse::text(200, "second")) }),
            )
            .build()
            .unwrap();

        let req = HttpRequest::form_submission(
            "/x",
            &[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")],
        );
        let resp = table.dispatch(req).await.unwrap();
        assert_eq!(resp.body_text(), "first");
    }

    #[tokio::test]
    async fn test_incompatible_form_submission_fails() {
        let table = RouteTable::builder()
            .on(RequestKind::Post, tagged("plain"))
            .on_form(
                FormSpec::new("login", &["user", "pass"]),
                form_handler(|_req, _fields| async { Ok(HttpResponse::text(200, "login")) }),
            )
            .build()
            .unwrap();

        let req = HttpRequest::form_submission("/x", &[("unrelated", "1")]);
        let err = table.dispatch(req).await.unwrap_err();
        assert!(matches!(err, Error::NoCompatibleForm));
    }

    #[tokio::test]
    async fn test_error_handler_recovers_once() {
        let table = RouteTable::builder()
            .on(
                RequestKind::Get,
                request_handler(|_req| async { Err(Error::Handler("boom".into())) }),
            )
            .on_error(
                ErrorKind::Handler,
                error_handler(|_req, err| async move {
                    Ok(HttpResponse::text(200, format!("recovered: {err}")))
                }),
            )
            .build()
            .unwrap();

        let resp = table.dispatch(HttpRequest::new("GET", "/")).await.unwrap();
        assert!(resp.body_text().starts_with("recovered"));
    }

    #[tokio::test]
    async fn test_exact_error_kind_beats_wildcard() {
        let table = RouteTable::builder()
            .on(
                RequestKind::Get,
                request_handler(|_req| async { Err(Error::Handler("boom".into())) }),
            )
            .on_error(
                ErrorKind::Any,
                error_handler(|_req, _err| async { Ok(HttpResponse::text(200, "wildcard")) }),
            )
            .on_error(
                ErrorKind::Handler,
                error_handler(|_req, _err| async { Ok(HttpResponse::text(200, "exact")) }),
            )
            .build()
            .unwrap();

        let resp = table.dispatch(HttpRequest::new("GET", "/")).await.unwrap();
        assert_eq!(resp.body_text(), "exact");
    }

    #[tokio::test]
    async fn test_failing_error_handler_propagates() {
        let table = RouteTable::builder()
            .on(
                RequestKind::Get,
                request_handler(|_req| async { Err(Error::Handler("boom".into())) }),
            )
            .on_error(
                ErrorKind::Any,
                error_handler(|_req, _err| async { Err(Error::Internal("worse".into())) }),
            )
            .build()
            .unwrap();

        let err = table
            .dispatch(HttpRequest::new("GET", "/"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[tokio::test]
    async fn test_unrecovered_error_propagates_unchanged() {
        let table = RouteTable::builder()
            .on(
                RequestKind::Get,
                request_handler(|_req| async { Err(Error::Handler("boom".into())) }),
            )
            .build()
            .unwrap();

        let err = table
            .dispatch(HttpRequest::new("GET", "/"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Handler(_)));
    }
}
