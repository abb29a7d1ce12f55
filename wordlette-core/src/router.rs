//! Path-based routing over [`RouteTable`]s.
//!
//! The router matches `/users/:id` style patterns, fills `path_params` and
//! `query_params`, and renders unhandled outcomes through its error-page
//! table: an exact status renderer first, then the status-0 wildcard, then
//! the built-in 404/500 pages.

use crate::error::Error;
use crate::http::{HttpRequest, HttpResponse};
use crate::route::RouteTable;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

/// Renders an error page for a status code and message.
pub type ErrorPageFn = Arc<dyn Fn(u16, &str) -> HttpResponse + Send + Sync>;

struct RouteEntry {
    name: String,
    pattern: String,
    table: Arc<RouteTable>,
}

#[derive(Default)]
pub struct Router {
    routes: Vec<RouteEntry>,
    error_pages: HashMap<u16, ErrorPageFn>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route table under a path pattern and a unique name.
    pub fn add_route(&mut self, path: impl Into<String>, table: RouteTable, name: impl Into<String>) {
        let pattern = path.into();
        let name = name.into();
        debug!(route = %name, pattern = %pattern, "route registered");
        self.routes.push(RouteEntry {
            name,
            pattern,
            table: Arc::new(table),
        });
    }

    /// Register an error-page renderer. Status 0 acts as a wildcard
    /// consulted before the built-in defaults.
    pub fn add_error_page(&mut self, status: u16, renderer: ErrorPageFn) {
        self.error_pages.insert(status, renderer);
    }

    /// Reverse-construct a URL for a named route.
    pub fn url_for(&self, name: &str, params: &HashMap<String, String>) -> Result<String, Error> {
        let entry = self
            .routes
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| Error::UnknownRoute(name.to_string()))?;

        let mut segments = Vec::new();
        for segment in entry.pattern.split('/').filter(|s| !s.is_empty()) {
            match segment.strip_prefix(':') {
                Some(param) => {
                    let value = params.get(param).ok_or_else(|| Error::MissingRouteParam {
                        route: name.to_string(),
                        param: param.to_string(),
                    })?;
                    segments.push(value.clone());
                }
                None => segments.push(segment.to_string()),
            }
        }
        Ok(format!("/{}", segments.join("/")))
    }

    /// Route a request to the first matching pattern and render the
    /// response, falling back to the error pages for unmatched paths and
    /// unrecovered handler errors.
    pub async fn handle(&self, mut request: HttpRequest) -> HttpResponse {
        let (path, query) = match request.path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (request.path.clone(), None),
        };
        if let Some(query) = query {
            request.query_params = parse_query(&query);
        }

        for entry in &self.routes {
            let Some(params) = match_pattern(&entry.pattern, &path) else {
                continue;
            };
            request.path_params = params;
            return match entry.table.dispatch(request).await {
                Ok(response) => response,
                Err(err) => {
                    error!(route = %entry.name, error = %err, "unrecovered handler error");
                    self.render_error(err.status_code(), &err.to_string())
                }
            };
        }

        debug!(path = %path, "no route matched");
        self.render_error(404, &format!("no route matched {path}"))
    }

    fn render_error(&self, status: u16, message: &str) -> HttpResponse {
        if let Some(renderer) = self.error_pages.get(&status) {
            return renderer(status, message);
        }
        if let Some(renderer) = self.error_pages.get(&0) {
            return renderer(status, message);
        }
        match status {
            404 => HttpResponse::html(404, "<h1>404 Not Found</h1>"),
            _ => HttpResponse::html(500, "<h1>500 Internal Server Error</h1>"),
        }
    }
}

/// Match a `:param` pattern against a concrete path.
fn match_pattern(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let pattern_segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if pattern_segments.len() != path_segments.len() {
        return None;
    }

    let mut params = HashMap::new();
    for (expected, actual) in pattern_segments.iter().zip(path_segments.iter()) {
        match expected.strip_prefix(':') {
            Some(param) => {
                params.insert(param.to_string(), actual.to_string());
            }
            None if expected != actual => return None,
            None => {}
        }
    }
    Some(params)
}

fn parse_query(query: &str) -> HashMap<String, String> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).unwrap_or_default();
    pairs.into_iter().collect()
}
