//! The request multiplexer.
//!
//! Patterns are `[METHOD ]PATH` (see the pattern table in the crate docs).
//! For each request the most specific matching route wins: segments compare
//! left to right, a literal beating `{param}` beating a remainder match, and
//! on a tie an exact method beats `GET`-serving-`HEAD`, which beats a
//! method-less route.
//!
//! Requests that match nothing are answered in this order:
//!
//! 1. non-canonical path (`//`, `.`, `..`) → `301` to the cleaned path
//! 2. `/dir` when `/dir/` is registered → `301` to `/dir/`
//! 3. path known under other methods → `405` with an `Allow` header
//! 4. otherwise → `404 page not found`

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use http::header::{ALLOW, CONTENT_TYPE, LOCATION, X_CONTENT_TYPE_OPTIONS};
use http::{HeaderValue, Method, StatusCode};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler, private};
use crate::pattern::{Pattern, clean_path, path_segments};
use crate::request::Request;
use crate::response::Response;

struct Route {
    pattern: Pattern,
    handler: BoxedHandler,
}

/// The application router.
///
/// `Router` is a cheap handle: clones share one route table. That is how
/// every [`Bundle`](crate::Bundle) derived from another registers into the
/// same place. The table sits behind a read-write lock, so routes may be
/// added while requests are being served (the lazy not-found registration
/// relies on it), though normally everything is registered at startup.
#[derive(Clone, Default)]
pub struct Router {
    routes: Arc<RwLock<Vec<Route>>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a pattern. Returns `&self` for chaining.
    ///
    /// ```rust
    /// # use sheaf::{Request, Response, Router};
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// # async fn create_user(_: Request) -> Response { Response::text("") }
    /// # async fn assets(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .handle("GET /users/{id}", get_user)
    ///     .handle("POST /users", create_user)
    ///     .handle("/assets/", assets);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the pattern is malformed or conflicts with one already
    /// registered. Routes are registered at startup; a bad one is a bug.
    pub fn handle(&self, pattern: &str, handler: impl Handler) -> &Self {
        self.try_handle(pattern, handler).unwrap_or_else(|e| panic!("{e}"));
        self
    }

    /// Fallible form of [`handle`](Router::handle).
    pub fn try_handle(&self, pattern: &str, handler: impl Handler) -> Result<(), Error> {
        let pattern = Pattern::parse(pattern)?;
        let mut routes = self.routes.write();
        if let Some(existing) = routes.iter().find(|r| r.pattern.same_shape(&pattern)) {
            return Err(Error::Conflict {
                pattern: pattern.as_str().to_owned(),
                existing: existing.pattern.as_str().to_owned(),
            });
        }
        debug!(pattern = pattern.as_str(), "route registered");
        routes.push(Route { pattern, handler: handler.into_boxed_handler() });
        Ok(())
    }

    /// Registered patterns, in registration order.
    pub fn patterns(&self) -> Vec<String> {
        self.routes.read().iter().map(|r| r.pattern.as_str().to_owned()).collect()
    }

    /// The responder used when nothing matches: `404`, body
    /// `404 page not found`.
    pub fn not_found_handler() -> BoxedHandler {
        not_found.into_boxed_handler()
    }

    /// Routes one request.
    ///
    /// Matching happens synchronously; the returned future only runs the
    /// chosen handler.
    pub fn dispatch(&self, mut req: Request) -> BoxFuture {
        let path = req.path().to_owned();

        // Asterisk-form targets (`OPTIONS *`) have no path to clean or route.
        let Some(parts) = path_segments(&path) else {
            return ready(Response::status(StatusCode::BAD_REQUEST));
        };
        if req.method() != Method::CONNECT {
            let cleaned = clean_path(&path);
            if cleaned != path {
                return ready(redirect(&cleaned, req.query()));
            }
        }

        let routes = self.routes.read();
        let best = best_match(&routes, req.method(), &parts);

        if !best.as_ref().is_some_and(|(_, exact, _)| *exact) && !path.ends_with('/') {
            let slashed = format!("{path}/");
            if let Some(parts) = path_segments(&slashed) {
                if let Some((_, true, _)) = best_match(&routes, req.method(), &parts) {
                    return ready(redirect(&slashed, req.query()));
                }
            }
        }

        if let Some((route, _, params)) = best {
            let handler = route.handler.clone();
            drop(routes);
            req.params = params.into_iter().collect::<HashMap<_, _>>();
            return handler.call(req);
        }

        let allowed = allowed_methods(&routes, &parts);
        drop(routes);
        if allowed.is_empty() {
            return not_found.into_boxed_handler().call(req);
        }
        ready(method_not_allowed(&allowed))
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").field("patterns", &self.patterns()).finish()
    }
}

impl ErasedHandler for Router {
    fn call(&self, req: Request) -> BoxFuture {
        self.dispatch(req)
    }
}

impl private::Sealed for Router {}

impl Handler for Router {
    fn into_boxed_handler(self) -> BoxedHandler {
        BoxedHandler::new(self)
    }
}

// ── Matching ──────────────────────────────────────────────────────────────────

/// The most specific route for `method` + `parts`, whether it matched
/// exactly, and its captured parameters.
fn best_match<'r>(
    routes: &'r [Route],
    method: &Method,
    parts: &[&str],
) -> Option<(&'r Route, bool, Vec<(String, String)>)> {
    let mut best: Option<(&Route, u8, bool, Vec<(String, String)>)> = None;
    for route in routes {
        let Some(method_rank) = route.pattern.method_rank(method) else {
            continue;
        };
        let Some(m) = route.pattern.match_path(parts) else {
            continue;
        };
        let better = match &best {
            None => true,
            Some((current, current_rank, _, _)) => {
                match route.pattern.cmp_specificity(&current.pattern) {
                    Ordering::Greater => true,
                    Ordering::Less => false,
                    Ordering::Equal => method_rank > *current_rank,
                }
            }
        };
        if better {
            best = Some((route, method_rank, m.exact, m.params));
        }
    }
    best.map(|(route, _, exact, params)| (route, exact, params))
}

/// Methods of routes whose path matches, for the `Allow` header.
fn allowed_methods(routes: &[Route], parts: &[&str]) -> BTreeSet<String> {
    let mut allowed = BTreeSet::new();
    for route in routes {
        let Some(method) = route.pattern.method() else {
            continue;
        };
        if route.pattern.match_path(parts).is_some() {
            if method == Method::GET {
                allowed.insert(Method::HEAD.to_string());
            }
            allowed.insert(method.to_string());
        }
    }
    allowed
}

// ── Built-in responses ────────────────────────────────────────────────────────

async fn not_found(_req: Request) -> Response {
    let mut res = Response::builder()
        .status(StatusCode::NOT_FOUND)
        .text("404 page not found\n");
    res.headers_mut().insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    res
}

fn method_not_allowed(allowed: &BTreeSet<String>) -> Response {
    let allow = allowed.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
    let mut res = Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .text("Method Not Allowed\n");
    if let Ok(value) = HeaderValue::from_str(&allow) {
        res.headers_mut().insert(ALLOW, value);
    }
    res.headers_mut().insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    res
}

fn redirect(path: &str, query: Option<&str>) -> Response {
    let location = match query {
        Some(q) => format!("{path}?{q}"),
        None => path.to_owned(),
    };
    let mut res = Response::status(StatusCode::MOVED_PERMANENTLY);
    match HeaderValue::from_str(&location) {
        Ok(value) => {
            res.headers_mut().insert(LOCATION, value);
        }
        Err(_) => return Response::status(StatusCode::BAD_REQUEST),
    }
    res.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    res
}

fn ready(res: Response) -> BoxFuture {
    Box::pin(std::future::ready(res))
}
