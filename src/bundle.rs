//! Route bundles: a path prefix plus a middleware stack over a shared
//! [`Router`].
//!
//! A [`Bundle`] never owns routes. Every registration is rewritten with the
//! bundle's prefix, wrapped in the bundle's middleware, and handed to the
//! router. Deriving a bundle ([`group`], [`mount`], [`with`]) copies the
//! middleware list at that moment, so parent and child evolve independently
//! while still sharing the router.
//!
//! ```rust
//! use sheaf::{Bundle, Request, Router, middleware};
//!
//! async fn list(_req: Request) -> &'static str { "[]" }
//! async fn ping(_req: Request) -> &'static str { "pong" }
//!
//! let mut app = Bundle::new(Router::new());
//! app.use_middleware(middleware::trace());
//!
//! let api = app.mount("/api");
//! api.get("/ping", ping);
//!
//! let users = api.mount("/users");
//! users.get("/", list); // answers /api/users and /api/users/
//! ```
//!
//! [`group`]: Bundle::group
//! [`mount`]: Bundle::mount
//! [`with`]: Bundle::with

use std::fmt;
use std::path::PathBuf;

use parking_lot::Once;
use tracing::{debug, error};

use crate::files::StaticFiles;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler, private};
use crate::middleware::Middleware;
use crate::pattern::split_method;
use crate::request::Request;
use crate::router::Router;

/// A path prefix and an ordered middleware stack applied to every route
/// registered through it.
///
/// Used as a [`Handler`] (e.g. passed to [`Server::serve`]), a bundle first
/// registers a catch-all at its own root so unmatched requests also pass
/// through its middleware. See [`dispatch`](Bundle::dispatch).
///
/// [`Server::serve`]: crate::Server::serve
pub struct Bundle {
    router: Router,
    base_path: String,
    middlewares: Vec<Middleware>,
    root: RootRegistration,
}

/// Per-bundle catch-all state. Never shared with derived bundles.
struct RootRegistration {
    once: Once,
    not_found: Option<BoxedHandler>,
    disabled: bool,
}

impl Default for RootRegistration {
    fn default() -> Self {
        Self { once: Once::new(), not_found: None, disabled: false }
    }
}

impl Bundle {
    /// A bundle at the router's root with no middleware.
    pub fn new(router: Router) -> Self {
        Self::mount_at(router, "")
    }

    /// A bundle whose routes all live under `prefix`, with no middleware.
    pub fn mount_at(router: Router, prefix: impl Into<String>) -> Self {
        Self::derive(router, prefix.into(), Vec::new())
    }

    fn derive(router: Router, base_path: String, middlewares: Vec<Middleware>) -> Self {
        Self { router, base_path, middlewares, root: RootRegistration::default() }
    }

    /// Same prefix, independent copy of the middleware stack.
    pub fn group(&self) -> Self {
        Self::derive(self.router.clone(), self.base_path.clone(), self.middlewares.clone())
    }

    /// Prefix extended by `segment`, independent copy of the middleware stack.
    pub fn mount(&self, segment: &str) -> Self {
        Self::derive(
            self.router.clone(),
            format!("{}{segment}", self.base_path),
            self.middlewares.clone(),
        )
    }

    /// Same prefix, with `mw` appended to a copy of the middleware stack.
    /// The receiver is left untouched.
    pub fn with(&self, mw: impl Into<Middleware>) -> Self {
        self.with_all([mw.into()])
    }

    /// [`with`](Bundle::with) for several middleware at once, in order.
    pub fn with_all(&self, mws: impl IntoIterator<Item = Middleware>) -> Self {
        let mut middlewares = self.middlewares.clone();
        middlewares.extend(mws);
        Self::derive(self.router.clone(), self.base_path.clone(), middlewares)
    }

    /// Appends middleware to this bundle's stack. The first middleware added
    /// is the outermost layer. Only routes registered afterwards see it.
    pub fn use_middleware(&mut self, mw: impl Into<Middleware>) -> &mut Self {
        self.middlewares.push(mw.into());
        self
    }

    /// [`use_middleware`](Bundle::use_middleware) for several at once.
    pub fn use_all(&mut self, mws: impl IntoIterator<Item = Middleware>) -> &mut Self {
        self.middlewares.extend(mws);
        self
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    // ── Registration ──────────────────────────────────────────────────────────

    /// Registers `handler` for `pattern` (`"[METHOD ]/path"`) under this
    /// bundle's prefix, wrapped in its middleware.
    ///
    /// The path `/` means the bundle root *exactly*: on a bundle at `/users`
    /// it answers `/users` and `/users/` but not `/users/anything`.
    ///
    /// # Panics
    ///
    /// Panics if the router rejects the rewritten pattern. See
    /// [`Router::handle`].
    pub fn handle(&self, pattern: &str, handler: impl Handler) -> &Self {
        let (method, path) = split_method(pattern);
        let handler = self.wrap(handler.into_boxed_handler());

        if path == "/" {
            if !self.base_path.is_empty() {
                self.register(method, &self.base_path, handler.clone());
            }
            self.register(method, &format!("{}/{{$}}", self.base_path), handler);
        } else {
            self.register(method, &format!("{}{path}", self.base_path), handler);
        }
        self
    }

    /// Same as [`handle`](Bundle::handle); reads better with closures.
    pub fn handle_fn(&self, pattern: &str, handler: impl Handler) -> &Self {
        self.handle(pattern, handler)
    }

    /// Registers the bundle's base path itself, without a trailing slash, so
    /// a request for `/users` is served directly instead of redirected to
    /// `/users/`. An empty `method` accepts every method.
    pub fn handle_root(&self, method: &str, handler: impl Handler) -> &Self {
        let path = if self.base_path.is_empty() {
            "/{$}".to_owned()
        } else {
            self.base_path.clone()
        };
        let method = (!method.is_empty()).then_some(method);
        self.register(method, &path, self.wrap(handler.into_boxed_handler()));
        self
    }

    pub fn get(&self, path: &str, handler: impl Handler) -> &Self {
        self.handle(&format!("GET {path}"), handler)
    }

    pub fn post(&self, path: &str, handler: impl Handler) -> &Self {
        self.handle(&format!("POST {path}"), handler)
    }

    pub fn put(&self, path: &str, handler: impl Handler) -> &Self {
        self.handle(&format!("PUT {path}"), handler)
    }

    pub fn patch(&self, path: &str, handler: impl Handler) -> &Self {
        self.handle(&format!("PATCH {path}"), handler)
    }

    pub fn delete(&self, path: &str, handler: impl Handler) -> &Self {
        self.handle(&format!("DELETE {path}"), handler)
    }

    /// Serves files from `dir` under `path` (`GET`, and so `HEAD`).
    ///
    /// A request for `<prefix><path>/css/site.css` reads `dir/css/site.css`.
    /// Directories serve their `index.html`. Responses carry a weak `ETag`
    /// and honour `If-None-Match`.
    pub fn files(&self, path: &str, dir: impl Into<PathBuf>) -> &Self {
        let mount = path.trim_end_matches('/');
        let prefix = format!("{}{mount}", self.base_path);
        let files = StaticFiles::new(dir, prefix.clone());
        self.register(Some("GET"), &format!("{prefix}/"), self.wrap(files.into_boxed_handler()));
        self
    }

    fn register(&self, method: Option<&str>, path: &str, handler: BoxedHandler) {
        let pattern = match method {
            Some(m) => format!("{m} {path}"),
            None => path.to_owned(),
        };
        self.router.handle(&pattern, handler);
    }

    /// `m1(m2(…mn(handler)…))`: the first middleware added ends up outermost.
    fn wrap(&self, handler: BoxedHandler) -> BoxedHandler {
        self.middlewares.iter().rev().fold(handler, |inner, mw| mw.apply(inner))
    }

    // ── Not-found handling & dispatch ─────────────────────────────────────────

    /// Uses `handler` instead of the router's `404 page not found` for
    /// requests under this bundle that match no route. The last call before
    /// the first [`dispatch`](Bundle::dispatch) wins.
    pub fn not_found_handler(&mut self, handler: impl Handler) -> &mut Self {
        self.root.not_found = Some(handler.into_boxed_handler());
        self
    }

    /// Skips the catch-all registration. Unmatched requests then get the
    /// router's own answers (`404`, or `405` for a known path under another
    /// method) without passing through this bundle's middleware.
    pub fn disable_not_found_handler(&mut self) -> &mut Self {
        self.root.disabled = true;
        self
    }

    /// Handles one request.
    ///
    /// The first call registers a catch-all at `<prefix>/` wrapped in this
    /// bundle's middleware (unless disabled), which is how requests matching
    /// nothing still run the middleware. As a consequence a known path hit
    /// with the wrong method gets the not-found answer, not `405`.
    pub fn dispatch(&self, req: Request) -> BoxFuture {
        self.root.once.call_once(|| self.register_not_found());
        self.router.dispatch(req)
    }

    fn register_not_found(&self) {
        if self.root.disabled {
            return;
        }
        let handler = self.root.not_found.clone().unwrap_or_else(Router::not_found_handler);
        let pattern = format!("{}/", self.base_path);
        match self.router.try_handle(&pattern, self.wrap(handler)) {
            Ok(()) => debug!(pattern, "not-found catch-all registered"),
            // A request is in flight; keep serving with whatever already
            // covers this prefix.
            Err(e) => error!(error = %e, "not-found catch-all not registered"),
        }
    }
}

impl fmt::Debug for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundle")
            .field("base_path", &self.base_path)
            .field("middlewares", &self.middlewares.len())
            .field("not_found_disabled", &self.root.disabled)
            .finish_non_exhaustive()
    }
}

impl ErasedHandler for Bundle {
    fn call(&self, req: Request) -> BoxFuture {
        self.dispatch(req)
    }
}

impl private::Sealed for Bundle {}

impl Handler for Bundle {
    fn into_boxed_handler(self) -> BoxedHandler {
        BoxedHandler::new(self)
    }
}
