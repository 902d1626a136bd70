//! Middleware layer.
//!
//! A middleware is a function from handler to handler: it receives the
//! [`BoxedHandler`] it wraps and returns a new one that runs code before
//! and/or after calling it, or decides not to call it at all (answering an
//! unauthorised request, say). That shape makes the right place for
//! cross-cutting concerns: tracing, request ids, auth, response headers.
//!
//! Two ways to write one:
//!
//! ```rust
//! use sheaf::{BoxedHandler, Request, Response, middleware};
//! use sheaf::middleware::Next;
//! use http::StatusCode;
//!
//! // 1. async fn taking the request and the rest of the chain
//! let auth = middleware::from_fn(|req: Request, next: Next| async move {
//!     if req.header("authorization").is_none() {
//!         return Response::status(StatusCode::UNAUTHORIZED);
//!     }
//!     next.run(req).await
//! });
//!
//! // 2. a plain handler transform
//! fn passthrough(inner: BoxedHandler) -> BoxedHandler { inner }
//! let noop = middleware::layer(passthrough);
//! ```
//!
//! Bundles compose their middleware so that the first one added is the
//! outermost layer: it sees the request first and the response last.

mod trace;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::request::Request;
use crate::response::IntoResponse;

pub use trace::trace;

/// A handler transform, shareable between bundles.
///
/// Any `Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static` converts
/// into one with `.into()`; bundle methods accept either.
#[derive(Clone)]
pub struct Middleware(Arc<dyn Fn(BoxedHandler) -> BoxedHandler + Send + Sync>);

impl Middleware {
    /// Wraps `inner`.
    pub fn apply(&self, inner: BoxedHandler) -> BoxedHandler {
        (self.0)(inner)
    }
}

impl<F> From<F> for Middleware
where
    F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Middleware")
    }
}

/// Builds a middleware from a plain handler transform. Same as `f.into()`.
pub fn layer<F>(f: F) -> Middleware
where
    F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
{
    Middleware::from(f)
}

/// The rest of the chain, as seen from a [`from_fn`] middleware.
#[derive(Clone, Debug)]
pub struct Next {
    inner: BoxedHandler,
}

impl Next {
    /// Runs the inner middleware and, eventually, the route handler.
    pub fn run(self, req: Request) -> BoxFuture {
        self.inner.call(req)
    }
}

/// Builds a middleware from an async function of the request and [`Next`].
///
/// Not calling `next.run` short-circuits the chain: nothing inside runs.
pub fn from_fn<F, Fut, R>(f: F) -> Middleware
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    let f = Arc::new(f);
    Middleware::from(move |inner: BoxedHandler| {
        let f = Arc::clone(&f);
        let layer = move |req: Request| f(req, Next { inner: inner.clone() });
        layer.into_boxed_handler()
    })
}
