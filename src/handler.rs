//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The [`Router`](crate::Router) holds handlers of *different* types in one
//! table, and middleware has to accept and return "some handler" without
//! knowing which. Both needs are met by hiding the concrete handler type
//! behind a trait object and passing [`BoxedHandler`] around.
//!
//! ```text
//! async fn hello(req: Request) -> Response { … }   ← user writes this
//!        ↓ bundle.get("/", hello)
//! hello.into_boxed_handler()                       ← Handler blanket impl
//!        ↓
//! BoxedHandler(Arc::new(FnHandler(hello)))         ← heap-allocated wrapper
//!        ↓ middleware: BoxedHandler -> BoxedHandler (zero or more times)
//! handler.call(req)  at request time               ← one vtable dispatch per layer
//!        ↓
//! Box::pin(async { hello(req).await.into_response() })  ← BoxFuture
//! ```
//!
//! Cloning a [`BoxedHandler`] is one atomic reference-count increment; the
//! handler itself is never copied.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Erased types ──────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future that resolves to a [`Response`].
///
/// `Send + 'static` lets tokio move the future across worker threads.
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` because it appears inside [`BoxedHandler`], which
/// middleware authors handle directly. Implement [`Handler`] instead.
#[doc(hidden)]
pub trait ErasedHandler: Send + Sync + 'static {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
///
/// This is what middleware receives and returns.
#[derive(Clone)]
pub struct BoxedHandler(Arc<dyn ErasedHandler>);

impl BoxedHandler {
    pub(crate) fn new(inner: impl ErasedHandler) -> Self {
        Self(Arc::new(inner))
    }

    /// Runs the handler for one request.
    pub fn call(&self, req: Request) -> BoxFuture {
        self.0.call(req)
    }
}

impl fmt::Debug for BoxedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BoxedHandler")
    }
}

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is satisfied by:
///
/// - any `async fn name(req: Request) -> impl IntoResponse` (and closures of
///   the same shape)
/// - [`BoxedHandler`], so wrapped handlers can be registered again
/// - [`Router`](crate::Router) and [`Bundle`](crate::Bundle), so a whole
///   route table can be served or nested
///
/// The trait is **sealed** (via the crate-private `Sealed` supertrait).
pub trait Handler: private::Sealed + Send + Sync + 'static {
    /// Erases the handler's type. Middleware written as a plain
    /// `BoxedHandler -> BoxedHandler` function uses this to return the
    /// closure it builds around `inner`.
    fn into_boxed_handler(self) -> BoxedHandler;
}

/// The sealing module. `Sealed` is nameable inside the crate only, so other
/// crates cannot implement `Handler` on their own types.
pub(crate) mod private {
    pub trait Sealed {}
}

// ── Implementations ───────────────────────────────────────────────────────────

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        BoxedHandler::new(FnHandler(self))
    }
}

impl private::Sealed for BoxedHandler {}

impl Handler for BoxedHandler {
    fn into_boxed_handler(self) -> BoxedHandler {
        self
    }
}

/// Newtype wrapper that holds a concrete handler `F` and implements
/// [`ErasedHandler`], bridging the typed world to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}
