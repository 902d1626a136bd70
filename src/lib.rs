//! # sheaf
//!
//! Route bundles for a small async HTTP framework: group registrations under
//! a shared path prefix and run an ordered middleware chain around every
//! route in the group, including the requests that match no route at all.
//!
//! ## The pieces
//!
//! - [`Router`]: the multiplexer. `"[METHOD ]/path"` patterns, most
//!   specific match wins, trailing-slash subtrees, `{param}` and
//!   `{rest...}` wildcards, `301` for non-canonical paths, `405` for known
//!   paths under the wrong method.
//! - [`Bundle`]: a prefix plus a middleware stack over a shared `Router`.
//!   `group`, `mount` and `with` derive new bundles; `use_middleware`
//!   grows one. Served as a [`Handler`], a bundle registers a catch-all at
//!   its root once, so unmatched requests still run its middleware.
//! - [`middleware`]: middleware is `BoxedHandler -> BoxedHandler`; helpers
//!   for writing one from an async fn and for request tracing.
//! - [`Server`]: hyper, HTTP/1.1 + HTTP/2, graceful shutdown on SIGTERM.
//!
//! ## Patterns
//!
//! | Pattern              | Matches                                          |
//! |----------------------|--------------------------------------------------|
//! | `GET /users`         | `GET`/`HEAD` of `/users` only                    |
//! | `/users/{id}`        | any method, `/users/42`                          |
//! | `/static/`           | `/static/` and everything below it               |
//! | `/static/{$}`        | `/static/` only                                  |
//! | `/files/{path...}`   | `/files/` and below, remainder captured as `path`|
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use sheaf::{Bundle, Request, Response, Router, Server, middleware};
//! use http::StatusCode;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut app = Bundle::new(Router::new());
//!     app.use_middleware(middleware::trace());
//!
//!     let users = app.mount("/users");
//!     users
//!         .get("/", list_users)
//!         .get("/{id}", get_user)
//!         .post("/", create_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn list_users(_req: Request) -> Response {
//!     Response::json(r#"[{"id":"1"}]"#)
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#))
//! }
//!
//! async fn create_user(req: Request) -> Response {
//!     if req.body().is_empty() {
//!         return Response::status(StatusCode::BAD_REQUEST);
//!     }
//!     Response::builder()
//!         .status(StatusCode::CREATED)
//!         .header("location", "/users/99")
//!         .json(r#"{"id":"99"}"#)
//! }
//! ```

mod bundle;
mod error;
mod files;
mod handler;
mod pattern;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;

pub use bundle::Bundle;
pub use error::Error;
pub use handler::{BoxFuture, BoxedHandler, Handler};
pub use middleware::Middleware;
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
