//! A small sheaf app: a traced root bundle, an authenticated `/api` group,
//! static assets and a custom not-found page.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/
//!   curl -i http://localhost:3000/api/users/42 -H 'authorization: Bearer demo'
//!   curl -i -X POST http://localhost:3000/api/users -H 'authorization: Bearer demo' -d '{"name":"alice"}'
//!   curl -i http://localhost:3000/api/users/42          # 401, auth runs first
//!   curl -i http://localhost:3000/nowhere               # custom 404, still traced

use http::StatusCode;
use sheaf::{Bundle, Request, Response, Router, Server, middleware};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut app = Bundle::new(Router::new());
    app.use_middleware(middleware::trace());
    app.not_found_handler(|req: Request| async move {
        let body = format!(r#"{{"error":"no route for {}"}}"#, req.path());
        Response::builder().status(StatusCode::NOT_FOUND).json(body)
    });
    app.handle_root("GET", |_req: Request| async { Response::text("sheaf demo\n") });
    app.files("/assets", "public");

    let api = app.mount("/api").with(middleware::from_fn(require_bearer));
    let users = api.mount("/users");
    users
        .get("/{id}", get_user)
        .post("/", create_user)
        .delete("/{id}", |_req: Request| async { StatusCode::NO_CONTENT });

    if let Err(e) = Server::bind("0.0.0.0:3000").serve(app).await {
        tracing::error!("server error: {e}");
    }
}

async fn require_bearer(req: Request, next: middleware::Next) -> Response {
    let authorized = req.header("authorization").is_some_and(|v| v.starts_with("Bearer "));
    if !authorized {
        return Response::builder()
            .status(StatusCode::UNAUTHORIZED)
            .header("www-authenticate", "Bearer")
            .no_body();
    }
    next.run(req).await
}

async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#))
}

async fn create_user(req: Request) -> Response {
    if req.body().is_empty() {
        return Response::status(StatusCode::BAD_REQUEST);
    }
    Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/api/users/99")
        .json(r#"{"id":"99","name":"new_user"}"#)
}
