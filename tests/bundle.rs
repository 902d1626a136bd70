//! Bundle behaviour end to end: prefixes, middleware order, derivation and
//! the not-found catch-all, driven through `Bundle::dispatch`.

use std::sync::Arc;

use http::{HeaderName, HeaderValue, Method, StatusCode};
use parking_lot::Mutex;
use sheaf::middleware::{Next, from_fn};
use sheaf::{BoxedHandler, Bundle, Handler, Middleware, Request, Response, Router};

type Log = Arc<Mutex<Vec<String>>>;

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

/// Records entry and exit, so both order and count are visible.
fn recorder(log: &Log, name: &'static str) -> Middleware {
    let log = Arc::clone(log);
    from_fn(move |req: Request, next: Next| {
        let log = Arc::clone(&log);
        async move {
            log.lock().push(format!("{name}>"));
            let res = next.run(req).await;
            log.lock().push(format!("<{name}"));
            res
        }
    })
}

/// Sets `x-<name>: 1` on the way out.
fn header(name: &'static str) -> Middleware {
    Middleware::from(move |inner: BoxedHandler| {
        (move |req: Request| {
            let inner = inner.clone();
            async move {
                let mut res: Response = inner.call(req).await;
                let name = HeaderName::from_bytes(format!("x-{name}").as_bytes()).unwrap();
                res.headers_mut().insert(name, HeaderValue::from_static("1"));
                res
            }
        })
        .into_boxed_handler()
    })
}

async fn ok(_req: Request) -> &'static str {
    "ok"
}

async fn get(bundle: &Bundle, uri: &str) -> Response {
    bundle.dispatch(Request::get(uri)).await
}

fn body(res: &Response) -> &str {
    std::str::from_utf8(res.body()).unwrap()
}

#[tokio::test]
async fn middleware_runs_in_insertion_order_exactly_once() {
    let log = log();
    let mut app = Bundle::new(Router::new());
    app.use_middleware(recorder(&log, "m1"))
        .use_middleware(recorder(&log, "m2"))
        .use_middleware(recorder(&log, "m3"));
    app.get("/test", ok);

    let res = get(&app, "/test").await;
    assert_eq!(body(&res), "ok");
    assert_eq!(*log.lock(), vec!["m1>", "m2>", "m3>", "<m3", "<m2", "<m1"]);
}

#[tokio::test]
async fn middleware_header_and_body_on_a_plain_route() {
    let mut app = Bundle::new(Router::new());
    app.use_middleware(header("mw"));
    app.handle("GET /test", ok);

    let res = get(&app, "/test").await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(body(&res), "ok");
    assert_eq!(res.header("x-mw"), Some("1"));
}

#[tokio::test]
async fn use_after_registration_is_not_retroactive() {
    let mut app = Bundle::new(Router::new());
    app.get("/before", ok);
    app.use_middleware(header("late"));
    app.get("/after", ok);

    assert_eq!(get(&app, "/before").await.header("x-late"), None);
    assert_eq!(get(&app, "/after").await.header("x-late"), Some("1"));
}

#[tokio::test]
async fn nested_mounts_reach_only_the_full_path() {
    let app = Bundle::new(Router::new());
    let v1 = app.mount("/api").mount("/v1");
    v1.get("/ping", |_req: Request| async { "pong" });

    let res = get(&app, "/api/v1/ping").await;
    assert_eq!(body(&res), "pong");

    for elsewhere in ["/ping", "/api/ping", "/v1/ping", "/api/v1/ping/extra"] {
        let res = get(&app, elsewhere).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND, "{elsewhere}");
    }
}

#[tokio::test]
async fn mount_at_prefix_combines_with_mount() {
    let router = Router::new();
    let p1 = Bundle::mount_at(router.clone(), "/outer");
    p1.mount("/inner").get("/x", ok);
    assert_eq!(router.patterns(), vec!["GET /outer/inner/x"]);
}

#[tokio::test]
async fn group_and_mount_copy_the_stack() {
    let log = log();
    let mut parent = Bundle::new(Router::new());
    parent.use_middleware(recorder(&log, "shared"));

    let mut child = parent.group();
    let mounted = parent.mount("/m");
    parent.use_middleware(recorder(&log, "parent-only"));
    child.use_middleware(recorder(&log, "child-only"));

    parent.get("/p", ok);
    child.get("/c", ok);
    mounted.get("/x", ok);

    get(&parent, "/p").await;
    assert_eq!(*log.lock(), vec!["shared>", "parent-only>", "<parent-only", "<shared"]);

    log.lock().clear();
    get(&parent, "/c").await;
    assert_eq!(*log.lock(), vec!["shared>", "child-only>", "<child-only", "<shared"]);

    log.lock().clear();
    get(&parent, "/m/x").await;
    assert_eq!(*log.lock(), vec!["shared>", "<shared"]);
}

#[tokio::test]
async fn with_leaves_the_receiver_alone() {
    let log = log();
    let mut app = Bundle::new(Router::new());
    app.use_middleware(recorder(&log, "outer"));

    let admin = app.with(recorder(&log, "auth"));
    app.get("/public", ok);
    admin.get("/admin", ok);

    get(&app, "/public").await;
    assert_eq!(*log.lock(), vec!["outer>", "<outer"]);

    log.lock().clear();
    get(&app, "/admin").await;
    assert_eq!(*log.lock(), vec!["outer>", "auth>", "<auth", "<outer"]);
}

#[tokio::test]
async fn with_all_appends_in_order_to_a_copy() {
    let log = log();
    let mut app = Bundle::new(Router::new());
    app.use_middleware(recorder(&log, "base"));

    let admin = app.with_all([recorder(&log, "a"), recorder(&log, "b")]);
    admin.get("/admin", ok);
    app.get("/public", ok);

    get(&app, "/admin").await;
    assert_eq!(*log.lock(), vec!["base>", "a>", "b>", "<b", "<a", "<base"]);

    log.lock().clear();
    get(&app, "/public").await;
    assert_eq!(*log.lock(), vec!["base>", "<base"]);
}

#[tokio::test]
async fn use_all_grows_the_stack_in_order() {
    let log = log();
    let mut app = Bundle::new(Router::new());
    app.use_all([recorder(&log, "x"), recorder(&log, "y")])
        .use_middleware(recorder(&log, "z"));
    app.get("/test", ok);

    get(&app, "/test").await;
    assert_eq!(*log.lock(), vec!["x>", "y>", "z>", "<z", "<y", "<x"]);
}

#[tokio::test]
async fn put_and_patch_bind_their_methods() {
    let router = Router::new();
    let items = Bundle::mount_at(router.clone(), "/items");
    items
        .put("/{id}", |_req: Request| async { "put" })
        .patch("/{id}", |_req: Request| async { "patch" });
    assert_eq!(router.patterns(), vec!["PUT /items/{id}", "PATCH /items/{id}"]);

    let res = items.dispatch(Request::new(Method::PUT, "/items/1")).await;
    assert_eq!(body(&res), "put");
    let res = items.dispatch(Request::new(Method::PATCH, "/items/1")).await;
    assert_eq!(body(&res), "patch");
}

#[tokio::test]
async fn deep_derivation_never_duplicates_middleware() {
    let log = log();
    let mut app = Bundle::new(Router::new());
    app.use_middleware(recorder(&log, "a"));
    let leaf = app.group().mount("/x").group().with(recorder(&log, "b")).mount("/y");
    leaf.get("/z", ok);

    get(&app, "/x/y/z").await;
    assert_eq!(*log.lock(), vec!["a>", "b>", "<b", "<a"]);
}

#[tokio::test]
async fn short_circuit_skips_inner_layers_and_handler() {
    let log = log();
    let mut app = Bundle::new(Router::new());
    app.use_middleware(recorder(&log, "outer"));
    app.use_middleware(from_fn(|req: Request, next: Next| async move {
        if req.header("authorization").is_none() {
            return Response::status(StatusCode::UNAUTHORIZED);
        }
        next.run(req).await
    }));
    app.use_middleware(recorder(&log, "inner"));
    app.get("/secret", ok);

    let res = get(&app, "/secret").await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(*log.lock(), vec!["outer>", "<outer"]);

    log.lock().clear();
    let res = app
        .dispatch(Request::get("/secret").with_header("authorization", "Bearer t"))
        .await;
    assert_eq!(body(&res), "ok");
    assert_eq!(*log.lock(), vec!["outer>", "inner>", "<inner", "<outer"]);
}

#[tokio::test]
async fn root_of_a_mounted_bundle_is_exact() {
    let app = Bundle::new(Router::new());
    let users = app.mount("/api/v1/users");
    users.get("/", |_req: Request| async { "index" });
    users.get("/list", |_req: Request| async { "list" });

    let bare = get(&app, "/api/v1/users").await;
    let slashed = get(&app, "/api/v1/users/").await;
    assert_eq!(bare.status_code(), StatusCode::OK);
    assert_eq!(body(&bare), "index");
    assert_eq!(body(&slashed), "index");

    assert_eq!(body(&get(&app, "/api/v1/users/list").await), "list");
    let deeper = get(&app, "/api/v1/users/unknown").await;
    assert_eq!(deeper.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn trailing_slash_subtree_falls_back_but_specific_wins() {
    let app = Bundle::new(Router::new());
    app.handle("/v1/", |_req: Request| async { "tree" });
    app.get("/v1/exact", |_req: Request| async { "exact" });

    assert_eq!(body(&get(&app, "/v1/exact").await), "exact");
    assert_eq!(body(&get(&app, "/v1/deep/er").await), "tree");
}

#[tokio::test]
async fn root_pattern_answers_the_bare_prefix_without_redirect() {
    let app = Bundle::new(Router::new());
    let docs = app.mount("/docs");
    docs.handle("/", |_req: Request| async { "docs" });

    let res = get(&app, "/docs").await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(body(&res), "docs");
}

#[tokio::test]
async fn subtree_root_redirects_unless_handle_root_is_used() {
    let app = Bundle::new(Router::new());
    let tree = app.mount("/tree");
    tree.handle("/leaves/", ok);

    let res = get(&app, "/tree/leaves").await;
    assert_eq!(res.status_code(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(res.header("location"), Some("/tree/leaves/"));

    let leaves = tree.mount("/leaves");
    leaves.handle_root("GET", |_req: Request| async { "direct" });
    let res = get(&app, "/tree/leaves").await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(body(&res), "direct");
}

#[tokio::test]
async fn unmatched_requests_run_the_middleware() {
    let mut app = Bundle::new(Router::new());
    app.use_middleware(header("mw"));
    app.get("/known", ok);

    let res = get(&app, "/unknown").await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(body(&res), "404 page not found\n");
    assert_eq!(res.header("x-mw"), Some("1"));
}

#[tokio::test]
async fn wrong_method_is_not_found_while_catch_all_is_active() {
    let mut app = Bundle::new(Router::new());
    app.use_middleware(header("mw"));
    app.get("/only-get", ok);

    let res = app.dispatch(Request::new(Method::POST, "/only-get")).await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(res.header("x-mw"), Some("1"));
}

#[tokio::test]
async fn custom_not_found_keeps_status_body_and_middleware() {
    let mut app = Bundle::new(Router::new());
    app.use_middleware(header("a")).use_middleware(header("b"));
    app.not_found_handler(|_req: Request| async { (StatusCode::NOT_FOUND, "first") });
    app.not_found_handler(|_req: Request| async { (StatusCode::SERVICE_UNAVAILABLE, "custom") });
    app.get("/known", ok);

    for path in ["/nothing", "/deep/nothing/here"] {
        let res = get(&app, path).await;
        assert_eq!(res.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body(&res), "custom");
        assert_eq!(res.header("x-a"), Some("1"));
        assert_eq!(res.header("x-b"), Some("1"));
    }
}

#[tokio::test]
async fn disabled_not_found_falls_through_without_middleware() {
    let log = log();
    let mut app = Bundle::new(Router::new());
    app.use_middleware(recorder(&log, "mw"));
    app.disable_not_found_handler();
    app.get("/known", ok);
    app.post("/known", ok);

    let res = get(&app, "/unknown").await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(body(&res), "404 page not found\n");
    assert!(log.lock().is_empty());

    let res = app.dispatch(Request::new(Method::DELETE, "/known")).await;
    assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.header("allow"), Some("GET, HEAD, POST"));
}

#[tokio::test]
async fn mounted_bundle_catch_all_covers_only_its_prefix() {
    let router = Router::new();
    let mut api = Bundle::mount_at(router.clone(), "/api");
    api.use_middleware(header("api"));
    api.get("/x", ok);

    let res = get(&api, "/api/missing").await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(res.header("x-api"), Some("1"));

    let res = get(&api, "/elsewhere").await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(res.header("x-api"), None);
}

#[tokio::test]
async fn derived_bundles_get_their_own_guard() {
    let router = Router::new();
    let root = Bundle::new(router.clone());
    let api = root.mount("/api");

    get(&api, "/api/a").await;
    get(&root, "/b").await;
    get(&root, "/c").await;
    get(&api, "/api/d").await;

    assert_eq!(router.patterns(), vec!["/api/", "/"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_dispatch_registers_once() {
    let router = Router::new();
    let mut app = Bundle::new(router.clone());
    app.use_middleware(header("mw"));
    let app = Arc::new(app);

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..64 {
        let app = Arc::clone(&app);
        tasks.spawn(async move { app.dispatch(Request::get(&format!("/missing/{i}"))).await });
    }
    while let Some(res) = tasks.join_next().await {
        let res = res.unwrap();
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(res.header("x-mw"), Some("1"));
    }
    assert_eq!(router.patterns(), vec!["/"]);
}

#[tokio::test]
async fn bundle_nests_as_a_handler() {
    let inner_router = Router::new();
    let mut inner = Bundle::new(inner_router);
    inner.use_middleware(header("inner"));
    inner.get("/hello", ok);

    let outer = Router::new();
    outer.handle("/", inner.into_boxed_handler());

    let res = outer.dispatch(Request::get("/hello")).await;
    assert_eq!(body(&res), "ok");
    assert_eq!(res.header("x-inner"), Some("1"));
}
