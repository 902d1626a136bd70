//! Per-request tracing span with method, path, status and latency.

use std::time::Instant;

use tracing::{Instrument, info, info_span};

use super::{Middleware, Next, from_fn};
use crate::request::Request;

/// A middleware that runs the rest of the chain inside a `request` span and
/// logs one `info` event when the response is ready.
///
/// Add it first so the latency covers every other layer.
pub fn trace() -> Middleware {
    from_fn(|req: Request, next: Next| async move {
        let span = info_span!("request", method = %req.method(), path = %req.path());
        let started = Instant::now();
        let res = next.run(req).instrument(span.clone()).await;
        span.in_scope(|| {
            info!(
                status = res.status_code().as_u16(),
                latency_us = started.elapsed().as_micros() as u64,
                "request completed"
            );
        });
        res
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    use crate::handler::Handler;

    #[tokio::test]
    async fn passes_the_response_through_untouched() {
        let inner = (|_req: Request| async { (StatusCode::CREATED, "made") }).into_boxed_handler();
        let res = trace().apply(inner).call(Request::get("/things")).await;
        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.body(), b"made");
    }
}
