//! Static file serving for [`Bundle::files`](crate::Bundle::files).

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use http::header::{ETAG, IF_NONE_MATCH, LOCATION};
use http::{HeaderValue, StatusCode};
use tracing::warn;

use crate::handler::{BoxedHandler, Handler};
use crate::request::Request;
use crate::response::{ContentType, Response};

/// Serves the files under `root` for requests whose path starts with
/// `strip_prefix`.
#[derive(Debug)]
pub(crate) struct StaticFiles {
    root: PathBuf,
    strip_prefix: String,
}

impl StaticFiles {
    pub(crate) fn new(root: impl Into<PathBuf>, strip_prefix: String) -> Self {
        Self { root: root.into(), strip_prefix }
    }

    pub(crate) fn into_boxed_handler(self) -> BoxedHandler {
        let files = Arc::new(self);
        (move |req: Request| {
            let files = Arc::clone(&files);
            async move { files.serve(req).await }
        })
        .into_boxed_handler()
    }

    /// Maps the part of the URL after the prefix onto the filesystem.
    /// `None` for anything that would leave `root`.
    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let mut path = self.root.clone();
        for component in Path::new(url_path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(s) => path.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(path)
    }

    async fn serve(&self, req: Request) -> Response {
        let Some(rest) = req.path().strip_prefix(self.strip_prefix.as_str()) else {
            return Response::status(StatusCode::NOT_FOUND);
        };
        // Decoded before mapping, so `%2e%2e` meets the traversal check as `..`.
        let Ok(rest) = urlencoding::decode(rest) else {
            return Response::status(StatusCode::BAD_REQUEST);
        };
        let Some(mut path) = self.map_path(&rest) else {
            return Response::status(StatusCode::NOT_FOUND);
        };

        let mut meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) => return io_error_response(&path, &e),
        };
        if meta.is_dir() {
            if !req.path().ends_with('/') {
                let location = format!("{}/", req.path());
                return match HeaderValue::from_str(&location) {
                    Ok(value) => {
                        let mut res = Response::status(StatusCode::MOVED_PERMANENTLY);
                        res.headers_mut().insert(LOCATION, value);
                        res
                    }
                    Err(_) => Response::status(StatusCode::BAD_REQUEST),
                };
            }
            path.push("index.html");
            meta = match tokio::fs::metadata(&path).await {
                Ok(meta) => meta,
                Err(e) => return io_error_response(&path, &e),
            };
        }
        if !meta.is_file() {
            return Response::status(StatusCode::NOT_FOUND);
        }

        let etag = etag(&meta);
        if req.header(IF_NONE_MATCH.as_str()).is_some_and(|v| etag_matches(v, &etag)) {
            let mut res = Response::status(StatusCode::NOT_MODIFIED);
            insert_etag(&mut res, &etag);
            return res;
        }

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => return io_error_response(&path, &e),
        };
        let mut res = Response::builder().bytes(content_type(&path), bytes);
        insert_etag(&mut res, &etag);
        res
    }
}

fn content_type(path: &Path) -> ContentType {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "html" | "htm" => ContentType::Html,
        "css" => ContentType::Css,
        "js" | "mjs" => ContentType::Javascript,
        "json" => ContentType::Json,
        "png" => ContentType::Png,
        "svg" => ContentType::Svg,
        "txt" => ContentType::Text,
        "xml" => ContentType::Xml,
        _ => ContentType::OctetStream,
    }
}

/// Weak validator from size and modification time.
fn etag(meta: &std::fs::Metadata) -> String {
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("W/\"{:x}-{:x}\"", meta.len(), mtime)
}

fn etag_matches(header: &str, etag: &str) -> bool {
    let bare = etag.trim_start_matches("W/");
    header
        .split(',')
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate.trim_start_matches("W/") == bare)
}

fn insert_etag(res: &mut Response, etag: &str) {
    if let Ok(value) = HeaderValue::from_str(etag) {
        res.headers_mut().insert(ETAG, value);
    }
}

fn io_error_response(path: &Path, e: &io::Error) -> Response {
    match e.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => Response::status(StatusCode::NOT_FOUND),
        io::ErrorKind::PermissionDenied => Response::status(StatusCode::FORBIDDEN),
        _ => {
            warn!(path = %path.display(), error = %e, "static file read failed");
            Response::status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
