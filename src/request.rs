//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::{Extensions, HeaderMap, Method, Uri};

/// An incoming HTTP request with its body already collected.
///
/// Middleware may rewrite headers or stash values in [`extensions_mut`]
/// before handing the request to the inner handler.
///
/// [`extensions_mut`]: Request::extensions_mut
#[derive(Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    pub(crate) extensions: Extensions,
}

impl Request {
    /// Builds a bodiless request, mostly useful when driving a handler
    /// without a server in front of it.
    ///
    /// # Panics
    ///
    /// Panics if `uri` is not a valid request target.
    pub fn new(method: Method, uri: &str) -> Self {
        let uri: Uri = uri.parse().unwrap_or_else(|e| panic!("invalid uri `{uri}`: {e}"));
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            params: HashMap::new(),
            extensions: Extensions::new(),
        }
    }

    /// Shorthand for `Request::new(Method::GET, uri)`.
    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    /// Replaces the body. Chains.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Appends a header. Chains.
    ///
    /// # Panics
    ///
    /// Panics if `name` or `value` is not a legal header token.
    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        let value = value.parse().unwrap_or_else(|e| panic!("invalid header value for `{name}`: {e}"));
        self.headers.append(name, value);
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn query(&self) -> Option<&str> { self.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    /// Header lookup. Returns `None` for absent or non-UTF-8 values.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns
    /// `Some("42")`. A remainder wildcard `/files/{rest...}` captures
    /// everything after `/files/`, slashes included.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            params: HashMap::new(),
            extensions: parts.extensions,
        }
    }
}
