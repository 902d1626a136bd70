//! Route pattern parsing and matching.
//!
//! A pattern is `[METHOD ]PATH`. `PATH` is split on `/` into segments:
//!
//! | Segment      | Matches                                                 |
//! |--------------|---------------------------------------------------------|
//! | `users`      | exactly `users`                                         |
//! | `{id}`       | one non-empty segment, captured as `id`                 |
//! | `{rest...}`  | the remainder of the path, possibly empty (last only)   |
//! | trailing `/` | the remainder of the path, anonymously (prefix pattern) |
//! | `{$}`        | only the trailing slash itself (last only)              |
//!
//! So `/static/` matches `/static/` and everything below it, while
//! `/static/{$}` matches `/static/` alone.

use std::cmp::Ordering;

use http::Method;

use crate::error::Error;

/// Splits `"<METHOD> <path>"` into its method token and path.
///
/// Mirrors `^(\S*)\s+(.*)$`: without whitespace the whole pattern is the
/// path. The method token may come back empty (`" /x"`).
pub(crate) fn split_method(pattern: &str) -> (Option<&str>, &str) {
    let Some(ws) = pattern.find(is_space) else {
        return (None, pattern);
    };
    let rest = pattern[ws..].trim_start_matches(is_space);
    // `.` does not cross a newline, so a path containing one leaves the
    // pattern unsplit.
    if rest.contains('\n') {
        return (None, pattern);
    }
    (Some(&pattern[..ws]), rest)
}

/// `\s` in the pattern grammar: ASCII whitespace only.
fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0C' | '\r')
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum Segment {
    Literal(String),
    Param(String),
    /// Remainder match. `None` for the anonymous trailing-slash form.
    Rest(Option<String>),
    /// `{$}`
    EndSlash,
}

impl Segment {
    fn rank(&self) -> u8 {
        match self {
            Self::Literal(_) | Self::EndSlash => 3,
            Self::Param(_) => 2,
            Self::Rest(_) => 1,
        }
    }

    /// Wildcard names erased; two patterns with equal shapes are duplicates.
    fn shape(&self) -> &str {
        match self {
            Self::Literal(s) => s,
            Self::Param(_) => "{}",
            Self::Rest(_) => "{...}",
            Self::EndSlash => "{$}",
        }
    }
}

/// A successful path match.
#[derive(Debug)]
pub(crate) struct PathMatch {
    pub(crate) params: Vec<(String, String)>,
    /// False when a remainder segment swallowed a non-empty tail.
    pub(crate) exact: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct Pattern {
    raw: String,
    method: Option<Method>,
    segments: Vec<Segment>,
}

impl Pattern {
    pub(crate) fn parse(raw: &str) -> Result<Self, Error> {
        if raw.is_empty() {
            return Err(Error::invalid(raw, "empty pattern"));
        }
        let (method, path) = split_method(raw);
        let method = match method {
            None | Some("") => None,
            Some(m) => Some(
                Method::from_bytes(m.as_bytes()).map_err(|_| Error::invalid(raw, "invalid method"))?,
            ),
        };
        if path.is_empty() {
            return Err(Error::invalid(raw, "missing path"));
        }
        let Some(path) = path.strip_prefix('/') else {
            return Err(Error::invalid(raw, "path must begin with `/`"));
        };

        let parts: Vec<&str> = path.split('/').collect();
        let last = parts.len() - 1;
        let mut segments = Vec::with_capacity(parts.len());
        let mut names: Vec<&str> = Vec::new();

        for (i, part) in parts.iter().copied().enumerate() {
            let segment = if part.is_empty() {
                if i != last {
                    return Err(Error::invalid(raw, "empty path segment"));
                }
                Segment::Rest(None)
            } else if part == "." || part == ".." {
                return Err(Error::invalid(raw, "non-canonical path segment"));
            } else if let Some(inner) = part.strip_prefix('{') {
                let Some(inner) = inner.strip_suffix('}') else {
                    return Err(Error::invalid(raw, "wildcard must be a whole segment"));
                };
                if inner == "$" {
                    if i != last {
                        return Err(Error::invalid(raw, "`{$}` must be the last segment"));
                    }
                    Segment::EndSlash
                } else {
                    let (name, rest) = match inner.strip_suffix("...") {
                        Some(name) => (name, true),
                        None => (inner, false),
                    };
                    if !is_ident(name) {
                        return Err(Error::invalid(raw, "bad wildcard name"));
                    }
                    if names.contains(&name) {
                        return Err(Error::invalid(raw, "duplicate wildcard name"));
                    }
                    names.push(name);
                    if rest {
                        if i != last {
                            return Err(Error::invalid(raw, "`{name...}` must be the last segment"));
                        }
                        Segment::Rest(Some(name.to_owned()))
                    } else {
                        Segment::Param(name.to_owned())
                    }
                }
            } else if part.contains(['{', '}']) {
                return Err(Error::invalid(raw, "wildcard must be a whole segment"));
            } else {
                Segment::Literal(part.to_owned())
            };
            segments.push(segment);
        }

        Ok(Self { raw: raw.to_owned(), method, segments })
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.raw
    }

    pub(crate) fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    /// True when both patterns accept exactly the same requests.
    pub(crate) fn same_shape(&self, other: &Self) -> bool {
        self.method == other.method
            && self.segments.len() == other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a.shape() == b.shape())
    }

    /// How well the method matches: exact > `GET` serving `HEAD` > any.
    pub(crate) fn method_rank(&self, method: &Method) -> Option<u8> {
        match &self.method {
            None => Some(0),
            Some(m) if m == method => Some(2),
            Some(m) if m == Method::GET && method == Method::HEAD => Some(1),
            Some(_) => None,
        }
    }

    /// Matches request path segments (the path without its leading `/`,
    /// split on `/`).
    pub(crate) fn match_path(&self, parts: &[&str]) -> Option<PathMatch> {
        let mut params = Vec::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    if parts.get(i) != Some(&lit.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => match parts.get(i) {
                    Some(value) if !value.is_empty() => {
                        params.push((name.clone(), (*value).to_owned()));
                    }
                    _ => return None,
                },
                Segment::EndSlash => {
                    if i + 1 != parts.len() || !parts[i].is_empty() {
                        return None;
                    }
                }
                Segment::Rest(name) => {
                    let tail = parts.get(i..).filter(|t| !t.is_empty())?;
                    let value = tail.join("/");
                    let exact = value.is_empty();
                    if let Some(name) = name {
                        params.push((name.clone(), value));
                    }
                    return Some(PathMatch { params, exact });
                }
            }
        }
        (parts.len() == self.segments.len()).then_some(PathMatch { params, exact: true })
    }

    /// Orders two patterns that matched the same path: `Greater` means
    /// `self` is the more specific one. Leftmost differing segment decides.
    pub(crate) fn cmp_specificity(&self, other: &Self) -> Ordering {
        for (a, b) in self.segments.iter().zip(&other.segments) {
            match a.rank().cmp(&b.rank()) {
                Ordering::Equal => {}
                decided => return decided,
            }
        }
        self.segments.len().cmp(&other.segments.len())
    }
}

fn is_ident(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
}

/// Splits a request path into the segments [`Pattern::match_path`] expects.
/// `None` when the path does not start with `/` (e.g. `OPTIONS *`).
pub(crate) fn path_segments(path: &str) -> Option<Vec<&str>> {
    path.strip_prefix('/').map(|p| p.split('/').collect())
}

/// Canonical form of a request path: no empty, `.` or `..` segments, the
/// trailing slash kept.
pub(crate) fn clean_path(path: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                kept.pop();
            }
            s => kept.push(s),
        }
    }
    if kept.is_empty() {
        return "/".to_owned();
    }
    let mut cleaned = String::with_capacity(path.len());
    for s in kept {
        cleaned.push('/');
        cleaned.push_str(s);
    }
    if path.ends_with('/') {
        cleaned.push('/');
    }
    cleaned
}
