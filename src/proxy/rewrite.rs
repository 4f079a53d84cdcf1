//! Path rewrite rules.
//!
//! A rule maps a source pattern such as `/api/:path*` onto a destination
//! template such as `http://localhost:9090/api/:path*`. Source segments are
//! literals, `:name` (exactly one segment) or `:name*` (zero or more trailing
//! segments). The incoming query string is carried over to the destination.
//!
//! Captured segments are copied verbatim, empty ones included. A captured
//! `.` or `..` (in any percent-encoded spelling) never matches, and the
//! rewritten path must stay under the destination's literal prefix.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Invalid rewrite rule.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProxyConfigError {
    #[error("rewrite source must start with '/': {0}")]
    RelativeSource(String),

    #[error("catch-all parameter ':{0}*' must be the last source segment")]
    CatchAllNotLast(String),

    #[error("duplicate parameter ':{0}' in rewrite source")]
    DuplicateParam(String),

    #[error("rewrite destination is not an absolute http(s) URL: {0}")]
    InvalidDestination(String),

    #[error("rewrite destination uses ':{0}' which the source does not bind")]
    UnboundParam(String),
}

/// Serialized form of a rule as it appears in configuration.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RewriteConfig {
    pub source: String,
    pub destination: String,
}

impl RewriteConfig {
    /// `/api/:path*` forwarded to the same prefix on the backend.
    pub fn backend_default(backend_url: &str) -> Self {
        Self {
            source: "/api/:path*".to_string(),
            destination: format!("{}/api/:path*", backend_url.trim_end_matches('/')),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    CatchAll(String),
}

/// Piece of a destination template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Text(String),
    Param(String),
    CatchAll(String),
}

/// A parsed rewrite rule.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    source: String,
    segments: Vec<Segment>,
    destination: String,
    template: Vec<Piece>,
    /// Path every rewritten URL must stay under; empty means any path.
    prefix: String,
}

impl RewriteRule {
    pub fn new(source: &str, destination: &str) -> Result<Self, ProxyConfigError> {
        if !source.starts_with('/') {
            return Err(ProxyConfigError::RelativeSource(source.to_string()));
        }

        let mut segments = Vec::new();
        let raw: Vec<&str> = split_path(source).collect();
        for (idx, part) in raw.iter().enumerate() {
            let segment = match part.strip_prefix(':') {
                Some(name) => match name.strip_suffix('*') {
                    Some(name) => {
                        if idx + 1 != raw.len() {
                            return Err(ProxyConfigError::CatchAllNotLast(name.to_string()));
                        }
                        Segment::CatchAll(name.to_string())
                    }
                    None => Segment::Param(name.to_string()),
                },
                None => Segment::Literal((*part).to_string()),
            };
            if let Some(name) = param_name(&segment) {
                if segments.iter().any(|s| param_name(s) == Some(name)) {
                    return Err(ProxyConfigError::DuplicateParam(name.to_string()));
                }
            }
            segments.push(segment);
        }

        let parsed = Url::parse(destination)
            .map_err(|_| ProxyConfigError::InvalidDestination(destination.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(ProxyConfigError::InvalidDestination(destination.to_string()));
        }
        let template = parse_template(destination);
        for piece in &template {
            if let Piece::Param(name) | Piece::CatchAll(name) = piece {
                if !segments.iter().any(|s| param_name(s) == Some(name.as_str())) {
                    return Err(ProxyConfigError::UnboundParam(name.clone()));
                }
            }
        }
        let prefix = literal_prefix(&template);

        Ok(Self {
            source: source.to_string(),
            segments,
            destination: destination.to_string(),
            template,
            prefix,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Rewrite `path` (and `query`, without the leading `?`) if it matches.
    pub fn apply(&self, path: &str, query: Option<&str>) -> Option<Url> {
        let captures = self.capture(path)?;

        let mut target = self.render(&captures);
        if path.len() > 1 && path.ends_with('/') {
            let (head, tail) = split_query(&target);
            if !head.ends_with('/') {
                target = format!("{head}/{tail}");
            }
        }

        let mut url = Url::parse(&target).ok()?;
        if !is_within(url.path(), &self.prefix) {
            return None;
        }
        if let Some(q) = query {
            let merged = match url.query() {
                Some(existing) if !existing.is_empty() && !q.is_empty() => {
                    format!("{existing}&{q}")
                }
                Some(existing) if !existing.is_empty() => existing.to_string(),
                _ => q.to_string(),
            };
            url.set_query(Some(&merged));
        }
        Some(url)
    }

    /// Destination with captures substituted in a single pass, so captured
    /// text is never itself read as a parameter.
    fn render(&self, captures: &HashMap<String, String>) -> String {
        let mut out = String::with_capacity(self.destination.len());
        for piece in &self.template {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Param(name) => {
                    out.push_str(captures.get(name).map_or("", String::as_str));
                }
                Piece::CatchAll(name) => match captures.get(name).filter(|v| !v.is_empty()) {
                    Some(value) => out.push_str(value),
                    // An empty catch-all takes its leading slash with it.
                    None => {
                        if out.ends_with('/') {
                            out.pop();
                        }
                    }
                },
            }
        }
        out
    }

    fn capture(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = path.strip_prefix('/').unwrap_or(path).split('/').collect();
        let mut captures = HashMap::new();
        let mut idx = 0;

        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => {
                    if parts.get(idx) != Some(&lit.as_str()) {
                        return None;
                    }
                    idx += 1;
                }
                Segment::Param(name) => {
                    let part = parts.get(idx).filter(|p| !p.is_empty())?;
                    if is_dot_segment(part) {
                        return None;
                    }
                    captures.insert(name.clone(), (*part).to_string());
                    idx += 1;
                }
                Segment::CatchAll(name) => {
                    let rest = parts.get(idx..).unwrap_or_default();
                    if rest.iter().any(|p| is_dot_segment(p)) {
                        return None;
                    }
                    captures.insert(name.clone(), rest.join("/"));
                    idx = parts.len();
                }
            }
        }

        // A single trailing slash after the last literal still matches.
        let matched = idx == parts.len() || (idx + 1 == parts.len() && parts[idx].is_empty());
        matched.then_some(captures)
    }
}

/// Ordered rule set. The first matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct Rewrites {
    rules: Vec<RewriteRule>,
}

impl Rewrites {
    pub fn from_config(configs: &[RewriteConfig]) -> Result<Self, ProxyConfigError> {
        let rules = configs
            .iter()
            .map(|c| RewriteRule::new(&c.source, &c.destination))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    pub fn resolve(&self, uri: &axum::http::Uri) -> Option<Url> {
        self.rules
            .iter()
            .find_map(|rule| rule.apply(uri.path(), uri.query()))
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn split_query(s: &str) -> (&str, &str) {
    match s.find('?') {
        Some(i) => s.split_at(i),
        None => (s, ""),
    }
}

fn param_name(segment: &Segment) -> Option<&str> {
    match segment {
        Segment::Param(n) | Segment::CatchAll(n) => Some(n),
        Segment::Literal(_) => None,
    }
}

/// `.` or `..`, literally or with any dot written as `%2e`.
fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}

fn is_within(path: &str, prefix: &str) -> bool {
    prefix.is_empty() || path == prefix || path.starts_with(&format!("{prefix}/"))
}

/// Split a destination into literal text and parameter references.
/// Scheme and authority are literal, so a port is never read as a parameter.
fn parse_template(destination: &str) -> Vec<Piece> {
    let path_start = destination
        .find("://")
        .and_then(|i| destination[i + 3..].find('/').map(|j| i + 3 + j))
        .unwrap_or(destination.len());

    let mut pieces = Vec::new();
    let mut text = destination[..path_start].to_string();
    let mut rest = &destination[path_start..];

    while let Some(colon) = rest.find(':') {
        let after = &rest[colon + 1..];
        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        text.push_str(&rest[..colon]);
        if name_len == 0 {
            text.push(':');
            rest = after;
            continue;
        }
        if !text.is_empty() {
            pieces.push(Piece::Text(std::mem::take(&mut text)));
        }
        let name = after[..name_len].to_string();
        let tail = &after[name_len..];
        match tail.strip_prefix('*') {
            Some(tail) => {
                pieces.push(Piece::CatchAll(name));
                rest = tail;
            }
            None => {
                pieces.push(Piece::Param(name));
                rest = tail;
            }
        }
    }
    text.push_str(rest);
    if !text.is_empty() {
        pieces.push(Piece::Text(text));
    }
    pieces
}

/// Directory part of the destination path before the first parameter,
/// without its trailing slash.
fn literal_prefix(template: &[Piece]) -> String {
    let mut head = String::new();
    for piece in template {
        match piece {
            Piece::Text(text) => head.push_str(text),
            Piece::Param(_) | Piece::CatchAll(_) => break,
        }
    }
    let Ok(url) = Url::parse(split_query(&head).0) else {
        return String::new();
    };
    let path = url.path();
    let dir = path.rfind('/').map_or("", |i| &path[..i]);
    dir.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_rule() -> RewriteRule {
        RewriteRule::new("/api/:path*", "http://localhost:9090/api/:path*").unwrap()
    }

    #[test]
    fn test_rewrites_nested_path() {
        let url = api_rule().apply("/api/cars/42/fillups", None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9090/api/cars/42/fillups");
    }

    #[test]
    fn test_preserves_query() {
        let url = api_rule().apply("/api/cars", Some("page=2&size=10")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9090/api/cars?page=2&size=10");
    }

    #[test]
    fn test_bare_prefix_matches_with_empty_capture() {
        let url = api_rule().apply("/api", None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9090/api");
    }

    #[test]
    fn test_prefix_must_be_whole_segment() {
        assert!(api_rule().apply("/apix/cars", None).is_none());
        assert!(api_rule().apply("/", None).is_none());
        assert!(api_rule().apply("/about", None).is_none());
    }

    #[test]
    fn test_trailing_slash_preserved() {
        let url = api_rule().apply("/api/cars/", None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9090/api/cars/");
        let url = api_rule().apply("/api/", None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9090/api/");
    }

    #[test]
    fn test_single_segment_param() {
        let rule =
            RewriteRule::new("/cars/:id/stats", "http://backend/api/cars/:id/stats").unwrap();
        let url = rule.apply("/cars/abc/stats", None).unwrap();
        assert_eq!(url.as_str(), "http://backend/api/cars/abc/stats");
        assert!(rule.apply("/cars/abc/def/stats", None).is_none());
    }

    #[test]
    fn test_destination_query_merged() {
        let rule = RewriteRule::new("/v1/:path*", "http://backend/api/:path*?source=v1").unwrap();
        let url = rule.apply("/v1/cars", Some("limit=5")).unwrap();
        assert_eq!(url.as_str(), "http://backend/api/cars?source=v1&limit=5");
    }

    #[test]
    fn test_rejects_invalid_rules() {
        assert_eq!(
            RewriteRule::new("api/:path*", "http://x/api").unwrap_err(),
            ProxyConfigError::RelativeSource("api/:path*".to_string())
        );
        assert_eq!(
            RewriteRule::new("/api/:path*/x", "http://x/api").unwrap_err(),
            ProxyConfigError::CatchAllNotLast("path".to_string())
        );
        assert_eq!(
            RewriteRule::new("/api/:a/:a", "http://x/api").unwrap_err(),
            ProxyConfigError::DuplicateParam("a".to_string())
        );
        assert!(matches!(
            RewriteRule::new("/api/:path*", "/api/:path*").unwrap_err(),
            ProxyConfigError::InvalidDestination(_)
        ));
        assert!(matches!(
            RewriteRule::new("/api/:path*", "ftp://x/api/:path*").unwrap_err(),
            ProxyConfigError::InvalidDestination(_)
        ));
        assert_eq!(
            RewriteRule::new("/api/:path*", "http://x/api/:other").unwrap_err(),
            ProxyConfigError::UnboundParam("other".to_string())
        );
    }

    #[test]
    fn test_port_is_not_a_param() {
        assert_eq!(
            parse_template("http://localhost:9090/api"),
            vec![Piece::Text("http://localhost:9090/api".to_string())]
        );
        assert_eq!(
            parse_template("http://localhost:9090/api/:path*?v=1"),
            vec![
                Piece::Text("http://localhost:9090/api/".to_string()),
                Piece::CatchAll("path".to_string()),
                Piece::Text("?v=1".to_string()),
            ]
        );
    }

    #[test]
    fn test_dot_segments_never_leave_prefix() {
        for path in [
            "/api/../actuator/env",
            "/api/%2e%2e/actuator/env",
            "/api/%2E./actuator/env",
            "/api/cars/./../../actuator/health",
            "/api/..\\actuator/env",
        ] {
            assert!(api_rule().apply(path, None).is_none(), "{path}");
        }

        let rule = RewriteRule::new("/cars/:id", "http://b/api/cars/:id").unwrap();
        assert!(rule.apply("/cars/..", None).is_none());
        assert!(rule.apply("/cars/%2e", None).is_none());
    }

    #[test]
    fn test_dots_inside_segment_allowed() {
        let url = api_rule().apply("/api/files/report..v2.pdf", None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9090/api/files/report..v2.pdf");
    }

    #[test]
    fn test_captured_value_not_substituted_again() {
        let rule = RewriteRule::new("/cars/:id/:path*", "http://b/api/:id/:path*").unwrap();
        let url = rule.apply("/cars/7/:id", None).unwrap();
        assert_eq!(url.as_str(), "http://b/api/7/:id");
    }

    #[test]
    fn test_empty_segments_and_bare_query_kept() {
        let url = api_rule().apply("/api//cars", None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9090/api//cars");

        let url = api_rule().apply("/api/cars", Some("")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9090/api/cars?");
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let rewrites = Rewrites::from_config(&[
            RewriteConfig {
                source: "/api/health".to_string(),
                destination: "http://health:8080/status".to_string(),
            },
            RewriteConfig::backend_default("http://localhost:9090"),
        ])
        .unwrap();

        let uri: axum::http::Uri = "/api/health".parse().unwrap();
        assert_eq!(
            rewrites.resolve(&uri).unwrap().as_str(),
            "http://health:8080/status"
        );
        let uri: axum::http::Uri = "/api/cars?x=1".parse().unwrap();
        assert_eq!(
            rewrites.resolve(&uri).unwrap().as_str(),
            "http://localhost:9090/api/cars?x=1"
        );
    }
}
