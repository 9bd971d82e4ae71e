//! Route table and matching.

use http::Method;

use crate::params::Params;

/// One parsed path segment of a registered pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Matches the segment literally.
    Static(String),
    /// Matches any single segment, capturing it under the given name.
    Capture(String),
}

/// A registered route pattern with its per-method route names.
#[derive(Debug, Clone)]
struct RoutePattern {
    segments: Vec<Segment>,
    /// Count of static segments; higher is more specific.
    specificity: usize,
    methods: Vec<(Method, String)>,
}

impl RoutePattern {
    fn parse(path: &str) -> Self {
        let segments: Vec<Segment> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if let Some(name) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    Segment::Capture(name.to_string())
                } else {
                    Segment::Static(s.to_string())
                }
            })
            .collect();
        let specificity = segments
            .iter()
            .filter(|s| matches!(s, Segment::Static(_)))
            .count();
        Self {
            segments,
            specificity,
            methods: Vec::new(),
        }
    }

    /// Matches the pattern against pre-split path segments.
    fn matches(&self, segments: &[&str]) -> Option<Params> {
        if segments.len() != self.segments.len() {
            return None;
        }
        let mut params = Params::new();
        for (pattern, actual) in self.segments.iter().zip(segments) {
            match pattern {
                Segment::Static(s) if s == actual => {}
                Segment::Static(_) => return None,
                Segment::Capture(name) => params.push(name.clone(), (*actual).to_string()),
            }
        }
        Some(params)
    }
}

/// A successful route match: the registered route name and its captures.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    /// The name the route was registered under.
    pub name: &'a str,
    /// Named captures extracted from the path.
    pub params: Params,
}

/// Route table mapping `(method, path)` to registered route names.
///
/// Patterns are `/`-separated; a `{name}` segment captures any single path
/// segment. When several patterns match a path, the one with the most static
/// segments wins; ties resolve in registration order. Trailing slashes are
/// normalized away.
#[derive(Debug, Clone, Default)]
pub struct Router {
    patterns: Vec<RoutePattern>,
}

impl Router {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route name for `(method, path)`.
    ///
    /// Registering the same method twice on one pattern replaces the earlier
    /// route name.
    pub fn route(&mut self, method: Method, path: &str, name: impl Into<String>) {
        let name = name.into();
        let parsed = RoutePattern::parse(path);

        if let Some(existing) = self
            .patterns
            .iter_mut()
            .find(|p| p.segments == parsed.segments)
        {
            if let Some(entry) = existing.methods.iter_mut().find(|(m, _)| *m == method) {
                entry.1 = name;
            } else {
                existing.methods.push((method, name));
            }
            return;
        }

        let mut pattern = parsed;
        pattern.methods.push((method, name));
        self.patterns.push(pattern);
    }

    /// Matches a method and path against the table.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        let segments = split_path(path);

        let mut best: Option<(&RoutePattern, Params)> = None;
        for pattern in &self.patterns {
            if !pattern.methods.iter().any(|(m, _)| m == method) {
                continue;
            }
            if let Some(params) = pattern.matches(&segments) {
                let better = match &best {
                    Some((current, _)) => pattern.specificity > current.specificity,
                    None => true,
                };
                if better {
                    best = Some((pattern, params));
                }
            }
        }

        best.map(|(pattern, params)| {
            let name = pattern
                .methods
                .iter()
                .find(|(m, _)| m == method)
                .map(|(_, n)| n.as_str())
                .expect("method filtered above");
            RouteMatch { name, params }
        })
    }

    /// Returns whether any pattern matches the path, regardless of method.
    ///
    /// Used to distinguish 405 from 404.
    #[must_use]
    pub fn path_exists(&self, path: &str) -> bool {
        let segments = split_path(path);
        self.patterns.iter().any(|p| p.matches(&segments).is_some())
    }

    /// Returns the number of registered patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns true when no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> Router {
        let mut r = Router::new();
        r.route(Method::GET, "/_user", "users.get_self");
        r.route(Method::POST, "/_user", "users.create");
        r.route(Method::GET, "/_user/{username}", "users.get");
        r.route(Method::GET, "/{index}/_search", "search.query");
        r.route(Method::POST, "/{index}/_search", "search.query_post");
        r.route(Method::GET, "/_msearch", "search.msearch");
        r
    }

    #[test]
    fn test_static_match() {
        let r = router();
        let m = r.match_route(&Method::GET, "/_user").unwrap();
        assert_eq!(m.name, "users.get_self");
        assert!(m.params.is_empty());
    }

    #[test]
    fn test_capture_match() {
        let r = router();
        let m = r.match_route(&Method::GET, "/_user/bob").unwrap();
        assert_eq!(m.name, "users.get");
        assert_eq!(m.params.get("username"), Some("bob"));
    }

    #[test]
    fn test_method_dispatch_on_same_pattern() {
        let r = router();
        assert_eq!(r.match_route(&Method::GET, "/_user").unwrap().name, "users.get_self");
        assert_eq!(r.match_route(&Method::POST, "/_user").unwrap().name, "users.create");
    }

    #[test]
    fn test_static_beats_capture() {
        // "/_msearch" would also match "/{index}/_search"-like shapes if the
        // capture pattern were preferred; the static pattern must win.
        let mut r = Router::new();
        r.route(Method::GET, "/{index}/_search", "search.query");
        r.route(Method::GET, "/special/_search", "search.special");

        let m = r.match_route(&Method::GET, "/special/_search").unwrap();
        assert_eq!(m.name, "search.special");

        let m = r.match_route(&Method::GET, "/logs/_search").unwrap();
        assert_eq!(m.name, "search.query");
        assert_eq!(m.params.get("index"), Some("logs"));
    }

    #[test]
    fn test_no_match() {
        let r = router();
        assert!(r.match_route(&Method::GET, "/nope/at/all").is_none());
    }

    #[test]
    fn test_method_not_allowed_is_distinguishable() {
        let r = router();
        assert!(r.match_route(&Method::DELETE, "/_msearch").is_none());
        assert!(r.path_exists("/_msearch"));
        assert!(!r.path_exists("/nope/at/all"));
    }

    #[test]
    fn test_trailing_slash_normalized() {
        let r = router();
        assert!(r.match_route(&Method::GET, "/_user/").is_some());
        assert!(r.match_route(&Method::GET, "/_user/bob/").is_some());
    }

    #[test]
    fn test_reregistering_method_replaces() {
        let mut r = Router::new();
        r.route(Method::GET, "/x", "first");
        r.route(Method::GET, "/x", "second");
        assert_eq!(r.len(), 1);
        assert_eq!(r.match_route(&Method::GET, "/x").unwrap().name, "second");
    }
}
