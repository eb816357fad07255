//! Route matching logic.
//!
//! # Responsibilities
//! - Match path prefix on segment boundaries (case-sensitive)
//! - Match request method against an allow-list
//! - A route matches when every matcher passes
//!
//! # Design Decisions
//! - `/api/email` matches `/api/email` and `/api/email/...`, never `/api/emails`
//! - Empty method list = any method
//! - Paths with `.`/`..` segments (literal or percent-encoded) never match
//! - No regex to guarantee O(n) matching

use axum::http::Method;

/// The parts of a request routing decisions are made on.
#[derive(Debug, Clone, Copy)]
pub struct RequestHead<'a> {
    pub method: &'a Method,
    pub path: &'a str,
}

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, head: &RequestHead<'_>) -> bool;
}

/// Matches a path prefix on segment boundaries.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The path after the prefix (`""` or starting with `/`), if it matches.
    pub fn remainder<'p>(&self, path: &'p str) -> Option<&'p str> {
        if has_dot_segment(path) {
            return None;
        }
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() || rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}

/// Whether any segment is `.` or `..`, including `%2e` spellings.
/// `\` counts as a separator, as it does for the URL parser.
pub fn has_dot_segment(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, head: &RequestHead<'_>) -> bool {
        self.remainder(head.path).is_some()
    }
}

/// Matches the request method.
#[derive(Debug, Clone, Default)]
pub struct MethodMatcher {
    allowed: Vec<Method>,
}

impl MethodMatcher {
    /// Unparseable names are ignored; validation rejects them earlier.
    pub fn new<S: AsRef<str>>(methods: &[S]) -> Self {
        Self {
            allowed: methods
                .iter()
                .filter_map(|m| m.as_ref().to_ascii_uppercase().parse().ok())
                .collect(),
        }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, head: &RequestHead<'_>) -> bool {
        self.allowed.is_empty() || self.allowed.contains(head.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head<'a>(method: &'a Method, path: &'a str) -> RequestHead<'a> {
        RequestHead { method, path }
    }

    #[test]
    fn test_path_matcher_segments() {
        let matcher = PathPrefixMatcher::new("/api/email");

        assert!(matcher.matches(&head(&Method::GET, "/api/email")));
        assert!(matcher.matches(&head(&Method::GET, "/api/email/change")));
        assert!(!matcher.matches(&head(&Method::GET, "/api/emails")));
        assert!(!matcher.matches(&head(&Method::GET, "/API/email")));

        assert_eq!(matcher.remainder("/api/email/change/confirm"), Some("/change/confirm"));
        assert_eq!(matcher.remainder("/api/email"), Some(""));
    }

    #[test]
    fn test_dot_segments_never_match() {
        let matcher = PathPrefixMatcher::new("/api/password");

        for path in [
            "/api/password/../coupons",
            "/api/password/./reset",
            "/api/password/%2e%2e/%2E%2E/internal/secret",
            "/api/password/.%2e/coupons",
            "/api/password/..\\coupons",
            "/api/password/..",
        ] {
            assert_eq!(matcher.remainder(path), None, "{}", path);
        }

        assert_eq!(matcher.remainder("/api/password/v1.2/..x"), Some("/v1.2/..x"));
        assert!(!has_dot_segment("/api/files/.well-known"));
    }

    #[test]
    fn test_method_matcher() {
        let any = MethodMatcher::new::<&str>(&[]);
        assert!(any.matches(&head(&Method::DELETE, "/")));

        let limited = MethodMatcher::new(&["get", "POST"]);
        assert!(limited.matches(&head(&Method::GET, "/")));
        assert!(limited.matches(&head(&Method::POST, "/")));
        assert!(!limited.matches(&head(&Method::PATCH, "/")));
    }
}
