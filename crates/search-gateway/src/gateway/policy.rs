//! Which requests are blocked and which are search submissions

use axum::http::Method;
use url::Url;

pub const DEFAULT_SEARCH_PATH_SUFFIX: &str = "_msearch";

pub const DEFAULT_BLOCKED_PATHS: &[&str] = &["/api/v1/indexes", "/api/v1/cluster", "/api/v1/splits"];

/// Origin used only to run inbound targets through the URL parser
const RESOLVE_ORIGIN: &str = "http://gateway.invalid";

/// Inbound path and query with dot segments resolved.
///
/// The backend URL is parsed by the same rules, so the path seen here is the
/// path the backend receives. `..`, `.` and their percent-encoded forms
/// (`%2e%2e`, `.%2E`) are resolved before any policy decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    path_and_query: String,
    path_len: usize,
}

impl RequestTarget {
    /// `None` unless `path_and_query` is an origin-form target (starts
    /// with `/`) the URL parser accepts.
    #[must_use]
    pub fn parse(path_and_query: &str) -> Option<Self> {
        if !path_and_query.starts_with('/') {
            return None;
        }
        let url = Url::parse(&format!("{RESOLVE_ORIGIN}{path_and_query}")).ok()?;
        let path = url.path();
        let path_and_query = match url.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        };
        Some(Self {
            path_len: path.len(),
            path_and_query,
        })
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path_and_query[..self.path_len]
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.path_and_query
    }
}

#[derive(Debug, Clone)]
pub struct RoutePolicy {
    blocked_prefixes: Vec<String>,
    search_path_suffix: String,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self {
            blocked_prefixes: DEFAULT_BLOCKED_PATHS.iter().map(ToString::to_string).collect(),
            search_path_suffix: DEFAULT_SEARCH_PATH_SUFFIX.to_string(),
        }
    }
}

impl RoutePolicy {
    #[must_use]
    pub fn new(blocked_prefixes: Vec<String>, search_path_suffix: impl Into<String>) -> Self {
        Self {
            blocked_prefixes,
            search_path_suffix: search_path_suffix.into(),
        }
    }

    /// Whether `path` falls under an administrative prefix. A prefix matches
    /// on whole segments: `/api/v1/indexes` blocks `/api/v1/indexes/logs`
    /// but not `/api/v1/indexesfoo`.
    #[must_use]
    pub fn is_blocked(&self, path: &str) -> bool {
        self.blocked_prefixes.iter().any(|prefix| {
            let prefix = prefix.trim_end_matches('/');
            path.strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }

    /// Search submissions are `POST`s whose last path segment is the
    /// configured suffix, e.g. `/api/v1/_elastic/_msearch`.
    #[must_use]
    pub fn is_search(&self, method: &Method, path: &str) -> bool {
        *method == Method::POST
            && path
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .is_some_and(|segment| segment == self.search_path_suffix)
    }

    #[must_use]
    pub fn blocked_prefixes(&self) -> &[String] {
        &self.blocked_prefixes
    }
}
