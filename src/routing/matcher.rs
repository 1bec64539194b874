//! Route matching logic.
//!
//! # Responsibilities
//! - Normalize configured path prefixes
//! - Match a request path against a prefix on segment boundaries
//! - Compute the remainder left after removing the prefix
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - `/a` matches `/a`, `/a/` and `/a/b` but never `/ab`
//! - No regex to guarantee O(n) matching

/// Trim trailing slashes; the root prefix stays `/`.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher. The prefix is normalized.
    pub fn new(prefix: impl AsRef<str>) -> Self {
        Self {
            prefix: normalize_prefix(prefix.as_ref()),
        }
    }

    /// The normalized prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches(&self, path: &str) -> bool {
        self.strip(path).is_some()
    }

    /// Remove the prefix from `path` exactly once. Returns `None` when the
    /// path does not match; an empty remainder becomes `/`.
    pub fn strip<'p>(&self, path: &'p str) -> Option<&'p str> {
        if self.prefix == "/" {
            return Some(if path.is_empty() { "/" } else { path });
        }
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}
