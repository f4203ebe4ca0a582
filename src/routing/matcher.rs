//! Path pattern matching.
//!
//! # Responsibilities
//! - Compile a route pattern once, anchored at both ends
//! - Match the full request path (case-sensitive)
//! - Extract named capture groups into a field map
//!
//! # Design Decisions
//! - Patterns are program-supplied regexes, never request input
//! - `^(?:pattern)$` anchoring: partial-path matches never succeed
//! - Unnamed groups are ignored; named groups that did not take part in
//!   the match are left out of the field map

use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use thiserror::Error;

/// Named capture group → matched substring.
pub type Fields = HashMap<String, String>;

/// Errors raised while building the route table. Fatal at startup.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid route pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled, anchored path pattern.
#[derive(Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
}

impl PathPattern {
    /// Compile `pattern` as `^(?:pattern)$`.
    ///
    /// Duplicate group names are rejected by the regex compiler.
    pub fn new(pattern: &str) -> Result<Self, RouteError> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| {
            RouteError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as registered, without anchors.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match the whole `path`, returning the named captures on success.
    pub fn captures(&self, path: &str) -> Option<Fields> {
        let caps = self.regex.captures(path)?;

        let fields = self
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                caps.name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();

        Some(fields)
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathPattern").field(&self.source).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_capture_extraction() {
        let pattern = PathPattern::new("/items/(?P<id>[0-9]+)").unwrap();
        let fields = pattern.captures("/items/42").unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["id"], "42");
    }

    #[test]
    fn test_anchored_both_ends() {
        let pattern = PathPattern::new("/items/(?P<id>[0-9]+)").unwrap();
        assert!(pattern.captures("/items/42/extra").is_none());
        assert!(pattern.captures("/prefix/items/42").is_none());
        assert!(pattern.captures("/items/").is_none());
        assert!(!pattern.is_match("/items"));
    }

    #[test]
    fn test_alternation_is_anchored_as_a_whole() {
        // Without the non-capturing wrapper `^/a|/b$` would match "/a/anything".
        let pattern = PathPattern::new("/a|/b").unwrap();
        assert!(pattern.is_match("/a"));
        assert!(pattern.is_match("/b"));
        assert!(!pattern.is_match("/a/anything"));
        assert!(!pattern.is_match("x/b"));
    }

    #[test]
    fn test_unnamed_and_unmatched_groups_are_skipped() {
        let pattern = PathPattern::new("/(files|docs)/(?P<name>[a-z]+)(?:\\.(?P<ext>[a-z]+))?").unwrap();

        let fields = pattern.captures("/docs/readme").unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["name"], "readme");

        let fields = pattern.captures("/files/report.pdf").unwrap();
        assert_eq!(fields["name"], "report");
        assert_eq!(fields["ext"], "pdf");
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let pattern = PathPattern::new("/api/health").unwrap();
        assert!(!pattern.is_match("/API/health"));
    }

    #[test]
    fn test_malformed_pattern_is_an_error() {
        let err = PathPattern::new("/items/(?P<id>[0-9+").unwrap_err();
        assert!(err.to_string().contains("/items/(?P<id>[0-9+"));
    }

    #[test]
    fn test_duplicate_group_names_rejected() {
        assert!(PathPattern::new("/(?P<id>[a-z]+)/(?P<id>[0-9]+)").is_err());
    }
}
