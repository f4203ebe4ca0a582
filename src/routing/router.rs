//! Route table and lookup.
//!
//! # Responsibilities
//! - Store compiled routes in registration order
//! - Look up the first route whose pattern matches the whole path
//! - Return matched route with its fields, or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) linear scan (acceptable for a static table of a few dozen routes)
//! - Registration order is priority; no sorting or specificity rules
//! - Generic over the handler type so routing knows nothing about HTTP

use crate::routing::matcher::{Fields, PathPattern, RouteError};

/// An immutable (pattern, handler) pair.
#[derive(Debug)]
pub struct Route<H> {
    pattern: PathPattern,
    handler: H,
}

impl<H> Route<H> {
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

/// Result of a successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'a, H> {
    pub route: &'a Route<H>,
    pub fields: Fields,
}

#[derive(Debug)]
pub struct RouteTable<H> {
    routes: Vec<Route<H>>,
}

impl<H> Default for RouteTable<H> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<H> RouteTable<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `pattern` and append it. Earlier registrations take priority.
    pub fn register(&mut self, pattern: &str, handler: H) -> Result<&mut Self, RouteError> {
        let pattern = PathPattern::new(pattern)?;
        tracing::debug!(pattern = pattern.as_str(), priority = self.routes.len(), "Route registered");
        self.routes.push(Route { pattern, handler });
        Ok(self)
    }

    /// First registered route matching the full `path`.
    pub fn match_path(&self, path: &str) -> Option<RouteMatch<'_, H>> {
        self.routes.iter().find_map(|route| {
            route
                .pattern
                .captures(path)
                .map(|fields| RouteMatch { route, fields })
        })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Registered patterns, in priority order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.pattern.as_str())
    }
}
