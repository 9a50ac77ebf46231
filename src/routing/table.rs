//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes in registration order
//! - Look up the first route whose pattern matches a path
//! - Return the matched route or an explicit `None`
//!
//! # Design Decisions
//! - Immutable after construction (shared without locks)
//! - O(n) scan over routes, acceptable for typical route counts
//! - Identical-shape patterns are rejected at build time

use crate::routing::endpoint::Endpoint;
use crate::routing::pattern::{split_path, Pattern};

/// Errors raised while compiling the route table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("invalid placeholder segment `{segment}` in pattern `{pattern}`")]
    InvalidPlaceholder { pattern: String, segment: String },

    #[error("placeholder `<{name}>` appears more than once in pattern `{pattern}`")]
    RepeatedVariable { pattern: String, name: String },

    #[error("pattern `{pattern}` is ambiguous with `{existing}`")]
    Duplicate { pattern: String, existing: String },
}

/// A compiled pattern bound to its endpoint.
#[derive(Debug, Clone)]
pub struct Route {
    pattern: Pattern,
    endpoint: Endpoint,
}

impl Route {
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

/// Immutable table of routes.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::new()
    }

    /// First route, in registration order, whose pattern matches `path`.
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        let parts = split_path(path);
        self.routes
            .iter()
            .find(|route| route.pattern.matches_segments(&parts))
    }

    /// Whether any route serves duplex connections.
    pub fn has_duplex(&self) -> bool {
        self.routes.iter().any(|route| route.endpoint.is_duplex())
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Collects registrations and compiles them into a [`RouteTable`].
#[derive(Debug, Default)]
pub struct RouteTableBuilder {
    entries: Vec<(String, Endpoint)>,
}

impl RouteTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, pattern: impl Into<String>, endpoint: Endpoint) -> Self {
        self.entries.push((pattern.into(), endpoint));
        self
    }

    /// Register every route of `group` under `prefix`.
    pub fn nest(mut self, prefix: &str, group: RouteTableBuilder) -> Self {
        let prefix = prefix.trim_end_matches('/');
        for (pattern, endpoint) in group.entries {
            let joined = format!("{}/{}", prefix, pattern.trim_start_matches('/'));
            self.entries.push((joined, endpoint));
        }
        self
    }

    pub fn build(self) -> Result<RouteTable, RouteError> {
        let mut routes: Vec<Route> = Vec::with_capacity(self.entries.len());

        for (raw, endpoint) in self.entries {
            let pattern = Pattern::parse(&raw)?;
            if let Some(existing) = routes
                .iter()
                .find(|route| route.pattern.shape() == pattern.shape())
            {
                return Err(RouteError::Duplicate {
                    pattern: raw,
                    existing: existing.pattern.as_str().to_owned(),
                });
            }

            tracing::debug!(
                pattern = %pattern,
                endpoint = endpoint.name(),
                kind = endpoint.label(),
                "Route registered"
            );
            routes.push(Route { pattern, endpoint });
        }

        Ok(RouteTable { routes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;
    use crate::routing::PathVariables;
    use crate::http::Request;

    async fn ok(_request: Request, _vars: PathVariables) -> crate::routing::HandlerResult {
        Ok(Response::no_content())
    }

    fn endpoint(name: &'static str) -> Endpoint {
        Endpoint::function(ok).named(name)
    }

    #[test]
    fn test_resolve_matches_segment_count() {
        let table = RouteTable::builder()
            .route("users/", endpoint("list"))
            .route("users/<id>/", endpoint("detail"))
            .route("users/<id>/posts/<post>/", endpoint("post"))
            .build()
            .unwrap();

        assert_eq!(table.resolve("/users/").unwrap().endpoint().name(), "list");
        assert_eq!(table.resolve("/users/7").unwrap().endpoint().name(), "detail");
        assert_eq!(
            table.resolve("users/7/posts/9/").unwrap().endpoint().name(),
            "post"
        );
        assert!(table.resolve("/users/7/posts/").is_none());
        assert!(table.resolve("/unknown/").is_none());
    }

    #[test]
    fn test_first_registration_wins_on_overlap() {
        let table = RouteTable::builder()
            .route("users/me/", endpoint("me"))
            .route("users/<id>/", endpoint("detail"))
            .build()
            .unwrap();

        assert_eq!(table.resolve("/users/me/").unwrap().endpoint().name(), "me");
        assert_eq!(table.resolve("/users/3/").unwrap().endpoint().name(), "detail");
    }

    #[test]
    fn test_identical_shapes_are_rejected() {
        let result = RouteTable::builder()
            .route("users/<id>/", endpoint("a"))
            .route("/users/<pk>", endpoint("b"))
            .build();

        assert!(matches!(result, Err(RouteError::Duplicate { .. })));
    }

    #[test]
    fn test_nested_groups_are_flattened() {
        let admin = RouteTableBuilder::new()
            .route("/stats/", endpoint("stats"))
            .route("users/<id>", endpoint("admin-user"));
        let table = RouteTable::builder()
            .route("", endpoint("root"))
            .nest("admin/", admin)
            .build()
            .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.resolve("/").unwrap().endpoint().name(), "root");
        assert_eq!(table.resolve("/admin/stats/").unwrap().endpoint().name(), "stats");
        let route = table.resolve("/admin/users/5/").unwrap();
        assert_eq!(route.pattern().as_str(), "admin/users/<id>");
    }

    #[test]
    fn test_has_duplex_reflects_endpoints() {
        let table = RouteTable::builder()
            .route("health", endpoint("health"))
            .build()
            .unwrap();
        assert!(!table.has_duplex());
        assert!(!table.is_empty());
    }
}
