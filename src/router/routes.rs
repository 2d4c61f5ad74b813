//! Route table and per-route access metadata.

#[cfg(test)]
#[path = "routes_test.rs"]
mod routes_test;

/// Access requirements for a route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub requires_admin: bool,
}

impl RouteMeta {
    pub const PUBLIC: Self = Self { requires_auth: false, requires_admin: false };
    pub const AUTH: Self = Self { requires_auth: true, requires_admin: false };
    pub const ADMIN: Self = Self { requires_auth: true, requires_admin: true };

    fn merge(self, other: Self) -> Self {
        Self {
            requires_auth: self.requires_auth || other.requires_auth,
            requires_admin: self.requires_admin || other.requires_admin,
        }
    }
}

/// Strip query string, fragment, and trailing slash: `/a/b/?x=1#y` -> `/a/b`.
#[must_use]
pub fn route_path(target: &str) -> &str {
    let end = target.find(['?', '#']).unwrap_or(target.len());
    let path = &target[..end];
    match path.trim_end_matches('/') {
        "" if path.starts_with('/') => "/",
        trimmed => trimmed,
    }
}

/// `ancestor` is `path` itself or one of its parent segments.
fn is_ancestor(ancestor: &str, path: &str) -> bool {
    if ancestor == "/" {
        return true;
    }
    path == ancestor || path.strip_prefix(ancestor).is_some_and(|rest| rest.starts_with('/'))
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<(String, RouteMeta)>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The application's pages.
    #[must_use]
    pub fn app_routes() -> Self {
        Self::new()
            .route("/", RouteMeta::PUBLIC)
            .route("/login", RouteMeta::PUBLIC)
            .route("/register", RouteMeta::PUBLIC)
            .route("/err5xx", RouteMeta::PUBLIC)
            .route("/profile", RouteMeta::AUTH)
            .route("/scenes", RouteMeta::AUTH)
            .route("/inference", RouteMeta::AUTH)
            .route("/metrics", RouteMeta::AUTH)
            .route("/admin", RouteMeta::ADMIN)
    }

    #[must_use]
    pub fn route(mut self, path: &str, meta: RouteMeta) -> Self {
        let path = route_path(path).to_owned();
        self.routes.retain(|(existing, _)| *existing != path);
        self.routes.push((path, meta));
        self
    }

    /// Metadata for `target`, merged with every registered ancestor. Unknown
    /// paths get only what their ancestors require.
    #[must_use]
    pub fn resolve(&self, target: &str) -> RouteMeta {
        let path = route_path(target);
        self.routes
            .iter()
            .filter(|(route, _)| is_ancestor(route, path))
            .fold(RouteMeta::PUBLIC, |acc, (_, meta)| acc.merge(*meta))
    }
}
