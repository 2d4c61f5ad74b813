//! Navigation guard: the three checks run before every route change.
//!
//! PIPELINE
//! ========
//! 1. Session initialization, only on the first navigation (`from` is
//!    `Location::Start`). A failed bootstrap marks the backend unavailable
//!    and is otherwise ignored, so stage 2 routes to the error page.
//! 2. Backend availability: unavailable sends everything to the error page;
//!    available sends the error page back to login.
//! 3. Auth and role: protected routes re-check the session with the
//!    backend; admin routes also need an admin role. Only a definitive
//!    "logged out" clears the stored session; an unanswered check just
//!    notifies and redirects.
//!
//! The first redirect wins. An error in stage 2 or 3 is logged and becomes a
//! redirect to the root page.

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;

use std::fmt;
use std::rc::Rc;

use super::routes::{RouteTable, route_path};
use crate::state::auth::{AuthStore, SessionCheck};
use crate::state::backend::BackendStatus;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("navigation target must be an absolute path, got '{0}'")]
    InvalidTarget(String),
}

/// Where a navigation starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Nothing has been navigated to yet in this process.
    Start,
    Path(String),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("(start)"),
            Self::Path(path) => f.write_str(path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDecision {
    Proceed,
    Redirect(String),
}

/// Well-known pages the guard redirects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardPaths {
    pub root: String,
    pub login: String,
    pub profile: String,
    pub error: String,
}

impl Default for GuardPaths {
    fn default() -> Self {
        Self {
            root: "/".to_owned(),
            login: "/login".to_owned(),
            profile: "/profile".to_owned(),
            error: "/err5xx".to_owned(),
        }
    }
}

pub struct NavigationGuard {
    auth: Rc<AuthStore>,
    backend: Rc<BackendStatus>,
    routes: RouteTable,
    paths: GuardPaths,
}

impl NavigationGuard {
    #[must_use]
    pub fn new(auth: Rc<AuthStore>, backend: Rc<BackendStatus>, routes: RouteTable) -> Self {
        Self { auth, backend, routes, paths: GuardPaths::default() }
    }

    #[must_use]
    pub fn with_paths(mut self, paths: GuardPaths) -> Self {
        self.paths = paths;
        self
    }

    /// Run all stages for a navigation from `from` to `to`.
    pub async fn check(&self, to: &str, from: &Location) -> NavigationDecision {
        if let Some(redirect) = self.initialize_session(to, from).await {
            return NavigationDecision::Redirect(redirect);
        }

        match self.run_checks(to).await {
            Ok(Some(redirect)) => NavigationDecision::Redirect(redirect),
            Ok(None) => NavigationDecision::Proceed,
            Err(e) => {
                tracing::error!(error = %e, path = to, "fatal error in navigation guard");
                NavigationDecision::Redirect(self.paths.root.clone())
            }
        }
    }

    async fn run_checks(&self, to: &str) -> Result<Option<String>, GuardError> {
        if let Some(redirect) = self.check_backend(to)? {
            return Ok(Some(redirect));
        }
        self.check_auth(to).await
    }

    async fn initialize_session(&self, to: &str, from: &Location) -> Option<String> {
        if *from != Location::Start {
            return None;
        }
        if let Err(e) = self.auth.bootstrap_session().await {
            tracing::warn!(error = %e, "session bootstrap failed; marking backend unavailable");
            self.backend.mark_unavailable();
            return None;
        }
        if route_path(to) == self.paths.login && self.auth.is_session_active() {
            return Some(self.paths.profile.clone());
        }
        None
    }

    fn check_backend(&self, to: &str) -> Result<Option<String>, GuardError> {
        let path = route_path(to);
        if !path.starts_with('/') {
            return Err(GuardError::InvalidTarget(to.to_owned()));
        }
        let on_error_page = path == self.paths.error;
        if !self.backend.is_available() {
            if !on_error_page {
                return Ok(Some(self.paths.error.clone()));
            }
        } else if on_error_page {
            return Ok(Some(self.paths.login.clone()));
        }
        Ok(None)
    }

    async fn check_auth(&self, to: &str) -> Result<Option<String>, GuardError> {
        let meta = self.routes.resolve(to);
        if !meta.requires_auth {
            return Ok(None);
        }
        match self.auth.check_session().await {
            SessionCheck::LoggedIn => {}
            SessionCheck::LoggedOut => {
                tracing::info!(path = to, "session expired; redirecting to login");
                self.auth.expire_session();
                return Ok(Some(self.paths.login.clone()));
            }
            SessionCheck::Unknown => {
                tracing::warn!(path = to, "session unconfirmed; redirecting to login");
                self.auth.notify_session_expired();
                return Ok(Some(self.paths.login.clone()));
            }
        }
        if meta.requires_admin && !self.auth.is_admin() {
            tracing::debug!(path = to, "admin route denied");
            return Ok(Some(self.paths.profile.clone()));
        }
        Ok(None)
    }
}
