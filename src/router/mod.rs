//! Client-side router: route table, navigation guard, and current location.
//!
//! DESIGN
//! ======
//! `Router::navigate` runs the guard, follows its redirects, and commits the
//! final path. Each redirect is a fresh guarded navigation whose `from` is
//! still the location that was current when the chain started, so the first
//! chain of the process keeps running session initialization.
//!
//! Overlapping navigations resolve cancel-predecessor: every call takes a
//! ticket, and a chain that finishes after a newer one started is dropped
//! without touching the current location. In-flight HTTP calls are not
//! aborted.


pub mod guard;
pub mod routes;

use std::cell::{Cell, RefCell};

pub use guard::{GuardError, GuardPaths, Location, NavigationDecision, NavigationGuard};
pub use routes::{RouteMeta, RouteTable};

pub const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("navigation to '{target}' exceeded {limit} redirects")]
    RedirectLoop { target: String, limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The navigation settled on `path` after following `redirects` in order.
    Completed { path: String, redirects: Vec<String> },
    /// A newer navigation started before this one resolved.
    Superseded,
}

impl NavigationOutcome {
    /// Final path, if the navigation was not superseded.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Completed { path, .. } => Some(path),
            Self::Superseded => None,
        }
    }
}

pub struct Router {
    guard: NavigationGuard,
    current: RefCell<Location>,
    ticket: Cell<u64>,
}

impl Router {
    #[must_use]
    pub fn new(guard: NavigationGuard) -> Self {
        Self { guard, current: RefCell::new(Location::Start), ticket: Cell::new(0) }
    }

    #[must_use]
    pub fn current(&self) -> Location {
        self.current.borrow().clone()
    }

    /// Navigate to `to`, following guard redirects.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::RedirectLoop`] when the guard keeps redirecting
    /// past [`MAX_REDIRECTS`]; the current location is left unchanged.
    pub async fn navigate(&self, to: &str) -> Result<NavigationOutcome, RouterError> {
        let ticket = self.ticket.get() + 1;
        self.ticket.set(ticket);
        let from = self.current();

        let mut target = to.to_owned();
        let mut redirects = Vec::new();
        loop {
            let decision = self.guard.check(&target, &from).await;
            if self.ticket.get() != ticket {
                tracing::debug!(path = %target, "navigation superseded");
                return Ok(NavigationOutcome::Superseded);
            }

            match decision {
                NavigationDecision::Proceed => {
                    tracing::debug!(%from, path = %target, redirects = redirects.len(), "navigation committed");
                    *self.current.borrow_mut() = Location::Path(target.clone());
                    return Ok(NavigationOutcome::Completed { path: target, redirects });
                }
                NavigationDecision::Redirect(next) => {
                    if redirects.len() >= MAX_REDIRECTS {
                        tracing::error!(path = to, limit = MAX_REDIRECTS, "redirect loop");
                        return Err(RouterError::RedirectLoop { target: to.to_owned(), limit: MAX_REDIRECTS });
                    }
                    tracing::debug!(path = %target, redirect = %next, "navigation redirected");
                    redirects.push(next.clone());
                    target = next;
                }
            }
        }
    }
}
