//! Auth-session store for the current user.
//!
//! SYSTEM CONTEXT
//! ==============
//! Sole writer of the `Session` snapshot. The navigation guard reads it and
//! calls `bootstrap_session`/`is_logged_in`; pages call `login`/`logout`.
//! The `Authorization` value returned at login is installed as a default
//! header on the shared `ApiClient` and persisted (JSON-quoted) under the
//! `token` storage key so the next process start can restore it.
//!
//! ERROR HANDLING
//! ==============
//! Invalid credentials and unauthenticated checks are outcomes (`false`),
//! not errors. Persisted state is only cleared on logout or a definitive
//! "logged out" answer, never because the backend failed to reply. Only "no response" and 5xx during bootstrap are returned as
//! `Err`, because the app cannot start meaningfully without a backend.
//! State is mutated only after the network call resolves.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use std::cell::RefCell;
use std::rc::Rc;

use super::session::{Role, Session};
use crate::events::ClientEvent;
use crate::net::client::{AUTHORIZATION, ApiClient, ApiError, decode};
use crate::net::transport::HttpRequest;
use crate::net::types::{Credentials, LoggedInResponse, LoginResponse, Registration, RoleResponse};
use crate::storage::{KeyValueStore, load_json, save_json};

pub const TOKEN_KEY: &str = "token";
pub const NAME_KEY: &str = "name";

pub const LOGIN_PATH: &str = "/auth/login";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const REGISTER_PATH: &str = "/auth/register";
pub const IS_LOGGED_IN_PATH: &str = "/auth/isLoggedIn";
pub const GET_USER_ROLE_PATH: &str = "/auth/getUserRole";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("login response carried no Authorization header")]
    MissingAuthorization,
}

impl SessionError {
    /// No response, or a 5xx.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Api(e) => e.is_fatal(),
            Self::MissingAuthorization => false,
        }
    }
}

/// Backend answer to "is this session still valid".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCheck {
    LoggedIn,
    /// `loggedIn: false` or a 401.
    LoggedOut,
    /// No response, a 5xx, or an unreadable body.
    Unknown,
}

// =============================================================================
// STORE
// =============================================================================

type ExpiryObserver = Rc<dyn Fn()>;

pub struct AuthStore {
    api: Rc<ApiClient>,
    storage: Rc<dyn KeyValueStore>,
    session: RefCell<Session>,
    expiry_observers: RefCell<Vec<ExpiryObserver>>,
}

impl AuthStore {
    pub fn new(api: Rc<ApiClient>, storage: Rc<dyn KeyValueStore>) -> Self {
        Self {
            api,
            storage,
            session: RefCell::new(Session::default()),
            expiry_observers: RefCell::new(Vec::new()),
        }
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.session.borrow().clone()
    }

    #[must_use]
    pub fn is_session_active(&self) -> bool {
        self.session.borrow().active
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.session.borrow().is_admin()
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.session.borrow().role.clone()
    }

    /// Restore a persisted session at process start.
    ///
    /// # Errors
    ///
    /// Returns an error when either backend call gets no response or a 5xx.
    /// 4xx answers leave the session inactive and are not errors.
    pub async fn bootstrap_session(&self) -> Result<(), SessionError> {
        match load_json::<String>(&*self.storage, TOKEN_KEY) {
            Some(token) => self.api.set_default_header(AUTHORIZATION, token),
            None => self.api.remove_default_header(AUTHORIZATION),
        }

        let logged_in = match self.api.get_json::<LoggedInResponse>(IS_LOGGED_IN_PATH).await {
            Ok(body) => body.logged_in,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                tracing::debug!(error = %e, "no session to restore");
                false
            }
        };
        if !logged_in {
            return Ok(());
        }

        {
            let mut session = self.session.borrow_mut();
            session.user_name = self.storage.get(NAME_KEY).unwrap_or_default();
            session.active = true;
        }

        let role = match self.api.get_json::<RoleResponse>(GET_USER_ROLE_PATH).await {
            Ok(body) => Some(Role::parse(&body.role)),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                tracing::warn!(error = %e, "role lookup rejected; continuing without role");
                None
            }
        };
        self.session.borrow_mut().role = role;
        tracing::info!(user = %self.session.borrow().user_name, "session restored");
        Ok(())
    }

    /// Log in with email and password.
    ///
    /// Returns `Ok(false)` for rejected credentials (400/401).
    ///
    /// # Errors
    ///
    /// Returns an error for any other failure, including a 200 without an
    /// `Authorization` header.
    pub async fn login(&self, credentials: &Credentials) -> Result<bool, SessionError> {
        let payload = serde_json::json!({ "email": credentials.email, "passwd": credentials.passwd });
        let request = HttpRequest::post(LOGIN_PATH).without_credentials().json(payload);

        let response = match self.api.request(request).await {
            Ok(response) => response,
            Err(ApiError::Status { status: 400 | 401, .. }) => {
                tracing::info!(email = %credentials.email, "login rejected");
                return Ok(false);
            }
            Err(e) => {
                tracing::error!(error = %e, "login failed");
                return Err(e.into());
            }
        };
        if response.status != 200 {
            tracing::warn!(status = response.status, "unexpected login status");
            return Ok(false);
        }

        let body: LoginResponse = decode(&response)?;
        let authorization = response
            .header(AUTHORIZATION)
            .ok_or(SessionError::MissingAuthorization)?
            .to_owned();

        {
            let mut session = self.session.borrow_mut();
            session.active = true;
            session.user_name.clone_from(&body.user.name);
            session.email.clone_from(&body.user.email);
            session.role = Some(Role::parse(&body.user.role.name));
        }
        self.api.set_default_header(AUTHORIZATION, authorization.clone());

        if let Err(e) = self.storage.set(NAME_KEY, &body.user.name) {
            tracing::warn!(error = %e, "failed to persist user name");
        }
        if let Err(e) = save_json(&*self.storage, TOKEN_KEY, &authorization) {
            tracing::warn!(error = %e, "failed to persist session token");
        }

        tracing::info!(user = %body.user.name, role = %body.user.role.name, "logged in");
        Ok(true)
    }

    /// Log out. Local session state is cleared whether or not the server
    /// confirmed; the return value says whether it did.
    pub async fn logout(&self) -> bool {
        let confirmed = match self.api.request(HttpRequest::post(LOGOUT_PATH)).await {
            Ok(response) if response.status == 200 => true,
            Ok(response) => {
                tracing::warn!(status = response.status, "logout not confirmed by server");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "logout request failed");
                false
            }
        };
        self.clear_local_session();
        confirmed
    }

    /// Ask the backend whether the current token is still valid. Any failure is `false`.
    pub async fn is_logged_in(&self) -> bool {
        self.check_session().await == SessionCheck::LoggedIn
    }

    /// Like [`AuthStore::is_logged_in`], but keeps "no answer" apart from "logged out".
    pub async fn check_session(&self) -> SessionCheck {
        match self.api.get_json::<LoggedInResponse>(IS_LOGGED_IN_PATH).await {
            Ok(body) if body.logged_in => SessionCheck::LoggedIn,
            Ok(_) => SessionCheck::LoggedOut,
            Err(ApiError::Status { status: 401, .. }) => SessionCheck::LoggedOut,
            Err(e) => {
                tracing::debug!(error = %e, "session check failed");
                SessionCheck::Unknown
            }
        }
    }

    /// Create an account. Any failure is logged and reported as `false`.
    pub async fn register(&self, registration: &Registration) -> bool {
        let payload = serde_json::json!({
            "name": registration.name,
            "lastName": registration.last_name,
            "email": registration.email,
            "passwd": registration.passwd,
        });
        let request = HttpRequest::post(REGISTER_PATH).without_credentials().anonymous().json(payload);
        match self.api.request(request).await {
            Ok(response) => response.status == 200,
            Err(e) => {
                tracing::warn!(error = %e, "registration failed");
                false
            }
        }
    }

    /// Register a callback run whenever the session is found to be expired.
    pub fn subscribe_session_expired(&self, observer: impl Fn() + 'static) {
        self.expiry_observers.borrow_mut().push(Rc::new(observer));
    }

    /// Drop local session state and notify expiry observers and the event bus.
    pub fn expire_session(&self) {
        tracing::info!("session expired");
        self.clear_local_session();
        self.notify_session_expired();
    }

    /// Notify expiry observers and the event bus without touching session
    /// state. Used when the backend could not confirm the session.
    pub fn notify_session_expired(&self) {
        let observers: Vec<ExpiryObserver> = self.expiry_observers.borrow().clone();
        for observer in observers {
            observer();
        }
        self.api.events().emit(ClientEvent::SessionExpired);
    }

    fn clear_local_session(&self) {
        self.session.borrow_mut().clear();
        self.api.remove_default_header(AUTHORIZATION);
        for key in [TOKEN_KEY, NAME_KEY] {
            if let Err(e) = self.storage.remove(key) {
                tracing::warn!(key, error = %e, "failed to clear persisted session value");
            }
        }
    }
}
