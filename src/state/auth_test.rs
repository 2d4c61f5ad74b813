use std::cell::Cell;

use super::*;
use crate::events::EventBus;
use crate::net::mock::{MockTransport, json_response};
use crate::net::transport::{HttpResponse, TransportError};
use crate::state::backend::BackendStatus;
use crate::storage::MemoryStore;

struct Fixture {
    mock: Rc<MockTransport>,
    storage: Rc<MemoryStore>,
    api: Rc<ApiClient>,
    store: AuthStore,
}

fn fixture() -> Fixture {
    let mock = Rc::new(MockTransport::new());
    let storage = Rc::new(MemoryStore::new());
    let api = Rc::new(ApiClient::new(
        "http://api.test",
        mock.clone(),
        Rc::new(EventBus::new()),
        Rc::new(BackendStatus::default()),
    ));
    let store = AuthStore::new(api.clone(), storage.clone());
    Fixture { mock, storage, api, store }
}

fn login_ok(role: &str) -> HttpResponse {
    json_response(
        200,
        serde_json::json!({
            "loggedIn": true,
            "user": { "name": "A", "email": "a@a.com", "role": { "name": role } }
        }),
    )
    .with_header("Authorization", "Bearer X")
}

fn logged_in(flag: bool) -> HttpResponse {
    json_response(200, serde_json::json!({ "loggedIn": flag }))
}

// =============================================================================
// login
// =============================================================================

#[tokio::test]
async fn login_with_wrong_password_returns_false() {
    let f = fixture();
    f.mock.push(HttpResponse::new(401, "wrong_password"));

    let ok = f.store.login(&Credentials::new("a@a.com", "wrong")).await.unwrap();

    assert!(!ok);
    assert!(!f.store.is_session_active());
    assert_eq!(f.storage.get(TOKEN_KEY), None);
}

#[tokio::test]
async fn login_with_unknown_email_returns_false() {
    let f = fixture();
    f.mock.push(HttpResponse::new(400, "BAD REQUEST"));
    assert!(!f.store.login(&Credentials::new("x@x.com", "pw")).await.unwrap());
}

#[tokio::test]
async fn login_success_populates_session_and_persists_token() {
    let f = fixture();
    f.mock.push(login_ok("ADMIN"));

    let ok = f.store.login(&Credentials::new("a@a.com", "right")).await.unwrap();

    assert!(ok);
    let session = f.store.session();
    assert!(session.active);
    assert_eq!(session.role, Some(Role::Admin));
    assert_eq!(session.user_name, "A");
    assert_eq!(session.email, "a@a.com");
    assert_eq!(f.storage.get(TOKEN_KEY).as_deref(), Some("\"Bearer X\""));
    assert_eq!(f.storage.get(NAME_KEY).as_deref(), Some("A"));
    assert_eq!(f.api.default_header(AUTHORIZATION).as_deref(), Some("Bearer X"));

    let requests = f.mock.requests();
    assert!(!requests[0].with_credentials);
    assert_eq!(requests[0].url, "http://api.test/auth/login");
}

#[tokio::test]
async fn login_server_error_is_returned() {
    let f = fixture();
    f.mock.push(HttpResponse::new(500, "INTERNAL ERROR"));

    let err = f.store.login(&Credentials::new("a@a.com", "pw")).await.unwrap_err();

    assert!(err.is_fatal());
    assert!(!f.store.is_session_active());
}

#[tokio::test]
async fn login_network_error_is_returned() {
    let f = fixture();
    f.mock.push_err(TransportError::Network("refused".into()));
    assert!(f.store.login(&Credentials::new("a@a.com", "pw")).await.is_err());
}

#[tokio::test]
async fn login_without_authorization_header_fails_without_mutating() {
    let f = fixture();
    f.mock.push(json_response(
        200,
        serde_json::json!({ "user": { "name": "A", "email": "a@a.com", "role": { "name": "USER" } } }),
    ));

    let err = f.store.login(&Credentials::new("a@a.com", "pw")).await.unwrap_err();

    assert!(matches!(err, SessionError::MissingAuthorization));
    assert!(!f.store.is_session_active());
    assert_eq!(f.storage.get(TOKEN_KEY), None);
}

// =============================================================================
// bootstrap_session
// =============================================================================

#[tokio::test]
async fn bootstrap_restores_persisted_session() {
    let f = fixture();
    f.storage.set(TOKEN_KEY, "\"Bearer X\"").unwrap();
    f.storage.set(NAME_KEY, "A").unwrap();
    f.mock
        .route(IS_LOGGED_IN_PATH, Ok(logged_in(true)))
        .route(GET_USER_ROLE_PATH, Ok(json_response(200, serde_json::json!({ "role": "SUPERADMIN" }))));

    f.store.bootstrap_session().await.unwrap();

    let session = f.store.session();
    assert!(session.active);
    assert_eq!(session.user_name, "A");
    assert_eq!(session.role, Some(Role::SuperAdmin));
    assert!(f.store.is_admin());
    let requests = f.mock.requests();
    assert_eq!(requests[0].header_value(AUTHORIZATION), Some("Bearer X"));
    assert_eq!(requests[1].header_value(AUTHORIZATION), Some("Bearer X"));
}

#[tokio::test]
async fn bootstrap_without_token_sends_no_authorization() {
    let f = fixture();
    f.mock.route(IS_LOGGED_IN_PATH, Ok(HttpResponse::new(401, "UNAUTHORIZED")));

    f.store.bootstrap_session().await.unwrap();

    assert!(!f.store.is_session_active());
    assert_eq!(f.mock.requests()[0].header_value(AUTHORIZATION), None);
    assert_eq!(f.mock.request_count(), 1);
}

#[tokio::test]
async fn bootstrap_with_503_is_an_error() {
    let f = fixture();
    f.mock.route(IS_LOGGED_IN_PATH, Ok(HttpResponse::new(503, "unavailable")));

    let err = f.store.bootstrap_session().await.unwrap_err();

    assert!(err.is_fatal());
    assert!(!f.store.is_session_active());
}

#[tokio::test]
async fn bootstrap_without_response_is_an_error() {
    let f = fixture();
    f.mock.push_err(TransportError::Network("refused".into()));
    assert!(f.store.bootstrap_session().await.is_err());
}

#[tokio::test]
async fn bootstrap_logged_out_skips_role_lookup() {
    let f = fixture();
    f.mock.route(IS_LOGGED_IN_PATH, Ok(logged_in(false)));

    f.store.bootstrap_session().await.unwrap();

    assert!(!f.store.is_session_active());
    assert_eq!(f.mock.request_count(), 1);
}

#[tokio::test]
async fn bootstrap_role_server_error_is_an_error() {
    let f = fixture();
    f.mock
        .route(IS_LOGGED_IN_PATH, Ok(logged_in(true)))
        .route(GET_USER_ROLE_PATH, Ok(HttpResponse::new(500, "")));

    let err = f.store.bootstrap_session().await.unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn bootstrap_role_client_error_keeps_session_without_role() {
    let f = fixture();
    f.mock
        .route(IS_LOGGED_IN_PATH, Ok(logged_in(true)))
        .route(GET_USER_ROLE_PATH, Ok(HttpResponse::new(403, "forbidden")));

    f.store.bootstrap_session().await.unwrap();

    assert!(f.store.is_session_active());
    assert_eq!(f.store.role(), None);
    assert!(!f.store.is_admin());
}

// =============================================================================
// logout / is_logged_in
// =============================================================================

#[tokio::test]
async fn logout_then_is_logged_in_is_false() {
    let f = fixture();
    f.mock.push(login_ok("USER"));
    f.store.login(&Credentials::new("a@a.com", "pw")).await.unwrap();

    f.mock
        .route(LOGOUT_PATH, Ok(json_response(200, serde_json::json!({ "loggedIn": false }))))
        .route(IS_LOGGED_IN_PATH, Ok(HttpResponse::new(401, "UNAUTHORIZED")));

    assert!(f.store.logout().await);
    assert_eq!(f.store.session(), Session::default());
    assert_eq!(f.storage.get(TOKEN_KEY), None);
    assert_eq!(f.storage.get(NAME_KEY), None);

    assert!(!f.store.is_logged_in().await);
    let last = f.mock.requests().pop().unwrap();
    assert_eq!(last.header_value(AUTHORIZATION), None);
}

#[tokio::test]
async fn logout_failure_still_clears_local_state() {
    let f = fixture();
    f.mock.push(login_ok("USER"));
    f.store.login(&Credentials::new("a@a.com", "pw")).await.unwrap();
    f.mock.push_err(TransportError::Network("refused".into()));

    assert!(!f.store.logout().await);
    assert!(!f.store.is_session_active());
    assert_eq!(f.api.default_header(AUTHORIZATION), None);
}

#[tokio::test]
async fn is_logged_in_swallows_failures() {
    let f = fixture();
    f.mock
        .push(logged_in(true))
        .push(HttpResponse::new(500, ""))
        .push_err(TransportError::Network("x".into()));

    assert!(f.store.is_logged_in().await);
    assert!(!f.store.is_logged_in().await);
    assert!(!f.store.is_logged_in().await);
}

#[tokio::test]
async fn check_session_separates_logged_out_from_unknown() {
    let f = fixture();
    f.mock
        .push(logged_in(true))
        .push(logged_in(false))
        .push(HttpResponse::new(401, "UNAUTHORIZED"))
        .push(HttpResponse::new(502, "bad gateway"))
        .push_err(TransportError::Network("x".into()))
        .push(HttpResponse::new(200, "<html>"));

    assert_eq!(f.store.check_session().await, SessionCheck::LoggedIn);
    assert_eq!(f.store.check_session().await, SessionCheck::LoggedOut);
    assert_eq!(f.store.check_session().await, SessionCheck::LoggedOut);
    assert_eq!(f.store.check_session().await, SessionCheck::Unknown);
    assert_eq!(f.store.check_session().await, SessionCheck::Unknown);
    assert_eq!(f.store.check_session().await, SessionCheck::Unknown);
}

#[tokio::test]
async fn notify_session_expired_keeps_local_state() {
    let f = fixture();
    f.mock.push(login_ok("USER"));
    f.store.login(&Credentials::new("a@a.com", "pw")).await.unwrap();
    let observed = Rc::new(Cell::new(0));
    let counter = observed.clone();
    f.store.subscribe_session_expired(move || counter.set(counter.get() + 1));

    f.store.notify_session_expired();

    assert_eq!(observed.get(), 1);
    assert!(f.store.is_session_active());
    assert_eq!(f.storage.get(TOKEN_KEY).as_deref(), Some("\"Bearer X\""));
    assert_eq!(f.api.default_header(AUTHORIZATION).as_deref(), Some("Bearer X"));
}

// =============================================================================
// register / expiry
// =============================================================================

#[tokio::test]
async fn register_reports_outcome() {
    let f = fixture();
    f.mock.push(HttpResponse::new(200, "{}")).push(HttpResponse::new(409, "exists"));
    let reg = Registration {
        name: "Ada".into(),
        last_name: "L".into(),
        email: "ada@a.com".into(),
        passwd: "pw".into(),
    };

    assert!(f.store.register(&reg).await);
    assert!(!f.store.register(&reg).await);
    assert!(f.mock.requests()[0].url.ends_with(REGISTER_PATH));
}

#[tokio::test]
async fn expire_session_notifies_observers_and_bus() {
    let f = fixture();
    f.mock.push(login_ok("ADMIN"));
    f.store.login(&Credentials::new("a@a.com", "pw")).await.unwrap();

    let observed = Rc::new(Cell::new(0));
    let counter = observed.clone();
    f.store.subscribe_session_expired(move || counter.set(counter.get() + 1));
    let bus_hits = Rc::new(Cell::new(0));
    let bus_counter = bus_hits.clone();
    f.api.events().on(ClientEvent::SessionExpired, move || bus_counter.set(bus_counter.get() + 1));

    f.store.expire_session();

    assert_eq!(observed.get(), 1);
    assert_eq!(bus_hits.get(), 1);
    assert!(!f.store.is_session_active());
    assert_eq!(f.storage.get(TOKEN_KEY), None);
}
