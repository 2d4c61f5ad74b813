use std::cell::Cell;

use super::*;
use crate::events::{ClientEvent, EventBus};
use crate::net::client::ApiClient;
use crate::net::mock::{MockTransport, json_response};
use crate::net::transport::HttpResponse;
use crate::net::types::Credentials;
use crate::router::routes::RouteMeta;
use crate::state::auth::{GET_USER_ROLE_PATH, IS_LOGGED_IN_PATH, TOKEN_KEY};
use crate::storage::{KeyValueStore, MemoryStore};

struct Fixture {
    mock: Rc<MockTransport>,
    backend: Rc<BackendStatus>,
    auth: Rc<AuthStore>,
    events: Rc<EventBus>,
    storage: Rc<MemoryStore>,
    guard: NavigationGuard,
}

fn fixture() -> Fixture {
    let mock = Rc::new(MockTransport::new());
    let events = Rc::new(EventBus::new());
    let backend = Rc::new(BackendStatus::default());
    let api = Rc::new(ApiClient::new("http://api.test", mock.clone(), events.clone(), backend.clone()));
    let storage = Rc::new(MemoryStore::new());
    let auth = Rc::new(AuthStore::new(api, storage.clone()));
    let guard = NavigationGuard::new(auth.clone(), backend.clone(), RouteTable::app_routes());
    Fixture { mock, backend, auth, events, storage, guard }
}

fn from_root() -> Location {
    Location::Path("/".to_owned())
}

fn redirect(path: &str) -> NavigationDecision {
    NavigationDecision::Redirect(path.to_owned())
}

fn logged_in(flag: bool) -> HttpResponse {
    json_response(200, serde_json::json!({ "loggedIn": flag }))
}

async fn log_in_as(f: &Fixture, role: &str) {
    f.mock.push(
        json_response(
            200,
            serde_json::json!({ "user": { "name": "A", "email": "a@a.com", "role": { "name": role } } }),
        )
        .with_header("Authorization", "Bearer X"),
    );
    assert!(f.auth.login(&Credentials::new("a@a.com", "pw")).await.unwrap());
}

// =============================================================================
// Stage 2: backend availability
// =============================================================================

#[tokio::test]
async fn unavailable_backend_redirects_everything_to_error_page() {
    let f = fixture();
    f.backend.mark_unavailable();

    for target in ["/", "/login", "/profile", "/admin/users", "/unknown?x=1"] {
        assert_eq!(f.guard.check(target, &from_root()).await, redirect("/err5xx"), "{target}");
    }
    assert_eq!(f.mock.request_count(), 0);
}

#[tokio::test]
async fn unavailable_backend_lets_error_page_through() {
    let f = fixture();
    f.backend.mark_unavailable();
    assert_eq!(f.guard.check("/err5xx", &from_root()).await, NavigationDecision::Proceed);
    assert_eq!(f.guard.check("/err5xx?from=boot#top", &from_root()).await, NavigationDecision::Proceed);
}

#[tokio::test]
async fn available_backend_kicks_out_of_error_page() {
    let f = fixture();
    assert_eq!(f.guard.check("/err5xx", &from_root()).await, redirect("/login"));
}

// =============================================================================
// Stage 1: session initialization
// =============================================================================

#[tokio::test]
async fn failed_bootstrap_marks_backend_unavailable() {
    let f = fixture();
    f.mock.route(IS_LOGGED_IN_PATH, Ok(HttpResponse::new(503, "unavailable")));

    let decision = f.guard.check("/profile", &Location::Start).await;

    assert_eq!(decision, redirect("/err5xx"));
    assert!(!f.backend.is_available());
}

#[tokio::test]
async fn active_session_at_start_skips_login_page() {
    let f = fixture();
    f.mock
        .route(IS_LOGGED_IN_PATH, Ok(logged_in(true)))
        .route(GET_USER_ROLE_PATH, Ok(json_response(200, serde_json::json!({ "role": "USER" }))));

    assert_eq!(f.guard.check("/login", &Location::Start).await, redirect("/profile"));
    assert!(f.auth.is_session_active());
}

#[tokio::test]
async fn inactive_session_at_start_may_open_login() {
    let f = fixture();
    f.mock.route(IS_LOGGED_IN_PATH, Ok(logged_in(false)));
    assert_eq!(f.guard.check("/login", &Location::Start).await, NavigationDecision::Proceed);
}

#[tokio::test]
async fn later_navigations_do_not_bootstrap() {
    let f = fixture();
    assert_eq!(f.guard.check("/login", &from_root()).await, NavigationDecision::Proceed);
    assert_eq!(f.mock.request_count(), 0);
}

// =============================================================================
// Stage 3: auth + role
// =============================================================================

#[tokio::test]
async fn expired_session_redirects_to_login_and_notifies() {
    let f = fixture();
    f.mock.route(IS_LOGGED_IN_PATH, Ok(HttpResponse::new(401, "UNAUTHORIZED")));
    let observed = Rc::new(Cell::new(false));
    let flag = observed.clone();
    f.auth.subscribe_session_expired(move || flag.set(true));
    let bus_hits = Rc::new(Cell::new(0));
    let counter = bus_hits.clone();
    f.events.on(ClientEvent::SessionExpired, move || counter.set(counter.get() + 1));

    assert_eq!(f.guard.check("/scenes", &from_root()).await, redirect("/login"));
    assert!(observed.get());
    assert_eq!(bus_hits.get(), 1);
}

#[tokio::test]
async fn logged_out_answer_clears_stored_session() {
    let f = fixture();
    log_in_as(&f, "USER").await;
    f.mock.route(IS_LOGGED_IN_PATH, Ok(logged_in(false)));

    assert_eq!(f.guard.check("/profile", &from_root()).await, redirect("/login"));
    assert!(!f.auth.is_session_active());
    assert_eq!(f.storage.get(TOKEN_KEY), None);
}

#[tokio::test]
async fn unanswered_session_check_keeps_stored_token() {
    let f = fixture();
    log_in_as(&f, "USER").await;
    let bus_hits = Rc::new(Cell::new(0));
    let counter = bus_hits.clone();
    f.events.on(ClientEvent::SessionExpired, move || counter.set(counter.get() + 1));
    f.mock.route(IS_LOGGED_IN_PATH, Ok(HttpResponse::new(502, "bad gateway")));

    assert_eq!(f.guard.check("/profile", &from_root()).await, redirect("/login"));

    assert_eq!(bus_hits.get(), 1);
    assert!(f.auth.is_session_active());
    assert_eq!(f.storage.get(TOKEN_KEY).as_deref(), Some("\"Bearer X\""));
}

#[tokio::test]
async fn non_admin_is_sent_to_profile() {
    let f = fixture();
    log_in_as(&f, "AI_USER").await;
    f.mock.route(IS_LOGGED_IN_PATH, Ok(logged_in(true)));

    assert_eq!(f.guard.check("/admin", &from_root()).await, redirect("/profile"));
}

#[tokio::test]
async fn admin_and_superadmin_reach_admin_routes() {
    for role in ["ADMIN", "SUPERADMIN"] {
        let f = fixture();
        log_in_as(&f, role).await;
        f.mock.route(IS_LOGGED_IN_PATH, Ok(logged_in(true)));
        assert_eq!(f.guard.check("/admin/users", &from_root()).await, NavigationDecision::Proceed, "{role}");
    }
}

#[tokio::test]
async fn public_routes_make_no_auth_call() {
    let f = fixture();
    assert_eq!(f.guard.check("/register", &from_root()).await, NavigationDecision::Proceed);
    assert_eq!(f.mock.request_count(), 0);
}

// =============================================================================
// Errors + configuration
// =============================================================================

#[tokio::test]
async fn stage_error_redirects_to_root() {
    let f = fixture();
    assert_eq!(f.guard.check("profile", &from_root()).await, redirect("/"));
}

#[tokio::test]
async fn custom_paths_are_honored() {
    let f = fixture();
    let guard = NavigationGuard::new(
        f.auth.clone(),
        f.backend.clone(),
        RouteTable::new().route("/app", RouteMeta::AUTH),
    )
    .with_paths(GuardPaths {
        root: "/home".into(),
        login: "/signin".into(),
        profile: "/me".into(),
        error: "/down".into(),
    });

    assert_eq!(guard.check("/down", &from_root()).await, redirect("/signin"));
    assert_eq!(guard.check("nope", &from_root()).await, redirect("/home"));
    f.mock.route(IS_LOGGED_IN_PATH, Ok(logged_in(false)));
    assert_eq!(guard.check("/app/x", &from_root()).await, redirect("/signin"));
    f.backend.mark_unavailable();
    assert_eq!(guard.check("/app", &from_root()).await, redirect("/down"));
}
