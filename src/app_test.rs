use super::*;
use crate::net::csrf::CSRF_TOKEN_PATH;
use crate::net::mock::{MockTransport, json_response};
use crate::net::transport::HttpResponse;
use crate::router::Location;
use crate::state::auth::{GET_USER_ROLE_PATH, IS_LOGGED_IN_PATH, TOKEN_KEY};
use crate::storage::MemoryStore;

fn context(mock: &Rc<MockTransport>, storage: Rc<MemoryStore>) -> AppContext {
    let config = ClientConfig { api_base_url: "http://api.test/".into(), ..ClientConfig::default() };
    AppContext::new(config, mock.clone(), storage)
}

#[tokio::test]
async fn start_fetches_token_and_restores_session() {
    let mock = Rc::new(MockTransport::new());
    let storage = Rc::new(MemoryStore::new());
    storage.set(TOKEN_KEY, "\"Bearer X\"").unwrap();
    mock.route(CSRF_TOKEN_PATH, Ok(json_response(200, serde_json::json!({ "csrf_token": "t" }))))
        .route(IS_LOGGED_IN_PATH, Ok(json_response(200, serde_json::json!({ "loggedIn": true }))))
        .route(IS_LOGGED_IN_PATH, Ok(json_response(200, serde_json::json!({ "loggedIn": true }))))
        .route(GET_USER_ROLE_PATH, Ok(json_response(200, serde_json::json!({ "role": "ADMIN" }))));
    let ctx = context(&mock, storage);

    let outcome = ctx.start("/admin").await.unwrap();

    assert_eq!(outcome.path(), Some("/admin"));
    assert_eq!(ctx.csrf.token().as_deref(), Some("t"));
    assert!(ctx.auth.is_admin());
    assert_eq!(ctx.api.base_url(), "http://api.test");
    assert_eq!(mock.urls()[0], "http://api.test/auth/csrf-token");
}

#[tokio::test]
async fn threshold_from_config_drives_backend_flag() {
    let mock = Rc::new(MockTransport::new());
    let config = ClientConfig { server_error_threshold: 1, ..ClientConfig::default() };
    let ctx = AppContext::new(config, mock.clone(), Rc::new(MemoryStore::new()));
    mock.push(HttpResponse::new(500, ""));

    assert!(!ctx.auth.is_logged_in().await);
    assert!(!ctx.backend.is_available());
    assert_eq!(ctx.router.current(), Location::Start);
}
