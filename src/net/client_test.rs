use std::cell::RefCell;

use super::*;
use crate::net::mock::{MockTransport, json_response};

fn client_with(mock: &Rc<MockTransport>) -> ApiClient {
    ApiClient::new(
        "http://api.test/",
        mock.clone(),
        Rc::new(EventBus::new()),
        Rc::new(BackendStatus::default()),
    )
}

fn record_events(client: &ApiClient) -> Rc<RefCell<Vec<ClientEvent>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    client.events().subscribe(move |e| sink.borrow_mut().push(e));
    seen
}

// =============================================================================
// URL + headers
// =============================================================================

#[test]
fn resolve_url_joins_paths_and_keeps_absolute_urls() {
    let mock = Rc::new(MockTransport::new());
    let client = client_with(&mock);
    assert_eq!(client.base_url(), "http://api.test");
    assert_eq!(client.resolve_url("/auth/login"), "http://api.test/auth/login");
    assert_eq!(client.resolve_url("models/"), "http://api.test/models/");
    assert_eq!(client.resolve_url("https://s3.test/up?sig=1"), "https://s3.test/up?sig=1");
}

#[tokio::test]
async fn default_headers_are_applied_unless_anonymous() {
    let mock = Rc::new(MockTransport::new());
    mock.push(HttpResponse::new(200, "{}")).push(HttpResponse::new(200, "{}"));
    let client = client_with(&mock);
    client.set_default_header(AUTHORIZATION, "Bearer X");

    client.send(HttpRequest::get("/auth/isLoggedIn")).await.unwrap();
    client.send(HttpRequest::get("/auth/csrf-token").anonymous()).await.unwrap();

    let requests = mock.requests();
    assert_eq!(requests[0].header_value("authorization"), Some("Bearer X"));
    assert_eq!(requests[1].header_value("authorization"), None);
}

#[tokio::test]
async fn explicit_header_wins_over_default() {
    let mock = Rc::new(MockTransport::new());
    mock.push(HttpResponse::new(200, "{}"));
    let client = client_with(&mock);
    client.set_default_header(AUTHORIZATION, "Bearer default");

    client
        .send(HttpRequest::get("/x").header(AUTHORIZATION, "Bearer explicit"))
        .await
        .unwrap();

    assert_eq!(mock.requests()[0].header_value(AUTHORIZATION), Some("Bearer explicit"));
}

#[test]
fn remove_default_header_clears_value() {
    let mock = Rc::new(MockTransport::new());
    let client = client_with(&mock);
    client.set_default_header(AUTHORIZATION, "Bearer X");
    client.remove_default_header("authorization");
    assert_eq!(client.default_header(AUTHORIZATION), None);
}

// =============================================================================
// Events + backend reporting
// =============================================================================

#[tokio::test]
async fn success_emits_before_and_after() {
    let mock = Rc::new(MockTransport::new());
    mock.push(HttpResponse::new(200, "{}"));
    let client = client_with(&mock);
    let seen = record_events(&client);

    client.send(HttpRequest::get("/ok")).await.unwrap();

    assert_eq!(*seen.borrow(), vec![ClientEvent::BeforeRequest, ClientEvent::AfterResponse]);
}

#[tokio::test]
async fn error_status_emits_response_error_and_counts_5xx() {
    let mock = Rc::new(MockTransport::new());
    mock.push(HttpResponse::new(503, "down")).push(HttpResponse::new(500, "down"));
    let client = client_with(&mock);
    let seen = record_events(&client);

    let first = client.send(HttpRequest::get("/x")).await.unwrap();
    assert_eq!(first.status, 503);
    assert!(client.backend().is_available());
    client.send(HttpRequest::get("/x")).await.unwrap();
    assert!(!client.backend().is_available());
    assert_eq!(seen.borrow()[1], ClientEvent::ResponseError);
}

#[tokio::test]
async fn network_error_emits_server_error_and_marks_unavailable() {
    let mock = Rc::new(MockTransport::new());
    mock.push_err(TransportError::Network("connection refused".into()));
    let client = client_with(&mock);
    let seen = record_events(&client);

    let err = client.send(HttpRequest::get("/x")).await.unwrap_err();

    assert!(matches!(err, TransportError::Network(_)));
    assert!(!client.backend().is_available());
    assert_eq!(*seen.borrow(), vec![ClientEvent::BeforeRequest, ClientEvent::ServerError]);
}

#[tokio::test]
async fn invalid_request_emits_request_error_without_touching_backend() {
    let mock = Rc::new(MockTransport::new());
    mock.push_err(TransportError::InvalidRequest("bad header".into()));
    let client = client_with(&mock);
    let seen = record_events(&client);

    assert!(client.send(HttpRequest::get("/x")).await.is_err());
    assert!(client.backend().is_available());
    assert_eq!(seen.borrow()[1], ClientEvent::RequestError);
}

// =============================================================================
// request / get_json
// =============================================================================

#[tokio::test]
async fn request_rejects_non_2xx() {
    let mock = Rc::new(MockTransport::new());
    mock.push(HttpResponse::new(401, "UNAUTHORIZED"));
    let client = client_with(&mock);

    let err = client.request(HttpRequest::get("/auth/isLoggedIn")).await.unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn get_json_decodes_and_reports_decode_errors() {
    #[derive(Debug, serde::Deserialize)]
    struct Role {
        role: String,
    }
    let mock = Rc::new(MockTransport::new());
    mock.push(json_response(200, serde_json::json!({ "role": "ADMIN" })))
        .push(HttpResponse::new(200, "<html>"));
    let client = client_with(&mock);

    let role: Role = client.get_json("/auth/getUserRole").await.unwrap();
    assert_eq!(role.role, "ADMIN");
    let err = client.get_json::<Role>("/auth/getUserRole").await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

#[test]
fn fatal_classification() {
    assert!(ApiError::Transport(TransportError::Network("x".into())).is_fatal());
    assert!(ApiError::Status { status: 503, body: String::new() }.is_fatal());
    assert!(!ApiError::Status { status: 404, body: String::new() }.is_fatal());
    assert!(!ApiError::Decode("x".into()).is_fatal());
}

#[tokio::test]
async fn send_external_strips_defaults_and_credentials() {
    let mock = Rc::new(MockTransport::new());
    mock.push(HttpResponse::new(200, ""));
    let client = client_with(&mock);
    client.set_default_header(AUTHORIZATION, "Bearer X");

    client
        .send_external(HttpRequest::put("https://s3.test/up").bytes("image/jpeg", vec![1, 2, 3]))
        .await
        .unwrap();

    let req = &mock.requests()[0];
    assert_eq!(req.url, "https://s3.test/up");
    assert!(!req.with_credentials);
    assert_eq!(req.header_value(AUTHORIZATION), None);
}
