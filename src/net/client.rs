//! Shared API client: base URL, default headers, lifecycle events.
//!
//! ARCHITECTURE
//! ============
//! Every backend call made by the stores goes through one `ApiClient`. It
//! resolves relative paths against the configured base URL, applies default
//! headers (the `Authorization` value installed at login), publishes the
//! request lifecycle on the `EventBus`, and reports what it observed to the
//! `BackendStatus` flag.
//!
//! ERROR HANDLING
//! ==============
//! `send` returns any received response as `Ok`, like `fetch`. `request`
//! additionally rejects non-2xx statuses as `ApiError::Status`, which is the
//! shape the session store classifies (4xx outcome vs 5xx failure).

#[cfg(test)]
#[path = "client_test.rs"]
mod client_test;

use std::cell::RefCell;
use std::rc::Rc;

use serde::de::DeserializeOwned;

use super::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use crate::events::{ClientEvent, EventBus};
use crate::state::backend::BackendStatus;

pub const AUTHORIZATION: &str = "Authorization";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("request failed with status {status}")]
    Status { status: u16, body: String },

    #[error("response decode failed: {0}")]
    Decode(String),
}

impl ApiError {
    /// HTTP status, if a response was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| s >= 500)
    }

    /// No response, or a 5xx. These block startup during session bootstrap.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { .. } => self.is_server_error(),
            Self::Decode(_) => false,
        }
    }
}

/// Decode a JSON response body.
///
/// # Errors
///
/// Returns [`ApiError::Decode`] when the body does not match `T`.
pub fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    response.json().map_err(|e| ApiError::Decode(e.to_string()))
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct ApiClient {
    base_url: String,
    transport: Rc<dyn HttpTransport>,
    default_headers: RefCell<Vec<(String, String)>>,
    events: Rc<EventBus>,
    backend: Rc<BackendStatus>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        transport: Rc<dyn HttpTransport>,
        events: Rc<EventBus>,
        backend: Rc<BackendStatus>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { base_url, transport, default_headers: RefCell::new(Vec::new()), events, backend }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn events(&self) -> &Rc<EventBus> {
        &self.events
    }

    #[must_use]
    pub fn backend(&self) -> &Rc<BackendStatus> {
        &self.backend
    }

    /// Absolute URLs pass through; paths are joined onto the base URL.
    #[must_use]
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_owned();
        }
        if url.starts_with('/') {
            format!("{}{url}", self.base_url)
        } else {
            format!("{}/{url}", self.base_url)
        }
    }

    pub fn set_default_header(&self, name: &str, value: impl Into<String>) {
        let mut headers = self.default_headers.borrow_mut();
        headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        headers.push((name.to_owned(), value.into()));
    }

    pub fn remove_default_header(&self, name: &str) {
        self.default_headers
            .borrow_mut()
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
    }

    #[must_use]
    pub fn default_header(&self, name: &str) -> Option<String> {
        self.default_headers
            .borrow()
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }

    /// Send a request and return whatever response arrives.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] only when no response was received.
    pub async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse, TransportError> {
        request.url = self.resolve_url(&request.url);
        if !request.anonymous {
            for (name, value) in self.default_headers.borrow().iter() {
                if request.header_value(name).is_none() {
                    request.set_header(name, value.clone());
                }
            }
        }

        let method = request.method;
        let url = request.url.clone();
        self.events.emit(ClientEvent::BeforeRequest);
        tracing::debug!(%method, %url, "api request");

        match self.transport.send(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.backend.record_success();
                    self.events.emit(ClientEvent::AfterResponse);
                } else {
                    if response.is_server_error() {
                        self.backend.record_server_error(response.status);
                    }
                    tracing::debug!(%method, %url, status = response.status, "api response error");
                    self.events.emit(ClientEvent::ResponseError);
                }
                Ok(response)
            }
            Err(error @ TransportError::InvalidRequest(_)) => {
                tracing::warn!(%method, %url, error = %error, "api request rejected before send");
                self.events.emit(ClientEvent::RequestError);
                Err(error)
            }
            Err(error) => {
                tracing::warn!(%method, %url, error = %error, "api request got no response");
                self.backend.record_unreachable();
                self.events.emit(ClientEvent::ServerError);
                Err(error)
            }
        }
    }

    /// Send a request and reject non-2xx statuses.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] on no response and [`ApiError::Status`]
    /// on a non-2xx response.
    pub async fn request(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let response = self.send(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::Status { status: response.status, body: response.body })
        }
    }

    /// `GET` a path and decode the JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`]; also [`ApiError::Decode`].
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.request(HttpRequest::get(path)).await?;
        decode(&response)
    }

    /// Forward a request to an absolute URL outside the API (presigned
    /// object-store uploads). No default headers, no cookies, no events.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when no response was received.
    pub async fn send_external(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let request = HttpRequest { with_credentials: false, anonymous: true, ..request };
        self.transport.send(request).await
    }
}
