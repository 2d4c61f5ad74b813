//! Anti-forgery token holder and retrying request wrapper.
//!
//! DESIGN
//! ======
//! One token per client, fetched lazily on the first secured request and
//! never persisted. A `403` whose body mentions CSRF means the server rotated
//! or expired the token; the guard refetches once and replays the request
//! once. Every other status goes back to the caller untouched.

#[cfg(test)]
#[path = "csrf_test.rs"]
mod csrf_test;

use std::cell::RefCell;
use std::rc::Rc;

use super::client::{ApiClient, decode};
use super::transport::{HttpRequest, HttpResponse, TransportError};
use super::types::CsrfTokenResponse;

pub const CSRF_TOKEN_PATH: &str = "/auth/csrf-token";
pub const CSRF_HEADER: &str = "X-CSRF-Token";

pub struct CsrfGuard {
    api: Rc<ApiClient>,
    token: RefCell<Option<String>>,
}

impl CsrfGuard {
    #[must_use]
    pub fn new(api: Rc<ApiClient>) -> Self {
        Self { api, token: RefCell::new(None) }
    }

    /// Current token, if one is held.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.token.borrow().clone()
    }

    /// Eagerly fetch a token at startup.
    pub async fn initialize(&self) {
        self.fetch_token().await;
    }

    /// Fetch a fresh token. Any failure leaves no token held; never fails.
    pub async fn fetch_token(&self) {
        let request = HttpRequest::get(CSRF_TOKEN_PATH).anonymous();
        let token = match self.api.send(request).await {
            Ok(response) if response.is_success() => match decode::<CsrfTokenResponse>(&response) {
                Ok(body) => Some(body.csrf_token).filter(|t| !t.is_empty()),
                Err(e) => {
                    tracing::error!(error = %e, "failed to fetch CSRF token");
                    None
                }
            },
            Ok(response) => {
                tracing::error!(status = response.status, "failed to fetch CSRF token");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to fetch CSRF token");
                None
            }
        };
        *self.token.borrow_mut() = token;
    }

    /// Send `request` with the CSRF header and cookies, retrying once when
    /// the server rejects the token.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] only when no response was received;
    /// HTTP error statuses come back as `Ok`.
    pub async fn secure_request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        if self.token().is_none() {
            self.fetch_token().await;
        }

        let mut request = request;
        request.with_credentials = true;
        if let Some(token) = self.token() {
            request.set_header(CSRF_HEADER, token);
        }

        let response = self.api.send(request.clone()).await.inspect_err(|e| {
            tracing::error!(error = %e, "secure request failed");
        })?;
        if !is_csrf_rejection(&response) {
            return Ok(response);
        }

        tracing::info!(url = %request.url, "CSRF token rejected, refreshing once");
        self.fetch_token().await;
        let Some(token) = self.token() else {
            return Ok(response);
        };
        request.set_header(CSRF_HEADER, token);
        self.api.send(request).await.inspect_err(|e| {
            tracing::error!(error = %e, "secure request retry failed");
        })
    }
}

/// `403` with a body mentioning CSRF in any letter case.
#[must_use]
pub fn is_csrf_rejection(response: &HttpResponse) -> bool {
    response.status == 403 && response.body.to_ascii_lowercase().contains("csrf")
}
