//! Native `HttpTransport` backed by `reqwest`.
//!
//! Two clients share one configuration: credential-bearing requests go
//! through the client with a cookie jar (the CSRF cookie lives there), the
//! rest through a cookieless one.

#[cfg(test)]
#[path = "http_test.rs"]
mod http_test;

use std::sync::Arc;

use reqwest::cookie::Jar;

use super::transport::{Body, HttpRequest, HttpResponse, HttpTransport, Method, TransportError};
use crate::config::Timeouts;

pub struct ReqwestTransport {
    with_cookies: reqwest::Client,
    without_cookies: reqwest::Client,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidRequest`] if the TLS backend cannot
    /// be initialized.
    pub fn new(timeouts: Timeouts) -> Result<Self, TransportError> {
        let jar = Arc::new(Jar::default());
        let with_cookies = builder(timeouts)
            .cookie_provider(jar)
            .build()
            .map_err(|e| TransportError::InvalidRequest(format!("http client build: {e}")))?;
        let without_cookies = builder(timeouts)
            .build()
            .map_err(|e| TransportError::InvalidRequest(format!("http client build: {e}")))?;
        Ok(Self { with_cookies, without_cookies })
    }
}

fn builder(timeouts: Timeouts) -> reqwest::ClientBuilder {
    let builder = reqwest::Client::builder().connect_timeout(timeouts.connect());
    match timeouts.request() {
        Some(timeout) => builder.timeout(timeout),
        None => builder,
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait::async_trait(?Send)]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let client = if request.with_credentials { &self.with_cookies } else { &self.without_cookies };

        let mut builder = client.request(to_reqwest_method(request.method), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            Some(Body::Json(value)) => builder.json(&value),
            Some(Body::Bytes { content_type, data }) => builder.header("Content-Type", content_type).body(data),
            None => builder,
        };
        let built = builder.build().map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let response = client.execute(built).await.map_err(|e| TransportError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| match value.to_str() {
                Ok(value) => Some((name.as_str().to_owned(), value.to_owned())),
                Err(_) => None,
            })
            .collect();
        let body = response.text().await.map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(HttpResponse { status, headers, body })
    }
}
