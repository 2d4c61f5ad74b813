//! Browser `HttpTransport` backed by `gloo-net` (`hydrate` feature).
//!
//! `with_credentials` maps onto `fetch` `credentials: include`/`omit`, which
//! is how the CSRF cookie reaches the backend from the SPA.

use gloo_net::http::{Request, RequestBuilder};
use web_sys::RequestCredentials;

use super::transport::{Body, HttpRequest, HttpResponse, HttpTransport, Method, TransportError};

#[derive(Debug, Default)]
pub struct GlooTransport;

fn builder(method: Method, url: &str) -> RequestBuilder {
    match method {
        Method::Get => Request::get(url),
        Method::Post => Request::post(url),
        Method::Put => Request::put(url),
        Method::Patch => Request::patch(url),
        Method::Delete => Request::delete(url),
    }
}

#[async_trait::async_trait(?Send)]
impl HttpTransport for GlooTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let credentials = if request.with_credentials { RequestCredentials::Include } else { RequestCredentials::Omit };
        let mut builder = builder(request.method, &request.url).credentials(credentials);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let built = match request.body {
            Some(Body::Json(value)) => builder.json(&value),
            Some(Body::Bytes { content_type, data }) => builder
                .header("Content-Type", &content_type)
                .body(js_sys::Uint8Array::from(data.as_slice())),
            None => builder.build(),
        }
        .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let response = built.send().await.map_err(|e| TransportError::Network(e.to_string()))?;
        let status = response.status();
        let headers = response.headers().entries().collect();
        let body = response.text().await.map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(HttpResponse { status, headers, body })
    }
}
