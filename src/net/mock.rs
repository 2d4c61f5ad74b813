//! Scripted transport for unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;

use super::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

type Scripted = Result<HttpResponse, TransportError>;

/// Replays queued responses in order and records every request it sees.
///
/// Requests whose path matches a route registered with [`MockTransport::route`]
/// are answered from that route's queue first; everything else falls through to
/// the shared queue. An exhausted queue answers `599 unscripted`.
#[derive(Default)]
pub struct MockTransport {
    queue: RefCell<VecDeque<Scripted>>,
    routes: RefCell<Vec<(String, VecDeque<Scripted>)>>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: HttpResponse) -> &Self {
        self.queue.borrow_mut().push_back(Ok(response));
        self
    }

    pub fn push_err(&self, error: TransportError) -> &Self {
        self.queue.borrow_mut().push_back(Err(error));
        self
    }

    /// Queue a response for requests whose URL ends with `suffix`.
    pub fn route(&self, suffix: &str, response: Scripted) -> &Self {
        let mut routes = self.routes.borrow_mut();
        if let Some((_, queue)) = routes.iter_mut().find(|(s, _)| s == suffix) {
            queue.push_back(response);
        } else {
            routes.push((suffix.to_owned(), VecDeque::from([response])));
        }
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests.borrow().iter().map(|r| r.url.clone()).collect()
    }

    fn next_for(&self, url: &str) -> Scripted {
        let path = url.split('?').next().unwrap_or(url);
        {
            let mut routes = self.routes.borrow_mut();
            if let Some((_, queue)) = routes.iter_mut().find(|(suffix, _)| path.ends_with(suffix.as_str())) {
                if let Some(next) = queue.pop_front() {
                    return next;
                }
            }
        }
        self.queue
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(HttpResponse::new(599, "unscripted")))
    }
}

#[async_trait::async_trait(?Send)]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.clone();
        self.requests.borrow_mut().push(request);
        self.next_for(&url)
    }
}

pub fn json_response(status: u16, value: serde_json::Value) -> HttpResponse {
    HttpResponse::new(status, value.to_string()).with_header("content-type", "application/json")
}
