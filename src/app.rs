//! Application context: every shared component, wired once.
//!
//! Components hold `Rc` handles to what they depend on; nothing is global.
//! Hosts (the CLI, a browser shell, tests) supply the transport and the
//! key/value storage.

#[cfg(test)]
#[path = "app_test.rs"]
mod app_test;

use std::rc::Rc;

use crate::config::ClientConfig;
use crate::events::EventBus;
use crate::net::api::PlatformApi;
use crate::net::client::ApiClient;
use crate::net::csrf::CsrfGuard;
use crate::net::transport::HttpTransport;
use crate::router::{NavigationGuard, NavigationOutcome, RouteTable, Router, RouterError};
use crate::state::auth::AuthStore;
use crate::state::backend::BackendStatus;
use crate::state::metadata::MetadataStore;
use crate::storage::KeyValueStore;

pub struct AppContext {
    pub config: ClientConfig,
    pub events: Rc<EventBus>,
    pub backend: Rc<BackendStatus>,
    pub api: Rc<ApiClient>,
    pub csrf: Rc<CsrfGuard>,
    pub auth: Rc<AuthStore>,
    pub platform: PlatformApi,
    pub metadata: MetadataStore,
    pub router: Router,
}

impl AppContext {
    #[must_use]
    pub fn new(config: ClientConfig, transport: Rc<dyn HttpTransport>, storage: Rc<dyn KeyValueStore>) -> Self {
        let events = Rc::new(EventBus::new());
        let backend = Rc::new(BackendStatus::new(config.server_error_threshold));
        let api = Rc::new(ApiClient::new(config.api_base_url.clone(), transport, events.clone(), backend.clone()));
        let csrf = Rc::new(CsrfGuard::new(api.clone()));
        let auth = Rc::new(AuthStore::new(api.clone(), storage));
        let platform = PlatformApi::new(api.clone(), csrf.clone());
        let metadata = MetadataStore::new(api.clone());
        let router = Router::new(NavigationGuard::new(auth.clone(), backend.clone(), RouteTable::app_routes()));

        Self { config, events, backend, api, csrf, auth, platform, metadata, router }
    }

    /// Context backed by the native `reqwest` transport.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`](crate::net::transport::TransportError) if
    /// the HTTP client cannot be built.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn native(
        config: ClientConfig,
        storage: Rc<dyn KeyValueStore>,
    ) -> Result<Self, crate::net::transport::TransportError> {
        let transport = crate::net::http::ReqwestTransport::new(config.timeouts)?;
        Ok(Self::new(config, Rc::new(transport), storage))
    }

    /// Fetch the CSRF token, then run the first guarded navigation.
    ///
    /// # Errors
    ///
    /// See [`Router::navigate`].
    pub async fn start(&self, initial_path: &str) -> Result<NavigationOutcome, RouterError> {
        self.csrf.initialize().await;
        self.router.navigate(initial_path).await
    }
}
