//! Networking: transport seam, API client, CSRF guard, and typed endpoints.
//!
//! SYSTEM CONTEXT
//! ==============
//! `transport` defines the request/response pair and the `HttpTransport`
//! trait, `http` and `browser` implement it, `client` is the shared API
//! instance, `csrf` wraps state-changing calls, `api` exposes the resource
//! endpoints, and `types` defines the wire schema.

pub mod api;
#[cfg(feature = "hydrate")]
pub mod browser;
pub mod client;
pub mod csrf;
#[cfg(not(target_arch = "wasm32"))]
pub mod http;
#[cfg(test)]
pub(crate) mod mock;
pub mod transport;
pub mod types;
