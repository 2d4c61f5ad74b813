//! Client-side state stores.
//!
//! SYSTEM CONTEXT
//! ==============
//! `auth` owns the session snapshot and the login/logout/bootstrap calls,
//! `backend` owns the availability flag fed by the API client, and `session`
//! defines the role and session types both of them share. `metadata` caches
//! per-inference detection documents and turns them into overlay boxes.

pub mod auth;
pub mod backend;
pub mod metadata;
pub mod session;
