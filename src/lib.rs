//! # brainmapper
//!
//! Client-side session, security and navigation layer for the Brain Mapper
//! platform.
//!
//! This crate contains the HTTP transport seam and API client, the CSRF
//! guard, the auth-session and backend-availability stores, the navigation
//! guard pipeline with its router, and typed wrappers for the platform's
//! resource endpoints. The `cli` workspace member drives it from a terminal;
//! the `hydrate` feature adds browser transport and storage.

pub mod app;
pub mod config;
pub mod events;
pub mod net;
pub mod router;
pub mod state;
pub mod storage;
