//! Backend availability flag.
//!
//! DESIGN
//! ======
//! One writer (this type) and many readers (the navigation guard, UI). The
//! flag starts `true`; the API client reports what it observes and the guard
//! reports a failed session bootstrap. Only a 2xx response flips it back.

#[cfg(test)]
#[path = "backend_test.rs"]
mod backend_test;

use std::cell::Cell;

pub const DEFAULT_SERVER_ERROR_THRESHOLD: u32 = 2;

#[derive(Debug)]
pub struct BackendStatus {
    available: Cell<bool>,
    consecutive_server_errors: Cell<u32>,
    server_error_threshold: u32,
}

impl Default for BackendStatus {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_ERROR_THRESHOLD)
    }
}

impl BackendStatus {
    /// `server_error_threshold` consecutive 5xx responses mark the backend down.
    #[must_use]
    pub fn new(server_error_threshold: u32) -> Self {
        Self {
            available: Cell::new(true),
            consecutive_server_errors: Cell::new(0),
            server_error_threshold: server_error_threshold.max(1),
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available.get()
    }

    pub fn mark_unavailable(&self) {
        if self.available.replace(false) {
            tracing::warn!("backend marked unavailable");
        }
    }

    /// A 2xx response arrived.
    pub fn record_success(&self) {
        self.consecutive_server_errors.set(0);
        if !self.available.replace(true) {
            tracing::info!("backend available again");
        }
    }

    /// A 5xx response arrived.
    pub fn record_server_error(&self, status: u16) {
        let count = self.consecutive_server_errors.get().saturating_add(1);
        self.consecutive_server_errors.set(count);
        tracing::debug!(status, count, "backend server error");
        if count >= self.server_error_threshold {
            self.mark_unavailable();
        }
    }

    /// No response arrived.
    pub fn record_unreachable(&self) {
        self.mark_unavailable();
    }

    #[must_use]
    pub fn consecutive_server_errors(&self) -> u32 {
        self.consecutive_server_errors.get()
    }
}
