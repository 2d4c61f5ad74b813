//! Client configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::time::Duration;

use crate::state::backend::DEFAULT_SERVER_ERROR_THRESHOLD;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

pub const API_BASE_URL_VAR: &str = "BRAINMAPPER_API_BASE_URL";
pub const REQUEST_TIMEOUT_VAR: &str = "BRAINMAPPER_REQUEST_TIMEOUT_SECS";
pub const CONNECT_TIMEOUT_VAR: &str = "BRAINMAPPER_CONNECT_TIMEOUT_SECS";
pub const SERVER_ERROR_THRESHOLD_VAR: &str = "BRAINMAPPER_SERVER_ERROR_THRESHOLD";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {message}")]
    Parse { var: &'static str, message: String },
}

/// Transport timeouts. `request_secs: None` lets a stalled call stall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: Option<u64>,
    pub connect_secs: u64,
}

impl Timeouts {
    #[must_use]
    pub fn request(self) -> Option<Duration> {
        self.request_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn connect(self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { request_secs: None, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub timeouts: Timeouts,
    pub server_error_threshold: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            timeouts: Timeouts::default(),
            server_error_threshold: DEFAULT_SERVER_ERROR_THRESHOLD,
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// All optional:
    /// - `BRAINMAPPER_API_BASE_URL`: default `http://127.0.0.1:5000`
    /// - `BRAINMAPPER_REQUEST_TIMEOUT_SECS`: unset means no timeout
    /// - `BRAINMAPPER_CONNECT_TIMEOUT_SECS`: default 10
    /// - `BRAINMAPPER_SERVER_ERROR_THRESHOLD`: default 2, at least 1
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`], reading through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_base_url = lookup(API_BASE_URL_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();

        let request_secs = parse_u64(REQUEST_TIMEOUT_VAR, lookup(REQUEST_TIMEOUT_VAR))?;
        let connect_secs =
            parse_u64(CONNECT_TIMEOUT_VAR, lookup(CONNECT_TIMEOUT_VAR))?.unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);

        let server_error_threshold = match lookup(SERVER_ERROR_THRESHOLD_VAR) {
            None => DEFAULT_SERVER_ERROR_THRESHOLD,
            Some(raw) => parse_threshold(&raw)?,
        };

        Ok(Self { api_base_url, timeouts: Timeouts { request_secs, connect_secs }, server_error_threshold })
    }
}

fn parse_u64(var: &'static str, raw: Option<String>) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = raw.filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|e| ConfigError::Parse { var, message: format!("'{raw}': {e}") })
}

/// Parse a server-error threshold; zero is rejected.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for non-numeric or zero values.
pub fn parse_threshold(raw: &str) -> Result<u32, ConfigError> {
    let parsed = raw.trim().parse::<u32>().map_err(|e| ConfigError::Parse {
        var: SERVER_ERROR_THRESHOLD_VAR,
        message: format!("'{raw}': {e}"),
    })?;
    if parsed == 0 {
        return Err(ConfigError::Parse { var: SERVER_ERROR_THRESHOLD_VAR, message: "must be at least 1".to_owned() });
    }
    Ok(parsed)
}
