//! Hub configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).

use std::net::SocketAddr;

use crate::domain::history_store::{DEFAULT_HISTORY_CAPACITY, DEFAULT_QUERY_LIMIT};
use crate::transport::hub::DEFAULT_OUTBOUND_BUFFER;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// Top-level hub configuration.
///
/// Loaded once at startup via [`HubConfig::from_env`].
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Maximum number of events kept in history.
    pub history_capacity: usize,

    /// Result size of history queries that pass no limit; also the size of
    /// the replay batch sent on connect.
    pub history_default_limit: usize,

    /// Upper bound applied to caller-supplied history limits.
    pub history_max_limit: usize,

    /// Per-connection outbound queue length.
    pub outbound_buffer: usize,

    /// Log output format.
    pub log_format: LogFormat,
}

impl HubConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()?;

        let history_capacity = parse_env("HISTORY_CAPACITY", DEFAULT_HISTORY_CAPACITY).max(1);
        let history_default_limit = parse_env("HISTORY_DEFAULT_LIMIT", DEFAULT_QUERY_LIMIT);
        let history_max_limit = parse_env("HISTORY_MAX_LIMIT", history_capacity);
        let outbound_buffer = parse_env("OUTBOUND_BUFFER", DEFAULT_OUTBOUND_BUFFER);

        let log_format = match std::env::var("LOG_FORMAT").ok().as_deref() {
            Some("json") | Some("JSON") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            listen_addr,
            history_capacity,
            history_default_limit,
            history_max_limit,
            outbound_buffer,
            log_format,
        })
    }

    /// Clamps a caller-supplied history limit to `history_max_limit`.
    #[must_use]
    pub fn clamp_limit(&self, limit: Option<usize>) -> Option<usize> {
        limit.map(|l| l.min(self.history_max_limit))
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            history_default_limit: DEFAULT_QUERY_LIMIT,
            history_max_limit: DEFAULT_HISTORY_CAPACITY,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            log_format: LogFormat::Text,
        }
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
