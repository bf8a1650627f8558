//! HTTP API configuration

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the HTTP server
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Address to bind the API server
    ///
    /// Common values:
    /// - `[::]:8080` (IPv6 any address, port 8080)
    /// - `0.0.0.0:8080` (IPv4 any address, port 8080)
    /// - `127.0.0.1:8080` (localhost only, port 8080)
    ///
    /// Tracking links embedded in messages point at `tracking_base_url` in
    /// the dispatch configuration, which should resolve to this server.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Requests taking longer than this are answered with 408
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_listen_address() -> String {
    "[::]:8080".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    10
}

impl ApiConfig {
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}
