//! Client configuration: endpoint URLs, timeouts, reconnect backoff.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::DracoError;

/// Configuration for a Draco client session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend HTTP API (e.g. `http://127.0.0.1:5000`).
    pub http_base: String,
    /// URL of the duplex bridge (e.g. `ws://127.0.0.1:8765`).
    pub ws_url: String,
    /// Fixed delay before each duplex reconnection attempt.
    pub reconnect_delay: Duration,
    /// TCP connection timeout for the HTTP client.
    pub connect_timeout: Duration,
    /// Per-request read timeout for the HTTP client.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Create a config with defaults matching the stock backend.
    ///
    /// - reconnect_delay: 3 s
    /// - connect_timeout: 3 s
    /// - request_timeout: 30 s
    pub fn new(http_base: impl Into<String>, ws_url: impl Into<String>) -> Self {
        Self {
            http_base: http_base.into(),
            ws_url: ws_url.into(),
            reconnect_delay: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Load overrides from a TOML file on top of the defaults.
    ///
    /// Absent keys keep their default values; an unreadable or unparsable
    /// file is an error (a config file the user pointed at should not be
    /// silently ignored).
    pub fn load(path: &Path) -> Result<Self, DracoError> {
        let raw = std::fs::read_to_string(path)?;
        let file: ConfigFile =
            toml::from_str(&raw).map_err(|e| DracoError::Config(e.to_string()))?;
        Ok(file.into_config())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://127.0.0.1:5000", "ws://127.0.0.1:8765")
    }
}

/// On-disk TOML shape. All keys optional.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    http_base: Option<String>,
    ws_url: Option<String>,
    reconnect_delay_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

impl ConfigFile {
    fn into_config(self) -> ClientConfig {
        let mut cfg = ClientConfig::default();
        if let Some(base) = self.http_base {
            cfg.http_base = base;
        }
        if let Some(ws) = self.ws_url {
            cfg.ws_url = ws;
        }
        if let Some(secs) = self.reconnect_delay_secs {
            cfg.reconnect_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = self.connect_timeout_secs {
            cfg.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.request_timeout_secs {
            cfg.request_timeout = Duration::from_secs(secs);
        }
        cfg
    }
}
