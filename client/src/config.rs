//! Client configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Watcher daemon host
    pub host: String,

    /// Watcher daemon port
    pub port: u16,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Connect address in `host:port` form.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("MEMWATCH_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("MEMWATCH_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8425),
        }
    }
}
