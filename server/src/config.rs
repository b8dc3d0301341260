//! Watcher daemon configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default bound on a single watch session.
pub const DEFAULT_SESSION_DEADLINE: Duration = Duration::from_secs(10);

/// Default pause between resident-memory polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_micros(100);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address for the watch protocol
    pub listen_addr: String,

    /// Hard bound on a single watch session. A healthy session always ends
    /// with a client stop; this is the safety net when one never arrives.
    pub session_deadline: Duration,

    /// Pause between resident-memory polls, yielding the processor so
    /// sampling never starves other sessions.
    pub poll_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: std::env::var("MEMWATCH_LISTEN")
                .unwrap_or_else(|_| "127.0.0.1:8425".to_string()),
            session_deadline: std::env::var("MEMWATCH_SESSION_DEADLINE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_SESSION_DEADLINE),
            poll_interval: std::env::var("MEMWATCH_POLL_INTERVAL_US")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_micros)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.session_deadline, Duration::from_secs(10));
        assert_eq!(config.poll_interval, Duration::from_micros(100));
        assert!(config.listen_addr.contains(':'));
    }
}
