//! Client stub for the watch protocol.
//!
//! `start` and `stop` are the whole surface: one connection, one session.
//! Both block (await) until the watcher answers, so the profiled block stays
//! strictly sequential around the workload.

use crate::config::ClientConfig;
use crate::error::ClientError;
use memwatch_shared::protocol::transport::Transport;
use memwatch_shared::protocol::{CommandMessage, ReadyMessage, ResultMessage, SessionReply};
use memwatch_shared::types::{Bytes, Pid};
use std::time::Duration;
use tracing::debug;

/// How long to wait for the ready acknowledgment after sending start.
const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for the terminal result after sending stop. Must exceed
/// the daemon's session deadline, or healthy timeout reports get cut off.
const RESULT_TIMEOUT: Duration = Duration::from_secs(30);

/// An open watch session against the daemon.
pub struct WatcherClient {
    transport: Transport,
}

impl WatcherClient {
    /// Open a watch session for `pid`. Returns once the watcher acknowledges
    /// that sampling is about to begin.
    pub async fn start(config: &ClientConfig, pid: Pid) -> Result<Self, ClientError> {
        let mut transport = Transport::connect(&config.addr())
            .await
            .map_err(|e| ClientError::Unavailable(e.to_string()))?;

        match Self::handshake(&mut transport, pid).await {
            Ok(()) => {
                debug!("watch session open for pid {pid}");
                Ok(Self { transport })
            }
            Err(cause) => {
                transport.close().await;
                Err(ClientError::Unavailable(cause))
            }
        }
    }

    async fn handshake(transport: &mut Transport, pid: Pid) -> Result<(), String> {
        transport
            .send(&CommandMessage::start(pid))
            .await
            .map_err(|e| e.to_string())?;

        let reply: SessionReply = transport
            .recv_deadline(READY_TIMEOUT)
            .await
            .map_err(|e| e.to_string())?;

        match reply {
            SessionReply::Ready(ReadyMessage { ready: true }) => Ok(()),
            SessionReply::Ready(_) => Err("watcher sent a non-ready acknowledgment".to_string()),
            SessionReply::Result(result) => match result.into_peak_usage() {
                Err(message) => Err(message),
                Ok(_) => Err("watcher replied with a result before sampling".to_string()),
            },
        }
    }

    /// End the session and return the observed peak usage in bytes. The
    /// connection is closed whether or not the watcher reports success.
    pub async fn stop(mut self) -> Result<Bytes, ClientError> {
        let result = self.exchange_stop().await;
        self.transport.close().await;
        result
    }

    async fn exchange_stop(&mut self) -> Result<Bytes, ClientError> {
        self.transport.send(&CommandMessage::stop()).await?;
        let result: ResultMessage = self.transport.recv_deadline(RESULT_TIMEOUT).await?;
        result.into_peak_usage().map_err(ClientError::Server)
    }
}
