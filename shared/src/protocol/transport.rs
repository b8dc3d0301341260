//! Framed request/response transport over a TCP stream.

use crate::error::TransportError;
use crate::protocol::wire;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

/// One side of a watch-protocol connection.
///
/// Both the client stub and the daemon's per-connection tasks speak through
/// this; neither touches the socket directly.
#[derive(Debug)]
pub struct Transport {
    stream: Option<TcpStream>,
}

impl Transport {
    /// Wrap an accepted connection.
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    /// Open a connection to `addr` (`host:port`).
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| TransportError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        debug!("connected to watcher at {addr}");
        Ok(Self::new(stream))
    }

    /// Write one message as a frame.
    pub async fn send<T: Serialize>(&mut self, msg: &T) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        wire::write_frame(stream, msg).await
    }

    /// Block until one full frame arrives and decode it.
    pub async fn recv<T: DeserializeOwned>(&mut self) -> Result<T, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        wire::read_frame(stream).await
    }

    /// Like [`recv`](Self::recv), but gives up after `timeout`.
    pub async fn recv_deadline<T: DeserializeOwned>(
        &mut self,
        timeout: Duration,
    ) -> Result<T, TransportError> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        }
    }

    /// Shut the connection down. Calling this twice is a no-op.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
    }
}
