//! Error taxonomy shared by the daemon and the client

use crate::types::Pid;
use std::io;
use thiserror::Error;

/// Failures at the transport layer: connecting, framing, and stream I/O.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to watcher at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("transport I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("malformed frame payload: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("frame of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(usize),

    #[error("connection closed by peer")]
    Closed,

    #[error("timed out waiting for a frame")]
    Timeout,
}

/// Failures while reading a process's resident memory.
#[derive(Debug, Error)]
pub enum InspectorError {
    #[error("process {0} does not exist")]
    ProcessGone(Pid),

    #[error("could not parse memory information for process {pid}: {reason}")]
    Malformed { pid: Pid, reason: String },

    #[error("reading memory information for process {pid} failed: {source}")]
    Io {
        pid: Pid,
        #[source]
        source: io::Error,
    },
}
