//! Client-side error taxonomy

use memwatch_shared::{InspectorError, TransportError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The watcher could not be reached, or never acknowledged the session.
    #[error("watcher unavailable: {0}")]
    Unavailable(String),

    /// The watcher reported the session as failed (timeout, lost target, ...).
    #[error("watcher reported failure: {0}")]
    Server(String),

    /// The connection broke after the session was established.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Reading the caller's own resident memory failed.
    #[error("could not read own resident memory: {0}")]
    Inspector(#[from] InspectorError),
}

/// Failure raised by a custom emitter. Contained by the fallback path and
/// never propagated into the profiled workload.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct EmitError(String);

impl EmitError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
