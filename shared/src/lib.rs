//! Shared types and protocol for memwatch
//!
//! This crate contains the wire protocol, the framed transport, and the
//! resident-memory inspector capability used by both the watcher daemon and
//! the client library.

pub mod error;
pub mod inspector;
pub mod protocol;
pub mod types;

// Re-export commonly used types
pub use error::{InspectorError, TransportError};
pub use types::{Bytes, Pid};
