//! Watcher daemon library
//!
//! A long-lived TCP service that watches the resident memory of other
//! processes on request. Each accepted connection carries exactly one
//! command; `profile` commands become watch sessions that sample the target
//! until the client says stop or the session deadline fires.

pub mod config;
pub mod server;
pub mod session;

pub use config::ServerConfig;
pub use server::{CommandHandler, WatcherServer};
