//! Client library for memwatch
//!
//! Wraps a block of the caller's own code in a watch session against a
//! running memwatch daemon, then emits the measured peak usage together with
//! the caller's own resident-memory delta (the leak signal).
//!
//! ```no_run
//! use memwatch_client::{profiled, ClientConfig};
//!
//! # async fn demo() -> Result<(), memwatch_client::ClientError> {
//! let config = ClientConfig::default();
//! let output = profiled(&config, "reindex.batch", || async {
//!     // workload under measurement
//!     42
//! })
//! .await?;
//! assert_eq!(output, 42);
//! # Ok(())
//! # }
//! ```

pub mod block;
pub mod config;
pub mod emit;
pub mod error;
pub mod stub;

// Re-export the public surface
pub use block::{profiled, ProfiledBlock, ProfiledBlockBuilder};
pub use config::ClientConfig;
pub use emit::{ConsoleEmitter, Emitter, MetricRecord};
pub use error::{ClientError, EmitError};
pub use stub::WatcherClient;
