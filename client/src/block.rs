//! Scoped profiling of a block of code.
//!
//! `enter` records the caller's own resident memory and opens a watch session
//! for the caller's pid; `exit` stops the session, computes the caller's
//! delta, and emits the metric. The enter/exit pair is explicit rather than a
//! drop guard: stopping the session is async and its failure must propagate,
//! and a measurement that silently vanished would read as "no leak".

use crate::config::ClientConfig;
use crate::emit::{emit_with_fallback, ConsoleEmitter, Emitter, MetricRecord};
use crate::error::ClientError;
use crate::stub::WatcherClient;
use memwatch_shared::inspector::{MemoryInspector, ProcfsInspector};
use memwatch_shared::types::{Bytes, Pid};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// An entered profiled block: the watch session is live and the caller's
/// starting memory has been recorded.
pub struct ProfiledBlock {
    block_name: String,
    pid: Pid,
    start_mem: Bytes,
    client: WatcherClient,
    emitter: Arc<dyn Emitter>,
    inspector: Arc<dyn MemoryInspector>,
}

impl std::fmt::Debug for ProfiledBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfiledBlock")
            .field("block_name", &self.block_name)
            .field("pid", &self.pid)
            .field("start_mem", &self.start_mem)
            .finish_non_exhaustive()
    }
}

/// Configures a profiled block before entering it.
pub struct ProfiledBlockBuilder {
    config: ClientConfig,
    block_name: String,
    emitter: Arc<dyn Emitter>,
    inspector: Arc<dyn MemoryInspector>,
}

impl ProfiledBlockBuilder {
    /// Substitute a custom emitter. If it fails at emit time the console
    /// emitter runs instead; the failure never reaches the workload.
    pub fn with_emitter(mut self, emitter: Arc<dyn Emitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// Substitute the reader used for the caller's own memory.
    pub fn with_inspector(mut self, inspector: Arc<dyn MemoryInspector>) -> Self {
        self.inspector = inspector;
        self
    }

    /// Record the caller's memory and open the watch session.
    pub async fn enter(self) -> Result<ProfiledBlock, ClientError> {
        let pid = std::process::id();
        let start_mem = self.inspector.resident_memory(pid)?;
        let client = WatcherClient::start(&self.config, pid).await?;
        debug!(
            "entered profiled block {:?} (pid {pid}, start_mem {start_mem} bytes)",
            self.block_name
        );
        Ok(ProfiledBlock {
            block_name: self.block_name,
            pid,
            start_mem,
            client,
            emitter: self.emitter,
            inspector: self.inspector,
        })
    }
}

impl ProfiledBlock {
    pub fn builder(config: ClientConfig, block_name: impl Into<String>) -> ProfiledBlockBuilder {
        ProfiledBlockBuilder {
            config,
            block_name: block_name.into(),
            emitter: Arc::new(ConsoleEmitter),
            inspector: Arc::new(ProcfsInspector),
        }
    }

    /// Enter a block with the default emitter and inspector.
    pub async fn enter(
        config: &ClientConfig,
        block_name: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Self::builder(config.clone(), block_name).enter().await
    }

    /// Stop the session, compute the caller's memory delta, and emit the
    /// metric. A failed stop is a failed measurement and propagates.
    pub async fn exit(self) -> Result<MetricRecord, ClientError> {
        let peak_usage = self.client.stop().await?;
        let end_mem = self.inspector.resident_memory(self.pid)?;
        let unreturned = end_mem as i64 - self.start_mem as i64;

        let record = MetricRecord {
            block_name: self.block_name,
            peak_usage,
            unreturned,
        };
        emit_with_fallback(self.emitter.as_ref(), &ConsoleEmitter, &record);
        Ok(record)
    }
}

/// Profile an async block of work: the function-decoration equivalent of
/// entering and exiting a [`ProfiledBlock`] by hand. The workload's output is
/// returned once the metric has been emitted.
pub async fn profiled<F, Fut, T>(
    config: &ClientConfig,
    block_name: &str,
    work: F,
) -> Result<T, ClientError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let block = ProfiledBlock::enter(config, block_name).await?;
    let output = work().await;
    block.exit().await?;
    Ok(output)
}
