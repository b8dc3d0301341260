//! Connection acceptance and command dispatch.

use crate::config::ServerConfig;
use crate::session::ProfileHandler;
use anyhow::{Context, Result};
use async_trait::async_trait;
use memwatch_shared::inspector::MemoryInspector;
use memwatch_shared::protocol::transport::Transport;
use memwatch_shared::protocol::{CommandMessage, ResultMessage, PROFILE_COMMAND};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// A command the watcher knows how to dispatch.
///
/// One handler instance serves every connection for its command name;
/// per-session state lives inside `handle`, never in the handler itself.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: CommandMessage, transport: Transport) -> Result<()>;
}

/// The watcher daemon: accepts connections, reads one command each, and
/// dispatches it to the registered handler. Holds no cross-session state.
pub struct WatcherServer {
    config: ServerConfig,
    handlers: HashMap<&'static str, Arc<dyn CommandHandler>>,
}

impl WatcherServer {
    /// Build a server with the `profile` command registered.
    pub fn new(config: ServerConfig, inspector: Arc<dyn MemoryInspector>) -> Self {
        let mut handlers: HashMap<&'static str, Arc<dyn CommandHandler>> = HashMap::new();
        handlers.insert(
            PROFILE_COMMAND,
            Arc::new(ProfileHandler::new(&config, inspector)),
        );
        Self { config, handlers }
    }

    /// Register an additional command.
    pub fn register(&mut self, command: &'static str, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(command, handler);
    }

    /// Bind the configured address and accept connections indefinitely.
    pub async fn listen(self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.listen_addr)
            .await
            .with_context(|| format!("failed to bind {}", self.config.listen_addr))?;
        info!("watcher listening on {}", listener.local_addr()?);
        self.serve(listener).await
    }

    /// Accept loop over an already-bound listener (tests bind port 0 and
    /// learn the address before calling this).
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let server = Arc::new(self);
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("accept failed: {e}");
                    continue;
                }
            };
            debug!("accepted connection from {peer}");
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                server.dispatch(stream, peer).await;
            });
        }
    }

    /// Serve one connection: read its command, find the handler, run it.
    /// Failures stay confined to this connection's task.
    async fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        let mut transport = Transport::new(stream);
        let command: CommandMessage = match transport.recv().await {
            Ok(command) => command,
            Err(e) => {
                warn!("dropping connection from {peer}: {e}");
                transport.close().await;
                return;
            }
        };

        match self.handlers.get(command.command.as_str()) {
            Some(handler) => {
                if let Err(e) = handler.handle(command, transport).await {
                    error!("session for {peer} failed: {e:#}");
                }
            }
            None => {
                warn!("unknown command {:?} from {peer}", command.command);
                let reply = ResultMessage::fail(format!("unknown command: {}", command.command));
                if let Err(e) = transport.send(&reply).await {
                    debug!("could not report unknown command to {peer}: {e}");
                }
                transport.close().await;
            }
        }
    }
}
