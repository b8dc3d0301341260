//! Watch sessions: baseline, sampling loop, terminal result.
//!
//! A session moves INIT → READY → SAMPLING and ends in exactly one of
//! STOPPED, TIMED_OUT, or FAILED. Whatever the terminal state, the reply is
//! sent on the session's own connection and the connection is then closed;
//! nothing a session does can touch another session or the accept loop.

use crate::config::ServerConfig;
use crate::server::CommandHandler;
use anyhow::Result;
use async_trait::async_trait;
use memwatch_shared::inspector::MemoryInspector;
use memwatch_shared::protocol::transport::Transport;
use memwatch_shared::protocol::{CommandMessage, CommandOption, ReadyMessage, ResultMessage};
use memwatch_shared::types::{Bytes, Pid};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep, Instant};
use tracing::{debug, trace, warn};

/// Handles `profile` commands: one watch session per connection.
pub struct ProfileHandler {
    session_deadline: Duration,
    poll_interval: Duration,
    inspector: Arc<dyn MemoryInspector>,
}

/// How the sampling loop ended.
enum Outcome {
    /// Client sent a stop command.
    Stopped,
    /// Deadline fired while still sampling.
    TimedOut,
    /// Client sent something that was not a stop command.
    UnexpectedCommand(CommandOption),
    /// The connection died under us.
    ClientGone(String),
}

impl ProfileHandler {
    pub fn new(config: &ServerConfig, inspector: Arc<dyn MemoryInspector>) -> Self {
        Self {
            session_deadline: config.session_deadline,
            poll_interval: config.poll_interval,
            inspector,
        }
    }

    /// Run INIT → READY → SAMPLING and produce the terminal result.
    async fn run_session(&self, command: &CommandMessage, transport: &mut Transport) -> ResultMessage {
        if command.option != CommandOption::Start {
            return ResultMessage::fail("a profile session must open with a start command");
        }
        let Some(pid) = command.pid else {
            return ResultMessage::fail("start command is missing a pid");
        };

        // INIT: no baseline, no session.
        let baseline = match self.inspector.resident_memory(pid) {
            Ok(baseline) => baseline,
            Err(e) => {
                warn!("baseline read for pid {pid} failed: {e}");
                return ResultMessage::fail(format!(
                    "could not read baseline memory for process {pid}: {e}"
                ));
            }
        };

        // READY: tell the client sampling is about to begin.
        if let Err(e) = transport.send(&ReadyMessage::ack()).await {
            return ResultMessage::fail(format!(
                "could not acknowledge session for process {pid}: {e}"
            ));
        }

        debug!("sampling pid {pid} (baseline {baseline} bytes)");
        let (max_seen, outcome) = self.sample(pid, baseline, transport).await;

        match outcome {
            Outcome::Stopped => {
                let peak = max_seen.saturating_sub(baseline);
                debug!("session for pid {pid} stopped, peak usage {peak} bytes");
                ResultMessage::ok(peak)
            }
            Outcome::TimedOut => {
                warn!("session for pid {pid} hit its deadline");
                ResultMessage::fail(format!(
                    "watch session for process {pid} exceeded its {:?} deadline",
                    self.session_deadline
                ))
            }
            Outcome::UnexpectedCommand(option) => ResultMessage::fail(format!(
                "expected a stop command while watching process {pid}, got {option:?}"
            )),
            Outcome::ClientGone(cause) => ResultMessage::fail(format!(
                "connection lost while watching process {pid}: {cause}"
            )),
        }
    }

    /// SAMPLING: poll the inspector, fold the running maximum, and race the
    /// stop command against the deadline. A failed read skips that sample; a
    /// target that keeps failing still ends at the deadline.
    async fn sample(&self, pid: Pid, baseline: Bytes, transport: &mut Transport) -> (Bytes, Outcome) {
        let mut max_seen = baseline;
        let deadline = sleep(self.session_deadline);
        tokio::pin!(deadline);
        let mut ticker = interval(self.poll_interval);
        let started = Instant::now();

        let outcome = {
            let stop = transport.recv::<CommandMessage>();
            tokio::pin!(stop);
            loop {
                tokio::select! {
                    received = &mut stop => {
                        break match received {
                            Ok(cmd) if cmd.option == CommandOption::Stop => Outcome::Stopped,
                            Ok(cmd) => Outcome::UnexpectedCommand(cmd.option),
                            Err(e) => Outcome::ClientGone(e.to_string()),
                        };
                    }
                    _ = &mut deadline => break Outcome::TimedOut,
                    _ = ticker.tick() => {
                        match self.inspector.resident_memory(pid) {
                            Ok(current) => max_seen = max_seen.max(current),
                            // Target may have exited mid-session; skip the
                            // sample and let stop or the deadline end things.
                            Err(e) => trace!("sample for pid {pid} skipped: {e}"),
                        }
                    }
                }
            }
        };

        trace!(
            "sampling loop for pid {pid} ran {:?}, max {max_seen} bytes",
            started.elapsed()
        );
        (max_seen, outcome)
    }
}

#[async_trait]
impl CommandHandler for ProfileHandler {
    async fn handle(&self, command: CommandMessage, mut transport: Transport) -> Result<()> {
        let result = self.run_session(&command, &mut transport).await;
        if let Err(e) = transport.send(&result).await {
            debug!("could not deliver session result: {e}");
        }
        transport.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memwatch_shared::error::InspectorError;
    use memwatch_shared::protocol::SessionReply;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    /// Returns each reading in turn, then repeats the last one.
    struct SteppingInspector {
        readings: Vec<Bytes>,
        next: AtomicUsize,
    }

    impl SteppingInspector {
        fn new(readings: Vec<Bytes>) -> Self {
            Self {
                readings,
                next: AtomicUsize::new(0),
            }
        }
    }

    impl MemoryInspector for SteppingInspector {
        fn resident_memory(&self, _pid: Pid) -> Result<Bytes, InspectorError> {
            let idx = self.next.fetch_add(1, Ordering::Relaxed);
            Ok(self.readings[idx.min(self.readings.len() - 1)])
        }
    }

    struct GoneInspector;

    impl MemoryInspector for GoneInspector {
        fn resident_memory(&self, pid: Pid) -> Result<Bytes, InspectorError> {
            Err(InspectorError::ProcessGone(pid))
        }
    }

    fn handler(inspector: Arc<dyn MemoryInspector>, deadline: Duration) -> ProfileHandler {
        let config = ServerConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            session_deadline: deadline,
            poll_interval: Duration::from_micros(100),
        };
        ProfileHandler::new(&config, inspector)
    }

    async fn transport_pair() -> (Transport, Transport) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connect =
            tokio::spawn(async move { Transport::connect(&addr.to_string()).await.unwrap() });
        let (accepted, _) = listener.accept().await.unwrap();
        (connect.await.unwrap(), Transport::new(accepted))
    }

    #[tokio::test]
    async fn test_stop_reports_peak_above_baseline() {
        let inspector = Arc::new(SteppingInspector::new(vec![50_000_000, 62_000_000]));
        let handler = handler(inspector, Duration::from_secs(5));
        let (mut client, server_side) = transport_pair().await;

        let session =
            tokio::spawn(
                async move { handler.handle(CommandMessage::start(1234), server_side).await },
            );

        let reply: SessionReply = client.recv().await.unwrap();
        assert!(matches!(reply, SessionReply::Ready(ReadyMessage { ready: true })));

        // Give the sampler a few ticks to observe the higher reading.
        tokio::time::sleep(Duration::from_millis(20)).await;
        client.send(&CommandMessage::stop()).await.unwrap();

        let result: ResultMessage = client.recv().await.unwrap();
        assert!(result.success);
        assert_eq!(result.peak_usage, Some(12_000_000));
        session.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_immediate_stop_is_zero_peak() {
        let inspector = Arc::new(SteppingInspector::new(vec![10_000]));
        let handler = handler(inspector, Duration::from_secs(5));
        let (mut client, server_side) = transport_pair().await;

        let session = tokio::spawn(async move {
            handler.handle(CommandMessage::start(1), server_side).await
        });

        let _: SessionReply = client.recv().await.unwrap();
        client.send(&CommandMessage::stop()).await.unwrap();

        let result: ResultMessage = client.recv().await.unwrap();
        assert!(result.success);
        assert_eq!(result.peak_usage, Some(0));
        session.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_baseline_failure_fails_session() {
        let handler = handler(Arc::new(GoneInspector), Duration::from_secs(5));
        let (mut client, server_side) = transport_pair().await;

        let session = tokio::spawn(async move {
            handler.handle(CommandMessage::start(99999), server_side).await
        });

        // No ready ack: the first reply is already the failure result.
        let reply: SessionReply = client.recv().await.unwrap();
        match reply {
            SessionReply::Result(result) => {
                assert!(!result.success);
                assert!(result.message.unwrap().contains("99999"));
            }
            SessionReply::Ready(_) => panic!("session should not have become ready"),
        }
        session.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_deadline_fails_session() {
        let inspector = Arc::new(SteppingInspector::new(vec![1000]));
        let handler = handler(inspector, Duration::from_millis(50));
        let (mut client, server_side) = transport_pair().await;

        let session = tokio::spawn(async move {
            handler.handle(CommandMessage::start(42), server_side).await
        });

        let _: SessionReply = client.recv().await.unwrap();
        // Never send stop; the deadline must end the session.
        let result: ResultMessage = client
            .recv_deadline(Duration::from_secs(2))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.message.unwrap().contains("deadline"));
        session.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_inspector_failures_mid_sampling_respect_deadline() {
        // Baseline succeeds, every later read fails: the session must not
        // spin forever and must still end at the deadline.
        struct BaselineOnly {
            calls: AtomicUsize,
        }
        impl MemoryInspector for BaselineOnly {
            fn resident_memory(&self, pid: Pid) -> Result<Bytes, InspectorError> {
                if self.calls.fetch_add(1, Ordering::Relaxed) == 0 {
                    Ok(5000)
                } else {
                    Err(InspectorError::ProcessGone(pid))
                }
            }
        }

        let inspector = Arc::new(BaselineOnly {
            calls: AtomicUsize::new(0),
        });
        let handler = handler(inspector, Duration::from_millis(50));
        let (mut client, server_side) = transport_pair().await;

        let session = tokio::spawn(async move {
            handler.handle(CommandMessage::start(7), server_side).await
        });

        let _: SessionReply = client.recv().await.unwrap();
        let result: ResultMessage = client
            .recv_deadline(Duration::from_secs(2))
            .await
            .unwrap();
        assert!(!result.success);
        session.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_start_without_pid_rejected() {
        let inspector = Arc::new(SteppingInspector::new(vec![1]));
        let handler = handler(inspector, Duration::from_secs(5));
        let (mut client, server_side) = transport_pair().await;

        let mut command = CommandMessage::start(1);
        command.pid = None;
        let session = tokio::spawn(async move { handler.handle(command, server_side).await });

        let result: ResultMessage = client.recv().await.unwrap();
        assert!(!result.success);
        assert!(result.message.unwrap().contains("pid"));
        session.await.unwrap().unwrap();
    }
}
