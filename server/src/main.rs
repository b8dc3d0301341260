//! Watcher daemon entry point
//!
//! Runs the long-lived memwatch daemon that client processes connect to for
//! out-of-process peak-memory measurement.

use anyhow::Result;
use clap::Parser;
use memwatch_server::{ServerConfig, WatcherServer};
use memwatch_shared::inspector::ProcfsInspector;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "memwatch-server")]
#[command(about = "Out-of-process peak memory watcher daemon", long_about = None)]
#[command(version)]
struct Args {
    /// Address to listen on (host:port)
    #[arg(short, long)]
    listen: Option<String>,

    /// Per-session deadline in seconds
    #[arg(long)]
    deadline: Option<u64>,

    /// Pause between memory polls, in microseconds
    #[arg(long)]
    poll_interval_us: Option<u64>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = ServerConfig::default();
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(secs) = args.deadline {
        config.session_deadline = Duration::from_secs(secs);
    }
    if let Some(us) = args.poll_interval_us {
        config.poll_interval = Duration::from_micros(us);
    }

    info!(
        "starting memwatch daemon on {} (session deadline {:?}, poll interval {:?})",
        config.listen_addr, config.session_deadline, config.poll_interval
    );

    let server = WatcherServer::new(config, Arc::new(ProcfsInspector));
    server.listen().await
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
