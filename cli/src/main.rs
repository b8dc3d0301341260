//! Demonstration workload for memwatch
//!
//! Runs an allocation workload inside a profiled block against a running
//! daemon (see `memwatch-server --help`). With `--leak-mb` some of the
//! allocation is retained past the block so the leak flag fires.

use anyhow::Result;
use clap::Parser;
use memwatch_client::{ClientConfig, ProfiledBlock};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "memwatch")]
#[command(about = "Run a profiled block against a memwatch daemon", long_about = None)]
#[command(version)]
struct Args {
    /// Watcher daemon host
    #[arg(long)]
    host: Option<String>,

    /// Watcher daemon port
    #[arg(long)]
    port: Option<u16>,

    /// Name for the profiled block
    #[arg(short, long, default_value = "memwatch.demo")]
    name: String,

    /// Mebibytes to allocate (and release) inside the block
    #[arg(short, long, default_value = "64")]
    allocate_mb: usize,

    /// Mebibytes to keep allocated past the block, to demonstrate leak flagging
    #[arg(long, default_value = "0")]
    leak_mb: usize,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = ClientConfig::default();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    info!(
        "profiling {:?} ({} MiB workload) via {}",
        args.name,
        args.allocate_mb,
        config.addr()
    );

    let block = ProfiledBlock::enter(&config, &args.name).await?;
    let scratch = touch_pages(args.allocate_mb);
    let leaked = (args.leak_mb > 0).then(|| touch_pages(args.leak_mb));
    drop(scratch);
    let record = block.exit().await?;
    drop(leaked);

    info!(
        "done: peak_usage={} bytes, unreturned={} bytes",
        record.peak_usage, record.unreturned
    );
    Ok(())
}

/// Allocate `mb` mebibytes and write every page so the memory is resident.
fn touch_pages(mb: usize) -> Vec<u8> {
    let mut buf = vec![0u8; mb * 1024 * 1024];
    for page in buf.chunks_mut(4096) {
        page[0] = 1;
    }
    buf
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
