//! Framecast receiver entry point.
//!
//! ```text
//! framecast-recv                      Listen using framecast-recv.toml (or defaults)
//! framecast-recv --config <path>      Use custom config TOML
//! framecast-recv --bind <addr:port>   Override network.bind_address
//! framecast-recv --gen-config         Dump default config and exit
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use framecast_recv::config::RecvConfig;
use framecast_recv::service::RecvService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "framecast-recv", about = "Receive and decode frames streamed over UDP")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "framecast-recv.toml")]
    config: PathBuf,

    /// Listen address (overrides config). Example: 0.0.0.0:5005
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Only accept datagrams from this sender (overrides config).
    #[arg(long)]
    peer: Option<SocketAddr>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&RecvConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = RecvConfig::load(&cli.config);
    if let Some(addr) = cli.bind {
        config.network.bind_address = addr.to_string();
    }
    if let Some(peer) = cli.peer {
        config.network.expected_peer = peer.to_string();
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("framecast-recv v{}", env!("CARGO_PKG_VERSION"));
    info!("max pending frames: {}", config.reassembly.max_pending_frames);

    let service = RecvService::new(config);
    let stop = service.stop_handle();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, Ordering::SeqCst);
    });

    let stats = service.run().await?;
    info!(
        "{} frames decoded, {} malformed datagrams, {} late chunks",
        stats.frames_decoded, stats.malformed, stats.late_starts
    );

    Ok(())
}
