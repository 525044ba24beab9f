//! Framecast sender entry point.
//!
//! ```text
//! framecast-send                      Stream using framecast-send.toml (or defaults)
//! framecast-send --config <path>      Load a custom config TOML
//! framecast-send --remote <addr:port> Override network.remote_address
//! framecast-send --gen-config         Write default config to stdout
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use framecast_send::config::SendConfig;
use framecast_send::service::SendService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "framecast-send", about = "Stream encoded frames over UDP")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "framecast-send.toml")]
    config: PathBuf,

    /// Receiver address, overriding the config file.
    #[arg(short, long)]
    remote: Option<SocketAddr>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&SendConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let config = SendConfig::load(&cli.config);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let remote = match cli.remote {
        Some(addr) => addr,
        None => config.remote_addr()?,
    };

    info!("framecast-send v{}", env!("CARGO_PKG_VERSION"));
    info!("remote: {remote}");
    info!("target FPS: {}", config.stream.fps);
    info!("source: {}x{}", config.source.width, config.source.height);

    let service = SendService::new(config, remote);
    let stop = service.stop_handle();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    service.run().await?;

    Ok(())
}
