//! Sender service: wires the configured source and codec into a
//! [`FrameSender`] and runs it until stopped.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info};

use framecast_core::{FrameSender, JpegCodec, SenderStats, StreamError, TestPattern};

use crate::config::SendConfig;

// ── SendService ──────────────────────────────────────────────────

pub struct SendService {
    config: SendConfig,
    remote: SocketAddr,
    running: Arc<AtomicBool>,
}

impl SendService {
    pub fn new(config: SendConfig, remote: SocketAddr) -> Self {
        Self {
            config,
            remote,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Handle that stops the service from another task. The sender loop
    /// watches this flag directly, so clearing it before `run` is honoured.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Bind the socket and stream until the stop handle is cleared or
    /// the source runs out.
    ///
    /// A bind or socket failure is fatal and returned to the caller.
    pub async fn run(&self) -> Result<SenderStats, StreamError> {
        let bind_addr = self
            .config
            .bind_addr()
            .map_err(|_| StreamError::InvalidConfig("network.bind_address is not a socket address"))?;

        let mut sender = FrameSender::bind(bind_addr, self.remote, self.config.to_sender_config())
            .await?
            .with_stop_handle(Arc::clone(&self.running));
        info!("UDP sender on {} → {}", sender.local_addr()?, self.remote);

        let mut source = TestPattern::new(self.config.source.width, self.config.source.height);
        if self.config.source.frame_limit > 0 {
            source = source.with_frame_limit(self.config.source.frame_limit);
        }
        let mut encoder = JpegCodec::new();

        let result = sender.run(&mut source, &mut encoder).await;
        self.running.store(false, Ordering::SeqCst);

        match &result {
            Ok(stats) => info!(
                frames = stats.frames_sent,
                dropped = stats.frames_dropped,
                bytes = stats.bytes_sent,
                "sender service stopped"
            ),
            Err(e) => error!("sender failed: {e}"),
        }
        result
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

// ── Tests ────────────────────────────────────────────────────────
