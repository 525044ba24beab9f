//! Receiver service: binds the socket, runs a [`FrameReceiver`] with
//! the JPEG decoder and a [`StatsSink`], and reports what arrives.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use framecast_core::{FrameReceiver, ReceiverStats, StreamError};

use crate::config::RecvConfig;
use crate::sink::{FrameStats, StatsSink};

/// How often the service logs the sink's snapshot.
const STATS_INTERVAL: Duration = Duration::from_secs(5);

// ── RecvService ──────────────────────────────────────────────────

pub struct RecvService {
    config: RecvConfig,
    running: Arc<AtomicBool>,
    stats_tx: watch::Sender<FrameStats>,
}

impl RecvService {
    pub fn new(config: RecvConfig) -> Self {
        let (stats_tx, _) = watch::channel(FrameStats::default());
        Self {
            config,
            running: Arc::new(AtomicBool::new(true)),
            stats_tx,
        }
    }

    /// Shared with the receive loop; clearing it stops the service.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Frame statistics, updated once per delivered frame while running.
    pub fn stats_receiver(&self) -> watch::Receiver<FrameStats> {
        self.stats_tx.subscribe()
    }

    /// Receive until the stop handle is cleared or the socket fails.
    pub async fn run(&self) -> Result<ReceiverStats, StreamError> {
        let bind_addr = self
            .config
            .bind_addr()
            .map_err(|_| StreamError::InvalidConfig("network.bind_address is not a socket address"))?;
        let expected_peer = self
            .config
            .expected_peer()
            .map_err(|_| StreamError::InvalidConfig("network.expected_peer is not a socket address"))?;

        let mut receiver = FrameReceiver::bind(bind_addr, self.config.to_receiver_config(expected_peer))
            .await?
            .with_stop_handle(Arc::clone(&self.running));
        info!("listening on {}", receiver.local_addr()?);

        let mut decoder = self.config.decoder();
        let mut sink = StatsSink::new();

        // Relay sink snapshots to subscribers and log them periodically.
        let relay = {
            let mut frames = sink.subscribe();
            let out = self.stats_tx.clone();
            let running = Arc::clone(&self.running);
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(STATS_INTERVAL);
                tick.tick().await;
                while running.load(Ordering::SeqCst) {
                    tokio::select! {
                        changed = frames.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            let latest = frames.borrow_and_update().clone();
                            let _ = out.send_replace(latest);
                        }
                        _ = tick.tick() => {
                            let s = out.borrow().clone();
                            info!(
                                fps = format_args!("{:.1}", s.fps),
                                frames = s.total_frames,
                                "{}x{}",
                                s.width,
                                s.height
                            );
                        }
                    }
                }
            })
        };

        let result = receiver.run(&mut decoder, &mut sink).await;
        self.running.store(false, Ordering::SeqCst);
        drop(sink);
        let _ = relay.await;

        match &result {
            Ok(stats) => info!(
                frames = stats.frames_decoded,
                malformed = stats.malformed,
                evicted = stats.evicted_capacity + stats.evicted_expired,
                "receiver service stopped"
            ),
            Err(e) => error!("receiver failed: {e}"),
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

#[cfg(test)]
mod tests {
    use super::*;
    use framecast_core::{FrameEncoder, FrameSender, FrameSource, JpegCodec, SenderConfig, TestPattern};
    use tokio::net::UdpSocket;

    fn local_config() -> RecvConfig {
        let mut config = RecvConfig::default();
        config.network.bind_address = "127.0.0.1:0".into();
        config
    }

    #[tokio::test]
    async fn bad_peer_is_config_error() {
        let mut config = local_config();
        config.network.expected_peer = "somewhere".into();
        let service = RecvService::new(config);
        assert!(matches!(service.run().await, Err(StreamError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn stop_before_run_returns_promptly() {
        let service = RecvService::new(local_config());
        assert!(service.is_running());
        service.stop();

        let stats = tokio::time::timeout(Duration::from_secs(1), service.run())
            .await
            .expect("service ignored the stop request")
            .unwrap();
        assert_eq!(stats.datagrams, 0);
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn publishes_stats_for_received_frames() {
        // Reserve a port, then hand it to the service.
        let port = UdpSocket::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap().port();
        let mut config = local_config();
        config.network.bind_address = format!("127.0.0.1:{port}");

        let service = Arc::new(RecvService::new(config));
        let mut stats = service.stats_receiver();
        let task = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.run().await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let tx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut sender =
            FrameSender::new(tx, format!("127.0.0.1:{port}").parse().unwrap(), SenderConfig::default()).unwrap();
        let mut source = TestPattern::new(48, 32);
        let mut codec = JpegCodec::new();
        for _ in 0..3 {
            let frame = source.next_frame().unwrap();
            let jpeg = codec.encode(&frame, 70).unwrap();
            sender.send_frame(jpeg.into()).await.unwrap();
        }

        tokio::time::timeout(Duration::from_secs(5), stats.wait_for(|s| s.total_frames >= 1))
            .await
            .expect("no frame statistics published")
            .unwrap();
        let latest = stats.borrow().clone();
        assert_eq!((latest.width, latest.height), (48, 32));

        service.stop();
        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("service did not stop")
            .unwrap()
            .unwrap();
        assert!(result.frames_decoded >= 1);
    }
}
