//! Sender loop: capture, encode, fragment, and pace frames onto UDP.
//!
//! One iteration of [`FrameSender::run`]:
//!
//! 1. Pull a raw frame from the [`FrameSource`] (none available: skip).
//! 2. Encode it at the controller's current quality.
//! 3. Fragment the encoded bytes and send each chunk, waiting at most
//!    `poll_timeout` for the socket to become writable. The first chunk
//!    that cannot be sent drops the rest of the frame; chunks already
//!    on the wire stay there.
//! 4. Report the result to the [`QualityController`].
//! 5. Sleep out the remainder of the frame interval, if any.
//!
//! `frame_id` advances once for every frame handed to the fragmenter,
//! however many of its chunks made it out.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::error::{CodecError, ProtocolError, StreamError};
use crate::fragment::Fragmenter;
use crate::limits::ProtocolLimits;
use crate::media::{FrameEncoder, FrameSource};
use crate::quality::{QualityConfig, QualityController};
use crate::throughput::ThroughputMeter;

/// How often the loop logs its throughput.
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

// ── SenderConfig ─────────────────────────────────────────────────

/// Configuration for [`FrameSender`].
#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub limits: ProtocolLimits,
    pub quality: QualityConfig,
    /// Target frames per second.
    pub target_fps: u32,
    /// Longest wait for write readiness before a chunk counts as unsendable.
    pub poll_timeout: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            limits: ProtocolLimits::default(),
            quality: QualityConfig::default(),
            target_fps: 30,
            poll_timeout: Duration::from_millis(10),
        }
    }
}

impl SenderConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.target_fps.max(1)))
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        self.limits.validate()?;
        self.quality.validate()?;
        if self.target_fps == 0 {
            return Err(StreamError::InvalidConfig("target_fps must be non-zero"));
        }
        if self.poll_timeout.is_zero() {
            return Err(StreamError::InvalidConfig("poll_timeout must be non-zero"));
        }
        Ok(())
    }
}

// ── Outcomes and stats ───────────────────────────────────────────

/// Why a frame stopped partway through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The socket did not become writable within `poll_timeout`.
    NotWritable,
    /// `send_to` reported an error.
    SendFailed(ErrorKind),
}

/// Result of pushing one encoded frame through the fragmenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Every chunk was sent.
    Sent {
        frame_id: u32,
        chunks: usize,
        /// Encoded frame length; headers are in [`SenderStats::wire_bytes`].
        bytes: usize,
    },
    /// Some leading chunks may have gone out; the rest were abandoned.
    Dropped {
        frame_id: u32,
        sent: usize,
        total: usize,
        reason: DropReason,
    },
    /// The frame could not be fragmented (empty or too large).
    Rejected { frame_id: u32, error: ProtocolError },
}

/// Result of one loop iteration.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// The source had nothing to offer.
    NoFrame,
    /// The encoder failed; the frame was skipped.
    EncodeFailed(CodecError),
    Frame(FrameOutcome),
}

/// Running counters for the send side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderStats {
    pub frames_sent: u64,
    pub frames_dropped: u64,
    pub frames_rejected: u64,
    pub frames_skipped: u64,
    pub encode_failures: u64,
    pub chunks_sent: u64,
    /// Encoded frame bytes handed to the socket, headers excluded.
    pub bytes_sent: u64,
    /// Datagram bytes the socket accepted, headers included.
    pub wire_bytes: u64,
    pub send_failures: u64,
}

enum ChunkSend {
    Sent(usize),
    NotWritable,
    Failed(std::io::Error),
}

// ── FrameSender ──────────────────────────────────────────────────

/// Send-side session. Owns the socket and all sender state.
pub struct FrameSender {
    socket: UdpSocket,
    remote_addr: SocketAddr,
    config: SenderConfig,
    fragmenter: Fragmenter,
    quality: QualityController,
    next_frame_id: u32,
    stats: SenderStats,
    throughput: ThroughputMeter,
    running: Arc<AtomicBool>,
}

impl FrameSender {
    /// Wrap a bound socket that will send to `remote_addr`.
    pub fn new(
        socket: UdpSocket,
        remote_addr: SocketAddr,
        config: SenderConfig,
    ) -> Result<Self, StreamError> {
        config.validate()?;
        Ok(Self {
            socket,
            remote_addr,
            fragmenter: Fragmenter::new(config.limits),
            quality: QualityController::new(config.quality),
            config,
            next_frame_id: 0,
            stats: SenderStats::default(),
            throughput: ThroughputMeter::new(),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Bind `bind_addr` and target `remote_addr`.
    pub async fn bind(
        bind_addr: SocketAddr,
        remote_addr: SocketAddr,
        config: SenderConfig,
    ) -> Result<Self, StreamError> {
        let socket = UdpSocket::bind(bind_addr).await?;
        Self::new(socket, remote_addr, config)
    }

    /// Start numbering frames at `frame_id` instead of 0.
    pub fn with_first_frame_id(mut self, frame_id: u32) -> Self {
        self.next_frame_id = frame_id;
        self
    }

    /// Share an externally owned stop flag. Clearing it, even before
    /// [`run`](Self::run) starts, ends the loop.
    pub fn with_stop_handle(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    /// Flag that keeps the loop alive; store `false` to stop it.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn local_addr(&self) -> Result<SocketAddr, StreamError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Quality the next frame will be encoded at.
    pub fn quality(&self) -> u8 {
        self.quality.quality()
    }

    pub fn quality_controller(&self) -> &QualityController {
        &self.quality
    }

    pub fn next_frame_id(&self) -> u32 {
        self.next_frame_id
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }

    /// Run until stopped or the source is finished.
    ///
    /// Returns at once if the stop handle was cleared beforehand.
    pub async fn run<S, E>(&mut self, source: &mut S, encoder: &mut E) -> Result<SenderStats, StreamError>
    where
        S: FrameSource,
        E: FrameEncoder,
    {
        let interval = self.config.frame_interval();
        let mut last_report = Instant::now();
        info!(
            remote = %self.remote_addr,
            fps = self.config.target_fps,
            max_chunk_size = self.config.limits.max_chunk_size,
            "sender started"
        );

        while self.running.load(Ordering::SeqCst) {
            if source.is_finished() {
                info!("source finished");
                break;
            }
            let loop_start = Instant::now();

            match self.step(source, encoder).await {
                Ok(_) => {}
                Err(e) if e.is_fatal() => {
                    self.running.store(false, Ordering::SeqCst);
                    return Err(e);
                }
                Err(e) => warn!("send loop: {e}"),
            }

            if last_report.elapsed() >= REPORT_INTERVAL {
                self.report();
                last_report = Instant::now();
            }

            Self::pace(loop_start, interval).await;
        }

        self.running.store(false, Ordering::SeqCst);
        info!(
            frames_sent = self.stats.frames_sent,
            frames_dropped = self.stats.frames_dropped,
            "sender stopped"
        );
        Ok(self.stats.clone())
    }

    /// One capture → encode → send iteration, without pacing.
    pub async fn step<S, E>(&mut self, source: &mut S, encoder: &mut E) -> Result<StepOutcome, StreamError>
    where
        S: FrameSource,
        E: FrameEncoder,
    {
        let Some(raw) = source.next_frame() else {
            self.stats.frames_skipped += 1;
            return Ok(StepOutcome::NoFrame);
        };

        let quality = self.quality.quality();
        let encoded = match encoder.encode(&raw, quality) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(quality, "skipping frame: {e}");
                self.stats.encode_failures += 1;
                return Ok(StepOutcome::EncodeFailed(e));
            }
        };

        let outcome = self.send_frame(Bytes::from(encoded)).await?;
        Ok(StepOutcome::Frame(outcome))
    }

    /// Fragment and send one encoded frame.
    ///
    /// Only a failure of the socket's readiness machinery is returned as
    /// an error; everything else is reported in the [`FrameOutcome`].
    pub async fn send_frame(&mut self, encoded: Bytes) -> Result<FrameOutcome, StreamError> {
        let frame_id = self.next_frame_id;
        self.next_frame_id = self.next_frame_id.wrapping_add(1);
        let size = encoded.len();

        let chunks = match self.fragmenter.fragment(frame_id, encoded) {
            Ok(chunks) => chunks,
            Err(error) => {
                warn!(
                    frame_id,
                    size,
                    max_frame_size = self.config.limits.max_frame_size(),
                    "frame not sent: {error}"
                );
                self.stats.frames_rejected += 1;
                return Ok(FrameOutcome::Rejected { frame_id, error });
            }
        };

        let total = chunks.len();
        let mut bytes = 0usize;
        for (sent, chunk) in chunks.iter().enumerate() {
            let datagram = chunk.to_datagram();
            let reason = match self.send_datagram(&datagram).await? {
                ChunkSend::Sent(n) => {
                    bytes += chunk.payload.len();
                    self.stats.wire_bytes += n as u64;
                    self.stats.chunks_sent += 1;
                    continue;
                }
                ChunkSend::NotWritable => DropReason::NotWritable,
                ChunkSend::Failed(e) => {
                    warn!(frame_id, chunk = sent, total, "chunk send failed: {e}");
                    self.stats.send_failures += 1;
                    if let Some(change) = self.quality.record_send_failure() {
                        info!(from = change.old, to = change.new, "lowering quality");
                    }
                    DropReason::SendFailed(e.kind())
                }
            };

            debug!(frame_id, sent, total, ?reason, "frame dropped");
            self.stats.frames_dropped += 1;
            self.stats.bytes_sent += bytes as u64;
            return Ok(FrameOutcome::Dropped {
                frame_id,
                sent,
                total,
                reason,
            });
        }

        if let Some(change) = self.quality.record_frame_sent() {
            debug!(from = change.old, to = change.new, "raising quality");
        }
        self.stats.frames_sent += 1;
        self.stats.bytes_sent += bytes as u64;
        self.throughput.record(bytes as u64);
        debug!(frame_id, chunks = total, bytes, "frame sent");

        Ok(FrameOutcome::Sent {
            frame_id,
            chunks: total,
            bytes,
        })
    }

    // ── Internal ─────────────────────────────────────────────────

    async fn send_datagram(&self, datagram: &[u8]) -> Result<ChunkSend, StreamError> {
        match tokio::time::timeout(self.config.poll_timeout, self.socket.writable()).await {
            Err(_) => return Ok(ChunkSend::NotWritable),
            Ok(ready) => ready?,
        }
        Ok(match self.socket.try_send_to(datagram, self.remote_addr) {
            Ok(n) => ChunkSend::Sent(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => ChunkSend::NotWritable,
            Err(e) => ChunkSend::Failed(e),
        })
    }

    fn report(&self) {
        info!(
            fps = format_args!("{:.1}", self.throughput.frames_per_sec()),
            kbps = self.throughput.bytes_per_sec() * 8 / 1000,
            quality = self.quality.quality(),
            sent = self.stats.frames_sent,
            dropped = self.stats.frames_dropped,
            "sender throughput"
        );
    }

    /// Sleep for the remainder of the frame interval.
    async fn pace(loop_start: Instant, interval: Duration) {
        let elapsed = loop_start.elapsed();
        if elapsed < interval {
            tokio::time::sleep(interval - elapsed).await;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
