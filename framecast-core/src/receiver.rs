//! Receive loop: collect chunks from UDP, reassemble, decode, present.
//!
//! The loop never blocks longer than `poll_timeout` waiting for a
//! datagram, so bound enforcement and the stop flag are checked even on
//! an idle link. Every datagram is validated before it can touch the
//! [`ReassemblyTable`]; malformed ones are counted and dropped.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tracing::{debug, info, trace, warn};

use crate::error::{CodecError, ProtocolError, StreamError};
use crate::fragment::Chunk;
use crate::limits::ProtocolLimits;
use crate::media::{FrameDecoder, FrameSink};
use crate::reassembly::{EvictionReason, InsertOutcome, ReassemblyConfig, ReassemblyTable};
use crate::throughput::ThroughputMeter;

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

// ── ReceiverConfig ───────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub limits: ProtocolLimits,
    pub reassembly: ReassemblyConfig,
    /// Longest wait for a datagram before the loop runs maintenance.
    pub poll_timeout: Duration,
    /// When set, datagrams from any other address are ignored.
    pub expected_peer: Option<SocketAddr>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            limits: ProtocolLimits::default(),
            reassembly: ReassemblyConfig::default(),
            poll_timeout: Duration::from_millis(10),
            expected_peer: None,
        }
    }
}

impl ReceiverConfig {
    pub fn validate(&self) -> Result<(), StreamError> {
        self.limits.validate()?;
        self.reassembly.validate()?;
        if self.poll_timeout.is_zero() {
            return Err(StreamError::InvalidConfig("poll_timeout must be non-zero"));
        }
        Ok(())
    }
}

// ── Outcomes and stats ───────────────────────────────────────────

/// Result of one [`FrameReceiver::poll_once`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing arrived within `poll_timeout`.
    Idle,
    /// A datagram arrived but was dropped without being an error:
    /// foreign sender, late start, or duplicate.
    Ignored,
    /// The datagram failed validation.
    Rejected(ProtocolError),
    /// The chunk was stored; its frame is still incomplete.
    Pending,
    /// A frame completed and was handed to the sink.
    Delivered { frame_id: u32, bytes: usize },
    /// A frame completed but could not be decoded.
    DecodeFailed { frame_id: u32, error: CodecError },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    pub datagrams: u64,
    pub bytes_received: u64,
    pub malformed: u64,
    pub foreign: u64,
    pub late_starts: u64,
    pub duplicates: u64,
    pub frames_completed: u64,
    pub frames_decoded: u64,
    pub decode_failures: u64,
    pub evicted_capacity: u64,
    pub evicted_expired: u64,
}

// ── FrameReceiver ────────────────────────────────────────────────

/// Receive-side session. Owns the socket, the reassembly table, and
/// the receive buffer.
pub struct FrameReceiver {
    socket: UdpSocket,
    config: ReceiverConfig,
    table: ReassemblyTable,
    /// One byte larger than the largest legal datagram so oversize
    /// datagrams are caught rather than silently truncated.
    buf: Vec<u8>,
    stats: ReceiverStats,
    throughput: ThroughputMeter,
    running: Arc<AtomicBool>,
}

impl FrameReceiver {
    pub fn new(socket: UdpSocket, config: ReceiverConfig) -> Result<Self, StreamError> {
        config.validate()?;
        Ok(Self {
            socket,
            table: ReassemblyTable::new(config.reassembly),
            buf: vec![0u8; config.limits.max_datagram_size() + 1],
            config,
            stats: ReceiverStats::default(),
            throughput: ThroughputMeter::new(),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub async fn bind(bind_addr: SocketAddr, config: ReceiverConfig) -> Result<Self, StreamError> {
        let socket = UdpSocket::bind(bind_addr).await?;
        Self::new(socket, config)
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

    pub fn table(&self) -> &ReassemblyTable {
        &self.table
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    /// Run until stopped or a fatal transport error occurs.
    ///
    /// Returns at once if the stop handle was cleared beforehand.
    pub async fn run<D, K>(&mut self, decoder: &mut D, sink: &mut K) -> Result<ReceiverStats, StreamError>
    where
        D: FrameDecoder,
        K: FrameSink,
    {
        let mut last_report = Instant::now();
        let local = self.local_addr()?;
        info!(
            local = %local,
            peer = ?self.config.expected_peer,
            max_pending = self.config.reassembly.max_pending_frames,
            "receiver started"
        );

        while self.running.load(Ordering::SeqCst) {
            match self.poll_once(decoder, sink).await {
                Ok(_) => {}
                Err(e) if e.is_fatal() => {
                    self.running.store(false, Ordering::SeqCst);
                    return Err(e);
                }
                Err(e) => warn!("receive loop: {e}"),
            }
            if last_report.elapsed() >= REPORT_INTERVAL {
                self.report();
                last_report = Instant::now();
            }
        }

        info!(
            frames = self.stats.frames_decoded,
            malformed = self.stats.malformed,
            "receiver stopped"
        );
        Ok(self.stats.clone())
    }

    /// Wait up to `poll_timeout` for one datagram and process it, then
    /// enforce the reassembly bounds.
    pub async fn poll_once<D, K>(&mut self, decoder: &mut D, sink: &mut K) -> Result<PollOutcome, StreamError>
    where
        D: FrameDecoder,
        K: FrameSink,
    {
        let outcome = match self.recv().await? {
            None => PollOutcome::Idle,
            Some((len, from)) => self.process(len, from, decoder, sink),
        };
        self.enforce_bounds(Instant::now());
        Ok(outcome)
    }

    /// Validate one datagram and feed it to the reassembly table.
    ///
    /// Updates the counters but never decodes; a completed frame is
    /// returned as [`InsertOutcome::Complete`].
    pub fn handle_datagram(&mut self, datagram: &[u8], now: Instant) -> Result<InsertOutcome, ProtocolError> {
        self.stats.datagrams += 1;
        self.stats.bytes_received += datagram.len() as u64;

        let outcome = Chunk::parse(datagram, &self.config.limits)
            .and_then(|chunk| self.table.insert(chunk, now))
            .inspect_err(|e| {
                self.stats.malformed += 1;
                debug!(len = datagram.len(), "dropping datagram: {e}");
            })?;

        match &outcome {
            InsertOutcome::Stored { .. } => {}
            InsertOutcome::Complete { frame_id, data } => {
                self.stats.frames_completed += 1;
                self.throughput.record(data.len() as u64);
                trace!(frame_id, bytes = data.len(), "frame reassembled");
            }
            InsertOutcome::Duplicate { frame_id, chunk_index } => {
                self.stats.duplicates += 1;
                trace!(frame_id, chunk_index, "duplicate chunk");
            }
            InsertOutcome::LateStart { frame_id, chunk_index } => {
                self.stats.late_starts += 1;
                trace!(frame_id, chunk_index, "chunk for unknown frame");
            }
        }
        Ok(outcome)
    }

    // ── Internal ─────────────────────────────────────────────────

    /// `Ok(None)` covers timeouts, spurious wakeups, and ICMP-induced
    /// errors surfaced by the previous send on this socket.
    async fn recv(&mut self) -> Result<Option<(usize, SocketAddr)>, StreamError> {
        match tokio::time::timeout(self.config.poll_timeout, self.socket.readable()).await {
            Err(_) => return Ok(None),
            Ok(ready) => ready?,
        }
        match self.socket.try_recv_from(&mut self.buf) {
            Ok(received) => Ok(Some(received)),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) if matches!(e.kind(), ErrorKind::ConnectionReset | ErrorKind::ConnectionRefused) => {
                debug!("recv: {e}");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn process<D, K>(&mut self, len: usize, from: SocketAddr, decoder: &mut D, sink: &mut K) -> PollOutcome
    where
        D: FrameDecoder,
        K: FrameSink,
    {
        if self.config.expected_peer.is_some_and(|peer| peer != from) {
            self.stats.foreign += 1;
            trace!(%from, "datagram from unexpected peer");
            return PollOutcome::Ignored;
        }

        let buf = std::mem::take(&mut self.buf);
        let result = self.handle_datagram(&buf[..len], Instant::now());
        self.buf = buf;

        match result {
            Err(e) => PollOutcome::Rejected(e),
            Ok(InsertOutcome::Stored { .. }) => PollOutcome::Pending,
            Ok(InsertOutcome::Duplicate { .. } | InsertOutcome::LateStart { .. }) => PollOutcome::Ignored,
            Ok(InsertOutcome::Complete { frame_id, data }) => match decoder.decode(&data) {
                Ok(frame) => {
                    self.stats.frames_decoded += 1;
                    sink.present(frame);
                    PollOutcome::Delivered {
                        frame_id,
                        bytes: data.len(),
                    }
                }
                Err(error) => {
                    self.stats.decode_failures += 1;
                    warn!(frame_id, bytes = data.len(), "discarding frame: {error}");
                    PollOutcome::DecodeFailed { frame_id, error }
                }
            },
        }
    }

    fn enforce_bounds(&mut self, now: Instant) {
        for eviction in self.table.enforce_bounds(now) {
            match eviction.reason {
                EvictionReason::Capacity => self.stats.evicted_capacity += 1,
                EvictionReason::Expired => self.stats.evicted_expired += 1,
            }
            debug!(
                frame_id = eviction.frame_id,
                received = eviction.received,
                total = eviction.total_chunks,
                reason = ?eviction.reason,
                "incomplete frame evicted"
            );
        }
    }

    fn report(&self) {
        info!(
            fps = format_args!("{:.1}", self.throughput.frames_per_sec()),
            kbps = self.throughput.bytes_per_sec() * 8 / 1000,
            pending = self.table.len(),
            decoded = self.stats.frames_decoded,
            evicted = self.stats.evicted_capacity + self.stats.evicted_expired,
            "receiver throughput"
        );
    }
}

// ── Tests ────────────────────────────────────────────────────────
