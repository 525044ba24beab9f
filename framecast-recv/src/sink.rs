//! Frame sink that publishes running statistics.
//!
//! Decoded frames are not displayed; the sink records their shape and
//! arrival rate and publishes a [`FrameStats`] snapshot through a
//! `tokio::sync::watch` channel so a reporter can read the latest
//! numbers without blocking the receive loop.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use framecast_core::{FrameSink, RawFrame};

/// Intervals averaged for the fps estimate.
const FPS_WINDOW: usize = 60;

// ── FrameStats ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    /// Smoothed frames per second.
    pub fps: f64,
    /// Frames presented since start.
    pub total_frames: u64,
    /// Decoded pixel bytes presented since start.
    pub total_bytes: u64,
    pub width: u32,
    pub height: u32,
}

// ── StatsSink ────────────────────────────────────────────────────

pub struct StatsSink {
    stats_tx: watch::Sender<FrameStats>,
    stats_rx: watch::Receiver<FrameStats>,
    intervals: VecDeque<Duration>,
    last_frame: Option<Instant>,
    total_frames: u64,
    total_bytes: u64,
}

impl StatsSink {
    pub fn new() -> Self {
        let (stats_tx, stats_rx) = watch::channel(FrameStats::default());
        Self {
            stats_tx,
            stats_rx,
            intervals: VecDeque::with_capacity(FPS_WINDOW),
            last_frame: None,
            total_frames: 0,
            total_bytes: 0,
        }
    }

    /// A receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<FrameStats> {
        self.stats_rx.clone()
    }

    fn fps(&self) -> f64 {
        if self.intervals.is_empty() {
            return 0.0;
        }
        let avg = self.intervals.iter().map(Duration::as_secs_f64).sum::<f64>() / self.intervals.len() as f64;
        if avg > 0.0 { 1.0 / avg } else { 0.0 }
    }
}

impl Default for StatsSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for StatsSink {
    fn present(&mut self, frame: RawFrame) {
        let now = frame.timestamp;
        if let Some(last) = self.last_frame {
            if self.intervals.len() == FPS_WINDOW {
                self.intervals.pop_front();
            }
            self.intervals.push_back(now.saturating_duration_since(last));
        }
        self.last_frame = Some(now);
        self.total_frames += 1;
        self.total_bytes += frame.data.len() as u64;

        // No receivers is fine; `stats_rx` keeps the channel open anyway.
        let _ = self.stats_tx.send(FrameStats {
            fps: self.fps(),
            total_frames: self.total_frames,
            total_bytes: self.total_bytes,
            width: frame.width,
            height: frame.height,
        });
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use framecast_core::PixelFormat;

    fn frame_at(timestamp: Instant) -> RawFrame {
        let mut f = RawFrame::new(4, 2, PixelFormat::Luma8, vec![0; 8]);
        f.timestamp = timestamp;
        f
    }

    #[test]
    fn publishes_totals_and_shape() {
        let mut sink = StatsSink::new();
        let mut rx = sink.subscribe();
        let t0 = Instant::now();

        sink.present(frame_at(t0));
        assert!(rx.has_changed().unwrap());
        let stats = rx.borrow_and_update().clone();
        assert_eq!(stats.total_frames, 1);
        assert_eq!((stats.width, stats.height), (4, 2));
        assert_eq!(stats.fps, 0.0);

        sink.present(frame_at(t0 + Duration::from_millis(100)));
        assert_eq!(rx.borrow().total_bytes, 16);
    }

    #[test]
    fn fps_from_frame_spacing() {
        let mut sink = StatsSink::new();
        let rx = sink.subscribe();
        let t0 = Instant::now();
        for i in 0..11u32 {
            sink.present(frame_at(t0 + Duration::from_millis(40) * i));
        }
        let fps = rx.borrow().fps;
        assert!((24.9..25.1).contains(&fps), "fps = {fps}");
    }
}
