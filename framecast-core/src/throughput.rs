//! Rolling-window throughput meter for loop diagnostics.
//!
//! Each loop records one sample per frame it sends or completes and
//! logs the derived byte and frame rates about once a second.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Tracks `(when, bytes)` samples over a sliding window.
#[derive(Debug)]
pub struct ThroughputMeter {
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
    total_bytes: u64,
}

impl ThroughputMeter {
    /// One-second window.
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(1))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(128),
            window,
            total_bytes: 0,
        }
    }

    /// Record one frame of `bytes` at the current instant.
    pub fn record(&mut self, bytes: u64) {
        self.record_at(Instant::now(), bytes);
    }

    pub fn record_at(&mut self, when: Instant, bytes: u64) {
        self.samples.push_back((when, bytes));
        self.total_bytes += bytes;
        self.evict(when);
    }

    /// Bytes per second across the samples currently in the window.
    ///
    /// The first sample only marks the start of the span, so its bytes
    /// are not counted. Zero until two samples are at least 1 ns apart.
    pub fn bytes_per_sec(&self) -> u64 {
        match (self.span(), self.samples.front()) {
            (Some(secs), Some(&(_, first))) => (self.total_bytes.saturating_sub(first) as f64 / secs) as u64,
            _ => 0,
        }
    }

    /// Intervals between samples per second across the window.
    pub fn frames_per_sec(&self) -> f64 {
        match self.span() {
            Some(secs) => (self.samples.len() - 1) as f64 / secs,
            None => 0.0,
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    // ── Internal ─────────────────────────────────────────────────

    /// Seconds between the first and last sample; `None` when they coincide.
    fn span(&self) -> Option<f64> {
        if self.samples.len() < 2 {
            return None;
        }
        let (first, _) = self.samples.front()?;
        let (last, _) = self.samples.back()?;
        let d = last.saturating_duration_since(*first);
        (!d.is_zero()).then(|| d.as_secs_f64())
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&(ts, bytes)) = self.samples.front() {
            if now.duration_since(ts) > self.window {
                self.samples.pop_front();
                self.total_bytes = self.total_bytes.saturating_sub(bytes);
            } else {
                break;
            }
        }
    }
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new()
    }
}
