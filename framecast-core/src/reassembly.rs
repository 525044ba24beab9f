//! Receiver-side reassembly of chunked frames.
//!
//! Each in-progress frame lives in a [`PendingFrame`] keyed by
//! `frame_id`. An entry is only created by chunk 0; chunks for an
//! unknown frame with any other index are rejected as late starts.
//! Entries leave the table when their last slot fills (the assembled
//! buffer is returned by value) or when they are evicted.
//!
//! Eviction happens in [`ReassemblyTable::enforce_bounds`], which the
//! receive loop calls after every datagram or poll timeout:
//!
//! 1. If a `frame_ttl` is configured, entries older than it are dropped.
//! 2. While more than `max_pending_frames` entries remain, the oldest
//!    (by insertion order) is dropped, complete or not.
//!
//! An evicted `frame_id` is forgotten entirely; a later chunk 0 for the
//! same id starts a fresh entry.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::error::{ProtocolError, StreamError};
use crate::fragment::Chunk;

/// Default bound on simultaneously incomplete frames.
pub const DEFAULT_MAX_PENDING_FRAMES: usize = 30;

/// Largest accepted `max_pending_frames`.
pub const MAX_PENDING_FRAMES_LIMIT: usize = 4096;

// ── ReassemblyConfig ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReassemblyConfig {
    /// Entries retained before the oldest is force-evicted.
    pub max_pending_frames: usize,
    /// Optional wall-clock expiry measured from chunk 0's arrival.
    pub frame_ttl: Option<Duration>,
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self {
            max_pending_frames: DEFAULT_MAX_PENDING_FRAMES,
            frame_ttl: None,
        }
    }
}

impl ReassemblyConfig {
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.max_pending_frames == 0 {
            return Err(StreamError::InvalidConfig("max_pending_frames must be non-zero"));
        }
        if self.max_pending_frames > MAX_PENDING_FRAMES_LIMIT {
            return Err(StreamError::InvalidConfig("max_pending_frames exceeds 4096"));
        }
        if self.frame_ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(StreamError::InvalidConfig("frame_ttl must be non-zero when set"));
        }
        Ok(())
    }
}

// ── PendingFrame ─────────────────────────────────────────────────

/// A frame whose chunks are still arriving.
#[derive(Debug)]
pub struct PendingFrame {
    frame_id: u32,
    slots: Vec<Option<Bytes>>,
    received: usize,
    first_seen: Instant,
}

impl PendingFrame {
    fn new(frame_id: u32, total_chunks: u32, first_seen: Instant) -> Self {
        Self {
            frame_id,
            slots: vec![None; total_chunks as usize],
            received: 0,
            first_seen,
        }
    }

    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    pub fn total_chunks(&self) -> u32 {
        // Sized from a validated u32 in `new`.
        self.slots.len() as u32
    }

    pub fn received(&self) -> usize {
        self.received
    }

    pub fn is_complete(&self) -> bool {
        self.received == self.slots.len()
    }

    /// Returns `false` if the slot was already filled.
    fn store(&mut self, index: usize, payload: Bytes) -> bool {
        match self.slots.get_mut(index) {
            Some(slot @ None) => {
                *slot = Some(payload);
                self.received += 1;
                true
            }
            _ => false,
        }
    }

    /// Concatenate all slots in index order.
    fn assemble(self) -> Vec<u8> {
        let len = self.slots.iter().flatten().map(Bytes::len).sum();
        let mut data = Vec::with_capacity(len);
        for payload in self.slots.into_iter().flatten() {
            data.extend_from_slice(&payload);
        }
        data
    }
}

// ── Outcomes ─────────────────────────────────────────────────────

/// What happened to a chunk handed to [`ReassemblyTable::insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Stored; the frame is still missing chunks.
    Stored {
        frame_id: u32,
        received: usize,
        total_chunks: u32,
    },
    /// This chunk completed the frame. The entry has been removed.
    Complete { frame_id: u32, data: Vec<u8> },
    /// The slot was already filled; the earlier copy is kept.
    Duplicate { frame_id: u32, chunk_index: u32 },
    /// No entry exists and this is not chunk 0.
    LateStart { frame_id: u32, chunk_index: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// The table held more than `max_pending_frames` entries.
    Capacity,
    /// The entry outlived `frame_ttl`.
    Expired,
}

/// A frame dropped before completion. Expected under loss, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eviction {
    pub frame_id: u32,
    pub received: usize,
    pub total_chunks: u32,
    pub reason: EvictionReason,
}

// ── ReassemblyTable ──────────────────────────────────────────────

/// Bounded, insertion-ordered store of in-progress frames.
#[derive(Debug)]
pub struct ReassemblyTable {
    config: ReassemblyConfig,
    entries: HashMap<u32, PendingFrame>,
    /// Frame ids in insertion order, oldest first.
    order: VecDeque<u32>,
}

impl ReassemblyTable {
    pub fn new(config: ReassemblyConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &ReassemblyConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, frame_id: u32) -> bool {
        self.entries.contains_key(&frame_id)
    }

    pub fn get(&self, frame_id: u32) -> Option<&PendingFrame> {
        self.entries.get(&frame_id)
    }

    /// Frame ids oldest first.
    pub fn frame_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.order.iter().copied()
    }

    /// Route a validated chunk into its frame entry.
    ///
    /// Fails without touching the table if the chunk's `total_chunks`
    /// disagrees with an existing entry for the same frame.
    pub fn insert(&mut self, chunk: Chunk, now: Instant) -> Result<InsertOutcome, ProtocolError> {
        let frame_id = chunk.frame_id();
        let chunk_index = chunk.chunk_index();
        let total_chunks = chunk.total_chunks();

        let entry = match self.entries.entry(frame_id) {
            Entry::Occupied(occupied) => {
                let expected = occupied.get().total_chunks();
                if expected != total_chunks {
                    return Err(ProtocolError::TotalChunksMismatch {
                        frame_id,
                        expected,
                        actual: total_chunks,
                    });
                }
                occupied.into_mut()
            }
            Entry::Vacant(_) if chunk_index != 0 => {
                return Ok(InsertOutcome::LateStart {
                    frame_id,
                    chunk_index,
                });
            }
            Entry::Vacant(vacant) => {
                self.order.push_back(frame_id);
                vacant.insert(PendingFrame::new(frame_id, total_chunks, now))
            }
        };

        if !entry.store(chunk_index as usize, chunk.payload) {
            return Ok(InsertOutcome::Duplicate {
                frame_id,
                chunk_index,
            });
        }
        if !entry.is_complete() {
            return Ok(InsertOutcome::Stored {
                frame_id,
                received: entry.received(),
                total_chunks,
            });
        }

        let data = self.remove(frame_id).map(PendingFrame::assemble).unwrap_or_default();
        Ok(InsertOutcome::Complete { frame_id, data })
    }

    /// Apply TTL expiry (if configured) and the pending-frame bound.
    pub fn enforce_bounds(&mut self, now: Instant) -> Vec<Eviction> {
        let mut evicted = Vec::new();

        if let Some(ttl) = self.config.frame_ttl {
            let expired: Vec<u32> = self
                .order
                .iter()
                .copied()
                .filter(|id| {
                    self.entries
                        .get(id)
                        .is_some_and(|e| now.saturating_duration_since(e.first_seen) > ttl)
                })
                .collect();
            for id in expired {
                if let Some(entry) = self.remove(id) {
                    evicted.push(Self::eviction(&entry, EvictionReason::Expired));
                }
            }
        }

        while self.entries.len() > self.config.max_pending_frames {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&oldest) {
                evicted.push(Self::eviction(&entry, EvictionReason::Capacity));
            }
        }

        evicted
    }

    // ── Internal ─────────────────────────────────────────────────

    fn remove(&mut self, frame_id: u32) -> Option<PendingFrame> {
        let entry = self.entries.remove(&frame_id)?;
        if let Some(pos) = self.order.iter().position(|&id| id == frame_id) {
            self.order.remove(pos);
        }
        Some(entry)
    }

    fn eviction(entry: &PendingFrame, reason: EvictionReason) -> Eviction {
        Eviction {
            frame_id: entry.frame_id,
            received: entry.received,
            total_chunks: entry.total_chunks(),
            reason,
        }
    }
}

impl Default for ReassemblyTable {
    fn default() -> Self {
        Self::new(ReassemblyConfig::default())
    }
}

// ── Tests ────────────────────────────────────────────────────────
