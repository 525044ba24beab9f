//! # framecast-core
//!
//! Best-effort video frame streaming over UDP.
//!
//! An encoded frame is split into chunks that each fit one datagram.
//! Every chunk carries a 12-byte big-endian header
//! `(frame_id, chunk_index, total_chunks)`. The receiver reassembles
//! chunks into frames in a bounded table and drops what it cannot
//! complete. Nothing is retransmitted; the sender instead lowers its
//! encoder quality when sends fail and raises it again while they
//! succeed.
//!
//! This crate contains:
//! - **Wire format**: [`ChunkHeader`], [`Chunk`], [`ProtocolLimits`]
//! - **Fragmentation**: [`Fragmenter`]
//! - **Reassembly**: [`ReassemblyTable`] with capacity and TTL eviction
//! - **Adaptation**: [`QualityController`]
//! - **Loops**: [`FrameSender`] and [`FrameReceiver`] over `tokio` UDP
//! - **Media**: capture/codec/display traits, a [`TestPattern`] source
//!   and a [`JpegCodec`]
//! - **Error**: [`StreamError`], a `thiserror`-based hierarchy

pub mod error;
pub mod fragment;
pub mod header;
pub mod limits;
pub mod media;
pub mod quality;
pub mod reassembly;
pub mod receiver;
pub mod sender;
pub mod throughput;

// ── Re-exports ───────────────────────────────────────────────────

pub use error::{CodecError, ProtocolError, StreamError};
pub use fragment::{Chunk, Fragmenter};
pub use header::{ChunkHeader, HEADER_SIZE};
pub use limits::{DEFAULT_MAX_CHUNK_SIZE, DEFAULT_MAX_CHUNKS, MAX_UDP_PAYLOAD, ProtocolLimits};
pub use media::{
    DEFAULT_MAX_DECODE_HEIGHT, DEFAULT_MAX_DECODE_WIDTH, FrameDecoder, FrameEncoder, FrameSink, FrameSource, JpegCodec,
    PixelFormat, RawFrame, TestPattern,
};
pub use quality::{QualityChange, QualityConfig, QualityController};
pub use reassembly::{
    DEFAULT_MAX_PENDING_FRAMES, Eviction, EvictionReason, InsertOutcome, MAX_PENDING_FRAMES_LIMIT, PendingFrame,
    ReassemblyConfig, ReassemblyTable,
};
pub use receiver::{FrameReceiver, PollOutcome, ReceiverConfig, ReceiverStats};
pub use sender::{DropReason, FrameOutcome, FrameSender, SenderConfig, SenderStats, StepOutcome};
pub use throughput::ThroughputMeter;
