//! Error taxonomy for the streaming core.
//!
//! Operations return `Result<T, StreamError>` (or one of its component
//! errors). Only [`StreamError::Transport`] and
//! [`StreamError::InvalidConfig`] ever end a session; protocol and codec
//! errors are handled locally by the loops that see them.

use thiserror::Error;

use crate::header::HEADER_SIZE;

/// Session-level error.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Socket creation, bind, or readiness failure. Fatal to the session.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A datagram or frame violated the chunk protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Encoding or decoding of a frame failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

impl StreamError {
    /// Whether this error must terminate the loop that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StreamError::Transport(_) | StreamError::InvalidConfig(_))
    }
}

// ── ProtocolError ────────────────────────────────────────────────

/// A malformed or out-of-range chunk. The offending datagram is dropped
/// and no reassembly state is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Fewer bytes than a header, or a header with no payload behind it.
    #[error("datagram too short: {len} bytes (header is {HEADER_SIZE})")]
    Truncated { len: usize },

    #[error("total_chunks {total} outside 1..={max}")]
    TotalChunksOutOfRange { total: u32, max: u32 },

    #[error("chunk_index {index} not below total_chunks {total}")]
    ChunkIndexOutOfRange { index: u32, total: u32 },

    #[error("chunk payload of {size} bytes outside 1..={max}")]
    ChunkSizeOutOfRange { size: usize, max: usize },

    /// A chunk disagrees with the frame entry already being filled.
    #[error("frame {frame_id} declared {actual} chunks, entry expects {expected}")]
    TotalChunksMismatch {
        frame_id: u32,
        expected: u32,
        actual: u32,
    },

    #[error("cannot fragment an empty frame")]
    EmptyFrame,

    /// The encoded frame would need more chunks than the receiver accepts.
    #[error("frame of {size} bytes needs {chunks} chunks (max {max})")]
    FrameTooLarge { size: usize, chunks: usize, max: u32 },
}

// ── CodecError ───────────────────────────────────────────────────

/// Failure reported by an external encoder or decoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),
}

impl From<image::ImageError> for CodecError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::Decoding(_) | image::ImageError::Unsupported(_) => {
                CodecError::Decode(e.to_string())
            }
            _ => CodecError::Encode(e.to_string()),
        }
    }
}
