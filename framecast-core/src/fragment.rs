//! Splitting encoded frames into header-prefixed chunks.
//!
//! A frame of `len` bytes becomes `ceil(len / max_chunk_size)` chunks;
//! every chunk but the last carries exactly `max_chunk_size` bytes.
//! Payloads are zero-copy slices of the frame buffer.

use bytes::{Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::header::{ChunkHeader, HEADER_SIZE};
use crate::limits::ProtocolLimits;

// ── Chunk ────────────────────────────────────────────────────────

/// One fragment of a frame, sized to fit a single datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub header: ChunkHeader,
    pub payload: Bytes,
}

impl Chunk {
    pub fn frame_id(&self) -> u32 {
        self.header.frame_id
    }

    pub fn chunk_index(&self) -> u32 {
        self.header.chunk_index
    }

    pub fn total_chunks(&self) -> u32 {
        self.header.total_chunks
    }

    /// Header followed by payload, ready for `send_to`.
    pub fn to_datagram(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        self.header.write_to(&mut buf);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// Parse and validate a received datagram against `limits`.
    ///
    /// Rejects datagrams with no payload, `total_chunks` outside
    /// `1..=max_chunks`, an index at or past `total_chunks`, or a payload
    /// larger than `max_chunk_size`.
    pub fn parse(datagram: &[u8], limits: &ProtocolLimits) -> Result<Self, ProtocolError> {
        if datagram.len() <= HEADER_SIZE {
            return Err(ProtocolError::Truncated {
                len: datagram.len(),
            });
        }
        let header = ChunkHeader::decode(datagram)?;

        if header.total_chunks == 0 || header.total_chunks > limits.max_chunks {
            return Err(ProtocolError::TotalChunksOutOfRange {
                total: header.total_chunks,
                max: limits.max_chunks,
            });
        }
        if header.chunk_index >= header.total_chunks {
            return Err(ProtocolError::ChunkIndexOutOfRange {
                index: header.chunk_index,
                total: header.total_chunks,
            });
        }
        let size = datagram.len() - HEADER_SIZE;
        if size > limits.max_chunk_size {
            return Err(ProtocolError::ChunkSizeOutOfRange {
                size,
                max: limits.max_chunk_size,
            });
        }

        Ok(Self {
            header,
            payload: Bytes::copy_from_slice(&datagram[HEADER_SIZE..]),
        })
    }
}

// ── Fragmenter ───────────────────────────────────────────────────

/// Deterministic frame splitter.
#[derive(Debug, Clone, Copy)]
pub struct Fragmenter {
    limits: ProtocolLimits,
}

impl Fragmenter {
    pub fn new(limits: ProtocolLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ProtocolLimits {
        &self.limits
    }

    /// Number of chunks a frame of `len` bytes splits into.
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.limits.max_chunk_size)
    }

    /// Split `data` into ordered chunks tagged with `frame_id`.
    pub fn fragment(&self, frame_id: u32, data: Bytes) -> Result<Vec<Chunk>, ProtocolError> {
        if data.is_empty() {
            return Err(ProtocolError::EmptyFrame);
        }
        let count = self.chunk_count(data.len());
        if data.len() > self.limits.max_frame_size() {
            return Err(ProtocolError::FrameTooLarge {
                size: data.len(),
                chunks: count,
                max: self.limits.max_chunks,
            });
        }

        // count <= max_chunks (a u32), so the casts below cannot truncate.
        let total = count as u32;
        let step = self.limits.max_chunk_size;
        let chunks = (0..count)
            .map(|idx| {
                let start = idx * step;
                let end = (start + step).min(data.len());
                Chunk {
                    header: ChunkHeader::new(frame_id, idx as u32, total),
                    payload: data.slice(start..end),
                }
            })
            .collect();
        Ok(chunks)
    }
}

// ── Tests ────────────────────────────────────────────────────────
