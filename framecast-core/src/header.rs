//! Fixed 12-byte chunk header.
//!
//! ```text
//! offset 0..3  : frame_id      (u32, big-endian)
//! offset 4..7  : chunk_index   (u32, big-endian)
//! offset 8..11 : total_chunks  (u32, big-endian)
//! offset 12..  : chunk payload
//! ```

use bytes::{Buf, BufMut};

use crate::error::ProtocolError;

/// Encoded header length in bytes.
pub const HEADER_SIZE: usize = 12;

/// Per-chunk metadata prefixed to every datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkHeader {
    pub frame_id: u32,
    pub chunk_index: u32,
    pub total_chunks: u32,
}

impl ChunkHeader {
    pub fn new(frame_id: u32, chunk_index: u32, total_chunks: u32) -> Self {
        Self {
            frame_id,
            chunk_index,
            total_chunks,
        }
    }

    /// Serialize to a fixed array.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.frame_id.to_be_bytes());
        buf[4..8].copy_from_slice(&self.chunk_index.to_be_bytes());
        buf[8..12].copy_from_slice(&self.total_chunks.to_be_bytes());
        buf
    }

    /// Append the header to a growable buffer.
    pub fn write_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32(self.frame_id);
        dst.put_u32(self.chunk_index);
        dst.put_u32(self.total_chunks);
    }

    /// Deserialize the first [`HEADER_SIZE`] bytes of `data`.
    ///
    /// Only the length is checked here; range checks against the
    /// configured limits happen in [`Chunk::parse`](crate::Chunk::parse).
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < HEADER_SIZE {
            return Err(ProtocolError::Truncated { len: data.len() });
        }
        let mut cur = &data[..HEADER_SIZE];
        Ok(Self {
            frame_id: cur.get_u32(),
            chunk_index: cur.get_u32(),
            total_chunks: cur.get_u32(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn encodes_big_endian() {
        let hdr = ChunkHeader::new(0x0102_0304, 1, 0xAABB_CCDD);
        assert_eq!(
            hdr.encode(),
            [0x01, 0x02, 0x03, 0x04, 0, 0, 0, 1, 0xAA, 0xBB, 0xCC, 0xDD]
        );
    }

    #[test]
    fn write_to_matches_encode() {
        let hdr = ChunkHeader::new(u32::MAX, 7, 9);
        let mut buf = BytesMut::new();
        hdr.write_to(&mut buf);
        assert_eq!(&buf[..], &hdr.encode()[..]);
    }

    #[test]
    fn decode_ignores_trailing_payload() {
        let mut data = ChunkHeader::new(42, 3, 8).encode().to_vec();
        data.extend_from_slice(b"payload");
        let hdr = ChunkHeader::decode(&data).unwrap();
        assert_eq!(hdr, ChunkHeader::new(42, 3, 8));
    }

    #[test]
    fn decode_too_short() {
        let err = ChunkHeader::decode(&[0u8; 11]).unwrap_err();
        assert_eq!(err, ProtocolError::Truncated { len: 11 });
    }
}
