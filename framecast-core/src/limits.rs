//! Protocol limits shared by both ends of a session.

use crate::error::StreamError;
use crate::header::HEADER_SIZE;

/// Default payload bytes per chunk. Header + payload stays under the
/// 65 507-byte UDP ceiling with room to spare, and well clear of the
/// point where local IP fragmentation buffers start dropping.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 58_000;

/// Default ceiling on chunks per frame.
pub const DEFAULT_MAX_CHUNKS: u32 = 100;

/// Largest payload a single UDP/IPv4 datagram can carry.
pub const MAX_UDP_PAYLOAD: usize = 65_507;

/// Chunking limits. Sender and receiver must agree on these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolLimits {
    /// Maximum payload bytes in one chunk (excluding the header).
    pub max_chunk_size: usize,
    /// Maximum `total_chunks` a frame may declare.
    pub max_chunks: u32,
}

impl Default for ProtocolLimits {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            max_chunks: DEFAULT_MAX_CHUNKS,
        }
    }
}

impl ProtocolLimits {
    /// Largest datagram these limits allow on the wire.
    pub fn max_datagram_size(&self) -> usize {
        HEADER_SIZE + self.max_chunk_size
    }

    /// Largest encoded frame that can be sent without exceeding `max_chunks`.
    pub fn max_frame_size(&self) -> usize {
        self.max_chunk_size.saturating_mul(self.max_chunks as usize)
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if self.max_chunk_size == 0 {
            return Err(StreamError::InvalidConfig("max_chunk_size must be non-zero"));
        }
        if self.max_datagram_size() > MAX_UDP_PAYLOAD {
            return Err(StreamError::InvalidConfig(
                "max_chunk_size plus header exceeds the UDP payload limit",
            ));
        }
        if self.max_chunks == 0 {
            return Err(StreamError::InvalidConfig("max_chunks must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let limits = ProtocolLimits::default();
        assert!(limits.validate().is_ok());
        assert_eq!(limits.max_datagram_size(), 58_012);
        assert_eq!(limits.max_frame_size(), 5_800_000);
    }

    #[test]
    fn rejects_zero_and_oversized() {
        let zero = ProtocolLimits {
            max_chunk_size: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let no_chunks = ProtocolLimits {
            max_chunks: 0,
            ..Default::default()
        };
        assert!(no_chunks.validate().is_err());

        let too_big = ProtocolLimits {
            max_chunk_size: MAX_UDP_PAYLOAD,
            ..Default::default()
        };
        assert!(too_big.validate().is_err());
    }
}
