//! External collaborators of the streaming loops.
//!
//! The core never captures, encodes, decodes, or displays pixels
//! itself; it talks to these four traits. Concrete implementations
//! live alongside:
//!
//! | Module    | Provides                                          |
//! |-----------|---------------------------------------------------|
//! | `types`   | [`RawFrame`] and [`PixelFormat`]                  |
//! | `pattern` | [`TestPattern`], a synthetic capture source       |
//! | `jpeg`    | [`JpegCodec`], encoder and decoder via `image`    |

pub mod jpeg;
pub mod pattern;
pub mod types;

pub use jpeg::{DEFAULT_MAX_DECODE_HEIGHT, DEFAULT_MAX_DECODE_WIDTH, JpegCodec};
pub use pattern::TestPattern;
pub use types::{PixelFormat, RawFrame};

use crate::error::CodecError;

/// Produces successive raw frames on demand.
pub trait FrameSource {
    /// `None` means no frame is available right now. The sender skips
    /// the iteration; it is not an error.
    fn next_frame(&mut self) -> Option<RawFrame>;

    /// Whether the source will never produce another frame. The sender
    /// loop exits once this turns true.
    fn is_finished(&self) -> bool {
        false
    }
}

/// Compresses a raw frame at a given quality.
pub trait FrameEncoder {
    fn encode(&mut self, frame: &RawFrame, quality: u8) -> Result<Vec<u8>, CodecError>;
}

/// Reconstructs a raw frame from an assembled byte buffer.
pub trait FrameDecoder {
    fn decode(&mut self, data: &[u8]) -> Result<RawFrame, CodecError>;
}

/// Consumes decoded frames (display, recording, statistics).
pub trait FrameSink {
    fn present(&mut self, frame: RawFrame);
}
