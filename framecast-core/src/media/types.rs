//! Raw frame representation passed between capture, codec, and sink.

use std::time::Instant;

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout of a [`RawFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 3 bytes per pixel: Red, Green, Blue.
    Rgb8,
    /// 1 byte per pixel, greyscale.
    Luma8,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Luma8 => 1,
        }
    }
}

// ── RawFrame ─────────────────────────────────────────────────────

/// An uncompressed image with tightly packed rows.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// `width * height * bpp` bytes.
    pub data: Vec<u8>,
    /// When the frame was captured or decoded.
    pub timestamp: Instant,
}

impl RawFrame {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            data,
            timestamp: Instant::now(),
        }
    }

    /// Byte length the dimensions and format call for.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Whether `data` matches the declared dimensions.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.expected_len()
    }
}
