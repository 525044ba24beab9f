//! Synthetic capture source.
//!
//! Renders a diagonal RGB gradient that scrolls one step per frame,
//! overlaid with a fixed-seed hash texture so the encoded size
//! responds to JPEG quality the way camera footage does.

use crate::media::types::{PixelFormat, RawFrame};
use crate::media::FrameSource;

/// Moving-gradient frame generator.
#[derive(Debug, Clone)]
pub struct TestPattern {
    width: u32,
    height: u32,
    produced: u64,
    /// Stop producing after this many frames.
    limit: Option<u64>,
}

impl TestPattern {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            produced: 0,
            limit: None,
        }
    }

    /// Report "no frame" once `limit` frames have been produced.
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn produced(&self) -> u64 {
        self.produced
    }

    pub fn is_exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.produced >= limit)
    }

    fn render(&self, tick: u64) -> Vec<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        let shift = (tick % 256) as usize;
        let (wd, hd) = ((w - 1).max(1), (h - 1).max(1));
        let mut data = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                let grain = (texture(x as u32, y as u32) & 0x1F) as usize;
                let r = (x * 255 / wd + shift) % 256;
                let g = (y * 255 / hd + shift / 2) % 256;
                let b = (r + g + grain) % 256;
                data.extend_from_slice(&[r as u8, g as u8, b as u8]);
            }
        }
        data
    }
}

impl FrameSource for TestPattern {
    fn next_frame(&mut self) -> Option<RawFrame> {
        if self.is_exhausted() {
            return None;
        }
        let data = self.render(self.produced);
        self.produced += 1;
        Some(RawFrame::new(self.width, self.height, PixelFormat::Rgb8, data))
    }

    fn is_finished(&self) -> bool {
        self.is_exhausted()
    }
}

/// Cheap integer hash of a pixel coordinate.
fn texture(x: u32, y: u32) -> u32 {
    let mut v = x.wrapping_mul(0x9E37_79B1) ^ y.wrapping_mul(0x85EB_CA77);
    v ^= v >> 15;
    v = v.wrapping_mul(0x2C1B_3C6D);
    v ^ (v >> 12)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_have_declared_shape() {
        let mut src = TestPattern::new(64, 48);
        let frame = src.next_frame().unwrap();
        assert_eq!(frame.format, PixelFormat::Rgb8);
        assert!(frame.is_well_formed());
    }

    #[test]
    fn successive_frames_differ() {
        let mut src = TestPattern::new(32, 32);
        let a = src.next_frame().unwrap();
        let b = src.next_frame().unwrap();
        assert_ne!(a.data, b.data);
        assert_eq!(src.produced(), 2);
    }

    #[test]
    fn limit_signals_no_frame() {
        let mut src = TestPattern::new(8, 8).with_frame_limit(2);
        assert!(src.next_frame().is_some());
        assert!(src.next_frame().is_some());
        assert!(src.next_frame().is_none());
        assert!(src.is_finished());
    }

    #[test]
    fn one_pixel_frame_renders() {
        let mut src = TestPattern::new(1, 1);
        let frame = src.next_frame().unwrap();
        assert_eq!(frame.data.len(), 3);
    }
}
