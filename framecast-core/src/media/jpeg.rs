//! JPEG encoder and decoder backed by the `image` crate.
//!
//! Quality maps directly onto the JPEG quality factor (1..=100).
//! Decoding checks the declared dimensions against a ceiling before any
//! pixel buffer is allocated, since the header comes off the network.

use std::io::Cursor;

use image::codecs::jpeg::{JpegDecoder, JpegEncoder};
use image::{ColorType, GrayImage, ImageBuffer, ImageDecoder, Limits, RgbImage};

use crate::error::CodecError;
use crate::media::types::{PixelFormat, RawFrame};
use crate::media::{FrameDecoder, FrameEncoder};

/// Largest width or height accepted by [`JpegCodec::decode`] by default (8K UHD).
pub const DEFAULT_MAX_DECODE_WIDTH: u32 = 7680;
pub const DEFAULT_MAX_DECODE_HEIGHT: u32 = 4320;

/// Stateless apart from counters; one instance can serve both ends.
#[derive(Debug)]
pub struct JpegCodec {
    max_width: u32,
    max_height: u32,
    frames_encoded: u64,
    frames_decoded: u64,
}

impl Default for JpegCodec {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_DECODE_WIDTH,
            max_height: DEFAULT_MAX_DECODE_HEIGHT,
            frames_encoded: 0,
            frames_decoded: 0,
        }
    }
}

impl JpegCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject decoded images wider or taller than the given ceiling.
    pub fn with_max_dimensions(mut self, width: u32, height: u32) -> Self {
        self.max_width = width.max(1);
        self.max_height = height.max(1);
        self
    }

    pub fn max_dimensions(&self) -> (u32, u32) {
        (self.max_width, self.max_height)
    }

    /// Byte ceiling for one decoded image at the configured dimensions.
    fn max_decoded_bytes(&self) -> u64 {
        u64::from(self.max_width) * u64::from(self.max_height) * PixelFormat::Rgb8.bytes_per_pixel() as u64
    }

    pub fn frames_encoded(&self) -> u64 {
        self.frames_encoded
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }
}

impl FrameEncoder for JpegCodec {
    fn encode(&mut self, frame: &RawFrame, quality: u8) -> Result<Vec<u8>, CodecError> {
        if !frame.is_well_formed() {
            return Err(CodecError::Encode(format!(
                "{}x{} {:?} frame has {} bytes, expected {}",
                frame.width,
                frame.height,
                frame.format,
                frame.data.len(),
                frame.expected_len(),
            )));
        }

        let mut buf = Cursor::new(Vec::new());
        let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
        match frame.format {
            PixelFormat::Rgb8 => {
                let img: RgbImage = ImageBuffer::from_raw(frame.width, frame.height, frame.data.clone())
                    .ok_or_else(|| CodecError::Encode("invalid image dimensions".into()))?;
                img.write_with_encoder(encoder)?;
            }
            PixelFormat::Luma8 => {
                let img: GrayImage = ImageBuffer::from_raw(frame.width, frame.height, frame.data.clone())
                    .ok_or_else(|| CodecError::Encode("invalid image dimensions".into()))?;
                img.write_with_encoder(encoder)?;
            }
        }

        self.frames_encoded += 1;
        Ok(buf.into_inner())
    }
}

impl FrameDecoder for JpegCodec {
    fn decode(&mut self, data: &[u8]) -> Result<RawFrame, CodecError> {
        let mut decoder = JpegDecoder::new(Cursor::new(data))
            .map_err(|e| CodecError::Decode(e.to_string()))?;

        let (width, height) = decoder.dimensions();
        if width > self.max_width || height > self.max_height {
            return Err(CodecError::Decode(format!(
                "{width}x{height} exceeds decode limit {}x{}",
                self.max_width, self.max_height
            )));
        }

        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_width);
        limits.max_image_height = Some(self.max_height);
        limits.max_alloc = Some(self.max_decoded_bytes());
        decoder
            .set_limits(limits)
            .map_err(|e| CodecError::Decode(e.to_string()))?;

        let format = match decoder.color_type() {
            ColorType::Rgb8 => PixelFormat::Rgb8,
            ColorType::L8 => PixelFormat::Luma8,
            other => {
                return Err(CodecError::Decode(format!("unsupported color type {other:?}")));
            }
        };

        let total = decoder.total_bytes();
        if total > self.max_decoded_bytes() {
            return Err(CodecError::Decode(format!("{total} decoded bytes exceeds limit")));
        }
        let total = usize::try_from(total).map_err(|_| CodecError::Decode("image too large".into()))?;
        let mut pixels = vec![0u8; total];
        decoder
            .read_image(&mut pixels)
            .map_err(|e| CodecError::Decode(e.to_string()))?;

        self.frames_decoded += 1;
        Ok(RawFrame::new(width, height, format, pixels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::pattern::TestPattern;
    use crate::media::FrameSource;

    #[test]
    fn encode_decode_preserves_shape() {
        let mut codec = JpegCodec::new();
        let frame = TestPattern::new(64, 48).next_frame().unwrap();

        let jpeg = codec.encode(&frame, 75).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "JPEG SOI marker");

        let decoded = codec.decode(&jpeg).unwrap();
        assert_eq!((decoded.width, decoded.height), (64, 48));
        assert_eq!(decoded.format, PixelFormat::Rgb8);
        assert!(decoded.is_well_formed());
        assert_eq!(codec.frames_encoded(), 1);
        assert_eq!(codec.frames_decoded(), 1);
    }

    #[test]
    fn lower_quality_is_smaller() {
        let mut codec = JpegCodec::new();
        let frame = TestPattern::new(160, 120).next_frame().unwrap();
        let low = codec.encode(&frame, 20).unwrap();
        let high = codec.encode(&frame, 95).unwrap();
        assert!(low.len() < high.len(), "{} >= {}", low.len(), high.len());
    }

    #[test]
    fn greyscale_round_trips() {
        let mut codec = JpegCodec::new();
        let frame = RawFrame::new(16, 16, PixelFormat::Luma8, vec![128; 256]);
        let jpeg = codec.encode(&frame, 80).unwrap();
        let decoded = codec.decode(&jpeg).unwrap();
        assert_eq!(decoded.format, PixelFormat::Luma8);
        assert_eq!(decoded.data.len(), 256);
    }

    #[test]
    fn malformed_frame_rejected() {
        let mut codec = JpegCodec::new();
        let frame = RawFrame::new(10, 10, PixelFormat::Rgb8, vec![0; 10]);
        assert!(matches!(codec.encode(&frame, 70), Err(CodecError::Encode(_))));
    }

    #[test]
    fn garbage_fails_to_decode() {
        let mut codec = JpegCodec::new();
        assert!(matches!(
            codec.decode(b"definitely not a jpeg"),
            Err(CodecError::Decode(_))
        ));
        assert_eq!(codec.frames_decoded(), 0);
    }

    /// Rewrite the SOF0 height and width fields of a baseline JPEG.
    fn patch_dimensions(jpeg: &mut [u8], width: u16, height: u16) {
        let sof = jpeg
            .windows(2)
            .position(|w| w == [0xFF, 0xC0])
            .expect("baseline JPEG has an SOF0 marker");
        jpeg[sof + 5..sof + 7].copy_from_slice(&height.to_be_bytes());
        jpeg[sof + 7..sof + 9].copy_from_slice(&width.to_be_bytes());
    }

    #[test]
    fn huge_declared_dimensions_are_rejected_before_allocation() {
        let mut codec = JpegCodec::new();
        let frame = RawFrame::new(8, 8, PixelFormat::Luma8, vec![200; 64]);
        let mut jpeg = codec.encode(&frame, 80).unwrap();
        patch_dimensions(&mut jpeg, u16::MAX, u16::MAX);

        let started = std::time::Instant::now();
        assert!(matches!(codec.decode(&jpeg), Err(CodecError::Decode(_))));
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        assert_eq!(codec.frames_decoded(), 0);
    }

    #[test]
    fn configured_ceiling_applies() {
        let mut codec = JpegCodec::new().with_max_dimensions(32, 32);
        assert_eq!(codec.max_dimensions(), (32, 32));

        let small = TestPattern::new(32, 24).next_frame().unwrap();
        let jpeg = codec.encode(&small, 70).unwrap();
        assert!(codec.decode(&jpeg).is_ok());

        let wide = TestPattern::new(64, 24).next_frame().unwrap();
        let jpeg = codec.encode(&wide, 70).unwrap();
        assert!(matches!(codec.decode(&jpeg), Err(CodecError::Decode(_))));
        assert_eq!(codec.frames_decoded(), 1);
    }
}
