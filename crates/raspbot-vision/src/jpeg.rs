//! RGB frame → JPEG bytes.

use bytes::Bytes;
use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use raspbot_hal::CameraFrame;
use raspbot_types::BotError;

/// Default JPEG quality for stills and stream frames.
pub const DEFAULT_QUALITY: u8 = 80;

/// Take ownership of a frame's pixels as an [`RgbImage`].
///
/// # Errors
///
/// [`BotError::Encode`] when the buffer does not match the dimensions.
pub fn frame_to_image(frame: CameraFrame) -> Result<RgbImage, BotError> {
    let (w, h) = (frame.width, frame.height);
    RgbImage::from_raw(w, h, frame.data)
        .ok_or_else(|| BotError::Encode(format!("frame buffer does not match {w}x{h}")))
}

pub fn encode_image(img: &RgbImage, quality: u8) -> Result<Bytes, BotError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(img)
        .map_err(|e| BotError::Encode(e.to_string()))?;
    Ok(Bytes::from(buf))
}

/// [`frame_to_image`] followed by [`encode_image`].
pub fn encode_frame(frame: CameraFrame, quality: u8) -> Result<Bytes, BotError> {
    encode_image(&frame_to_image(frame)?, quality)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_jpeg_magic() {
        let frame = CameraFrame::solid(8, 8, [200, 10, 10]);
        let jpeg = encode_frame(frame, DEFAULT_QUALITY).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn mismatched_buffer_is_encode_error() {
        let frame = CameraFrame {
            width: 4,
            height: 4,
            data: vec![0; 10],
        };
        assert!(matches!(encode_frame(frame, 80), Err(BotError::Encode(_))));
    }
}
