use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;

use crate::error::{Result, VidioError};
use super::{FrameEncoder, RawFrame, StillImage};

/// Lossy JPEG encoder for RGB24 frames
pub struct JpegEncoder;

impl FrameEncoder for JpegEncoder {
    fn encode(&self, frame: &RawFrame, quality: u8) -> Result<StillImage> {
        if frame.data.len() != RawFrame::expected_len(frame.width, frame.height) {
            return Err(VidioError::Media(format!(
                "Frame buffer holds {} bytes, expected {} for {}x{}",
                frame.data.len(),
                RawFrame::expected_len(frame.width, frame.height),
                frame.width,
                frame.height
            )));
        }

        let mut data = Vec::new();
        let mut encoder = ImageJpegEncoder::new_with_quality(&mut data, quality.clamp(1, 100));
        encoder.encode(&frame.data, frame.width, frame.height, ExtendedColorType::Rgb8)?;

        Ok(StillImage {
            mime_type: "image/jpeg".to_string(),
            width: frame.width,
            height: frame.height,
            data,
        })
    }
}
