//! JPEG and base64 encoding for the telemetry stream

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;

use crate::error::VisionError;
use crate::frame::Frame;

pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Encode a frame as a baseline JPEG
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, VisionError> {
    let rgb = frame.to_rgb_image()?;
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| VisionError::Encoding(format!("JPEG encode failed: {}", e)))?;
    Ok(buffer)
}

/// JPEG-encode a frame and return it as standard padded base64
pub fn encode_frame_base64(frame: &Frame, quality: u8) -> Result<String, VisionError> {
    Ok(STANDARD.encode(encode_jpeg(frame, quality)?))
}
