//! Captured video frames

use chrono::{DateTime, Utc};
use image::RgbImage;

use crate::error::VisionError;

/// Packed 8-bit BGR frame, the layout camera backends hand out
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
    captured_at: DateTime<Utc>,
}

impl Frame {
    pub const CHANNELS: usize = 3;

    /// Wrap a BGR buffer captured now
    pub fn from_bgr(width: u32, height: u32, data: Vec<u8>) -> Result<Self, VisionError> {
        Self::from_bgr_at(width, height, data, Utc::now())
    }

    pub fn from_bgr_at(
        width: u32,
        height: u32,
        data: Vec<u8>,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, VisionError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|p| p.checked_mul(Self::CHANNELS))
            .ok_or_else(|| VisionError::Processing("Frame dimensions overflow".to_string()))?;

        if width == 0 || height == 0 {
            return Err(VisionError::Processing("Frame dimensions cannot be zero".to_string()));
        }
        if data.len() != expected {
            return Err(VisionError::Processing(format!(
                "Frame buffer is {} bytes, expected {} for {}x{} BGR",
                data.len(),
                expected,
                width,
                height
            )));
        }

        Ok(Self {
            width,
            height,
            data,
            captured_at,
        })
    }

    /// Solid-colour frame, handy for tests and placeholders
    pub fn filled(width: u32, height: u32, bgr: [u8; 3]) -> Result<Self, VisionError> {
        let pixels = (width as usize) * (height as usize);
        let data = bgr.iter().copied().cycle().take(pixels * Self::CHANNELS).collect();
        Self::from_bgr(width, height, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// (height, width, channels), the shape an array library would report
    pub fn shape(&self) -> (u32, u32, usize) {
        (self.height, self.width, Self::CHANNELS)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// BGR pixel at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Convert to an RGB image buffer
    pub fn to_rgb_image(&self) -> Result<RgbImage, VisionError> {
        let mut rgb = self.data.clone();
        for px in rgb.chunks_exact_mut(Self::CHANNELS) {
            px.swap(0, 2);
        }
        RgbImage::from_raw(self.width, self.height, rgb)
            .ok_or_else(|| VisionError::Processing("Failed to build RGB image from frame".to_string()))
    }

    /// Build a frame from an RGB image buffer
    pub fn from_rgb_image(image: &RgbImage, captured_at: DateTime<Utc>) -> Result<Self, VisionError> {
        let mut bgr = image.as_raw().clone();
        for px in bgr.chunks_exact_mut(Self::CHANNELS) {
            px.swap(0, 2);
        }
        Self::from_bgr_at(image.width(), image.height(), bgr, captured_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_wrong_buffer_size() {
        assert!(Frame::from_bgr(2, 2, vec![0; 11]).is_err());
        assert!(Frame::from_bgr(0, 2, vec![]).is_err());
        assert!(Frame::from_bgr(2, 2, vec![0; 12]).is_ok());
    }

    #[test]
    fn test_clone_is_independent() {
        let original = Frame::filled(4, 4, [1, 2, 3]).unwrap();
        let mut copy = original.clone();
        copy.data_mut()[0] = 255;
        assert_eq!(original.pixel(0, 0), Some([1, 2, 3]));
        assert_eq!(copy.pixel(0, 0), Some([255, 2, 3]));
    }

    #[test]
    fn test_rgb_conversion_swaps_channels() {
        let frame = Frame::filled(2, 1, [10, 20, 30]).unwrap();
        let rgb = frame.to_rgb_image().unwrap();
        assert_eq!(rgb.get_pixel(1, 0).0, [30, 20, 10]);

        let back = Frame::from_rgb_image(&rgb, frame.captured_at()).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn test_shape() {
        let frame = Frame::filled(640, 480, [0, 0, 0]).unwrap();
        assert_eq!(frame.shape(), (480, 640, 3));
        assert_eq!(frame.pixel(640, 0), None);
    }
}
