//! Utility functions for vision processing

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::error::VisionError;
use crate::frame::Frame;

/// Geometry of a letterboxed resize, used to map model boxes back to the frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    /// Undo the resize for one coordinate pair
    pub fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Resize a frame into a square `size`x`size` canvas keeping aspect ratio,
/// padding with grey, and return it as a normalized RGB CHW tensor.
pub fn frame_to_chw_tensor(frame: &Frame, size: u32) -> Result<(Vec<f32>, Letterbox), VisionError> {
    if size == 0 {
        return Err(VisionError::Processing("Target dimensions cannot be zero".to_string()));
    }
    let side = size as usize;
    if side.checked_mul(side).and_then(|p| p.checked_mul(3)).is_none() {
        return Err(VisionError::Processing("Target dimensions too large, would overflow".to_string()));
    }

    let rgb = frame.to_rgb_image()?;
    let scale = (size as f32 / frame.width() as f32).min(size as f32 / frame.height() as f32);
    let new_w = ((frame.width() as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((frame.height() as f32 * scale).round() as u32).clamp(1, size);
    let resized = imageops::resize(&rgb, new_w, new_h, FilterType::Triangle);

    let pad_x = (size - new_w) / 2;
    let pad_y = (size - new_h) / 2;
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([114, 114, 114]));
    imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    let plane = side * side;
    let mut chw = vec![0.0f32; plane * 3];
    for (x, y, pixel) in canvas.enumerate_pixels() {
        let idx = y as usize * side + x as usize;
        for c in 0..3 {
            chw[c * plane + idx] = pixel.0[c] as f32 / 255.0;
        }
    }

    Ok((
        chw,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        },
    ))
}
