//! Synthetic camera producing a moving test pattern

use chrono::Utc;

use super::{CaptureBackend, CaptureDevice};
use crate::error::VisionError;
use crate::frame::Frame;

/// Always opens; every grab advances a vertical bar across a gradient
#[derive(Debug, Default, Clone)]
pub struct TestPatternBackend;

impl CaptureBackend for TestPatternBackend {
    fn name(&self) -> &str {
        "test-pattern"
    }

    fn open(&self, _source: u32, width: u32, height: u32) -> Result<Box<dyn CaptureDevice>, VisionError> {
        if width == 0 || height == 0 {
            return Err(VisionError::Camera("Test pattern needs a non-zero resolution".to_string()));
        }
        Ok(Box::new(TestPatternDevice {
            width,
            height,
            tick: 0,
            released: false,
        }))
    }
}

struct TestPatternDevice {
    width: u32,
    height: u32,
    tick: u64,
    released: bool,
}

impl CaptureDevice for TestPatternDevice {
    fn grab(&mut self) -> Result<(), VisionError> {
        if self.released {
            return Err(VisionError::TransientCapture("Test pattern released".to_string()));
        }
        self.tick = self.tick.wrapping_add(1);
        Ok(())
    }

    fn retrieve(&mut self) -> Result<Option<Frame>, VisionError> {
        if self.released {
            return Ok(None);
        }
        let (w, h) = (self.width as usize, self.height as usize);
        let bar = (self.tick as usize * 4) % w;
        let mut data = Vec::with_capacity(w * h * Frame::CHANNELS);
        for y in 0..h {
            for x in 0..w {
                if x.abs_diff(bar) < 4 {
                    data.extend_from_slice(&[255, 255, 255]);
                } else {
                    let b = (x * 255 / w.max(1)) as u8;
                    let g = (y * 255 / h.max(1)) as u8;
                    data.extend_from_slice(&[b, g, 64]);
                }
            }
        }
        Frame::from_bgr_at(self.width, self.height, data, Utc::now()).map(Some)
    }

    fn release(&mut self) {
        self.released = true;
    }
}
