//! USB webcam capture through OpenCV videoio

use opencv::{
    core::{Mat, CV_8UC3},
    prelude::*,
    videoio::{
        self, VideoCapture, CAP_PROP_BUFFERSIZE, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH,
    },
};
use tracing::{debug, warn};

use super::{CaptureBackend, CaptureDevice};
use crate::error::VisionError;
use crate::frame::Frame;

/// One OpenCV API preference (DirectShow, V4L2, ...)
#[derive(Debug, Clone)]
pub struct OpenCvBackend {
    api: i32,
    name: &'static str,
}

impl OpenCvBackend {
    pub fn new(api: i32, name: &'static str) -> Self {
        Self { api, name }
    }

    /// Backends in the order they are tried on this platform. `CAP_ANY` is last.
    pub fn platform_defaults() -> Vec<Self> {
        let mut backends = Vec::new();
        #[cfg(target_os = "windows")]
        {
            backends.push(Self::new(videoio::CAP_DSHOW, "dshow"));
            backends.push(Self::new(videoio::CAP_MSMF, "msmf"));
        }
        #[cfg(target_os = "linux")]
        backends.push(Self::new(videoio::CAP_V4L2, "v4l2"));
        #[cfg(target_os = "macos")]
        backends.push(Self::new(videoio::CAP_AVFOUNDATION, "avfoundation"));
        backends.push(Self::new(videoio::CAP_ANY, "any"));
        backends
    }
}

impl CaptureBackend for OpenCvBackend {
    fn name(&self) -> &str {
        self.name
    }

    fn open(&self, source: u32, width: u32, height: u32) -> Result<Box<dyn CaptureDevice>, VisionError> {
        let mut capture = VideoCapture::new(source as i32, self.api)
            .map_err(|e| VisionError::Camera(format!("Failed to open camera {}: {}", source, e)))?;

        if !capture.is_opened()? {
            return Err(VisionError::Camera(format!(
                "Camera {} failed to open with {}",
                source, self.name
            )));
        }

        // a deeper driver queue would hand out stale frames
        if !capture.set(CAP_PROP_BUFFERSIZE, 1.0)? {
            debug!("Backend {} ignored buffer size request", self.name);
        }
        capture.set(CAP_PROP_FRAME_WIDTH, width as f64)?;
        capture.set(CAP_PROP_FRAME_HEIGHT, height as f64)?;

        Ok(Box::new(OpenCvDevice {
            capture,
            mat: Mat::default(),
            released: false,
        }))
    }
}

struct OpenCvDevice {
    capture: VideoCapture,
    mat: Mat,
    released: bool,
}

impl CaptureDevice for OpenCvDevice {
    fn grab(&mut self) -> Result<(), VisionError> {
        if self.capture.grab()? {
            Ok(())
        } else {
            Err(VisionError::TransientCapture(
                "grab() returned no frame, possible disconnect".to_string(),
            ))
        }
    }

    fn retrieve(&mut self) -> Result<Option<Frame>, VisionError> {
        if !self.capture.retrieve(&mut self.mat, 0)? || self.mat.rows() <= 0 {
            return Ok(None);
        }
        mat_to_frame(&self.mat).map(Some)
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.capture.release() {
            warn!("Failed to release camera: {}", e);
        }
    }
}

impl Drop for OpenCvDevice {
    fn drop(&mut self) {
        self.release();
    }
}

fn mat_to_frame(mat: &Mat) -> Result<Frame, VisionError> {
    if mat.typ() != CV_8UC3 {
        return Err(VisionError::Processing(format!(
            "Unsupported Mat type {}, expected 8-bit BGR",
            mat.typ()
        )));
    }

    let data = if mat.is_continuous() {
        mat.data_bytes()?.to_vec()
    } else {
        mat.try_clone()?.data_bytes()?.to_vec()
    };

    Frame::from_bgr(mat.cols() as u32, mat.rows() as u32, data)
}
