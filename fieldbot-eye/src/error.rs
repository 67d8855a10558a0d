//! Error types for fieldbot-eye

use fieldbot_core::Error as CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    /// No capture backend opened the device and produced a frame
    #[error("Camera {source_id} unavailable: {reason}")]
    DeviceUnavailable { source_id: u32, reason: String },

    #[error("Camera error: {0}")]
    Camera(String),

    /// One failed grab or decode; the capture loop retries
    #[error("Transient capture failure: {0}")]
    TransientCapture(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("ONNX Runtime error: {0}")]
    Ort(String),

    #[error("OpenCV error: {0}")]
    OpenCv(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl VisionError {
    /// Failures the capture loop should ride out with a backoff
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            VisionError::TransientCapture(_) | VisionError::OpenCv(_) | VisionError::Camera(_)
        )
    }
}

#[cfg(feature = "opencv")]
impl From<opencv::Error> for VisionError {
    fn from(err: opencv::Error) -> Self {
        VisionError::OpenCv(err.message)
    }
}
