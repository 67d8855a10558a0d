//! fieldbot-eye: camera capture and vision for fieldbot
//!
//! Owns the camera on a background thread, runs the detector over frames
//! and renders the annotated JPEG the operator console displays.

pub mod backends;
pub mod camera;
pub mod config;
pub mod error;
pub mod frame;
pub mod models;
pub mod processing;
pub mod utils;

pub use backends::{CaptureBackend, CaptureDevice, TestPatternBackend};
pub use camera::{FrameSource, CAPTURE_FAILURES};
pub use config::{BackendKind, CameraConfig, DetectionConfig};
pub use error::VisionError;
pub use frame::Frame;
pub use processing::{
    build_detector, encode_frame_base64, Annotator, DemoDetector, DetectionPipeline, Detector,
    DetectorMode,
};
