//! Per-frame processing: detection, overlays, encoding

pub mod annotation;
pub mod detection;
pub mod encoding;

pub use annotation::Annotator;
pub use detection::{build_detector, DemoDetector, DetectionPipeline, Detector, DetectorMode};
pub use encoding::{encode_frame_base64, encode_jpeg, DEFAULT_JPEG_QUALITY};
