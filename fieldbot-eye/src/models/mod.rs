//! Vision model inference

pub mod yolo;

#[cfg(feature = "onnx")]
pub use yolo::YoloModel;
pub use yolo::{apply_nms, decode_output, DecodeParams, COCO_CLASSES};
