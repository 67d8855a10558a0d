//! YOLOv8 object detection model

use fieldbot_core::{BoundingBox, Detection};
use std::cmp::Ordering;
use tracing::debug;

use crate::utils::Letterbox;

/// COCO class names (80 classes)
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat",
    "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack",
    "umbrella", "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball",
    "kite", "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket",
    "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
    "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair",
    "couch", "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator",
    "book", "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Score and overlap cut-offs for decoding raw model output
#[derive(Debug, Clone, Copy)]
pub struct DecodeParams {
    pub min_score: f32,
    pub nms_iou: f32,
    pub frame_width: f32,
    pub frame_height: f32,
}

/// Decode a YOLOv8 `[1, 4 + classes, anchors]` output into detections in
/// frame pixel coordinates, confidence as a percentage.
pub fn decode_output(
    output: &[f32],
    shape: &[usize],
    letterbox: Letterbox,
    params: DecodeParams,
) -> Vec<Detection> {
    let (rows, anchors) = match shape {
        [1, rows, anchors] => (*rows, *anchors),
        [rows, anchors] => (*rows, *anchors),
        _ => {
            debug!("Unexpected YOLO output shape {:?}", shape);
            return Vec::new();
        }
    };
    if rows <= 4 || output.len() < rows * anchors {
        return Vec::new();
    }
    let classes = (rows - 4).min(COCO_CLASSES.len());
    let at = |row: usize, anchor: usize| output[row * anchors + anchor];

    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let mut best_class = 0;
        let mut best_score = f32::MIN;
        for class in 0..classes {
            let score = at(4 + class, anchor);
            if score > best_score {
                best_score = score;
                best_class = class;
            }
        }
        if !best_score.is_finite() || best_score < params.min_score {
            continue;
        }

        let (cx, cy, w, h) = (at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor));
        if !(cx.is_finite() && cy.is_finite() && w.is_finite() && h.is_finite()) || w <= 0.0 || h <= 0.0 {
            continue;
        }

        let (x1, y1) = letterbox.to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_frame(cx + w / 2.0, cy + h / 2.0);
        let bbox = BoundingBox::new(
            x1.clamp(0.0, params.frame_width),
            y1.clamp(0.0, params.frame_height),
            x2.clamp(0.0, params.frame_width),
            y2.clamp(0.0, params.frame_height),
        );
        if bbox.area() <= 0.0 {
            continue;
        }

        candidates.push(Detection::new(COCO_CLASSES[best_class], best_score * 100.0, bbox));
    }

    apply_nms(candidates, params.nms_iou)
}

/// Class-aware non-maximum suppression, highest confidence first
pub fn apply_nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal));

    let mut keep: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let overlaps = keep.iter().any(|kept| {
            kept.class_label == candidate.class_label && kept.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !overlaps {
            keep.push(candidate);
        }
    }
    keep
}

#[cfg(feature = "onnx")]
pub use session::YoloModel;

#[cfg(feature = "onnx")]
mod session {
    use ort::session::{builder::GraphOptimizationLevel, Session};
    use ort::value::Tensor;
    use parking_lot::Mutex;
    use std::path::Path;
    use tracing::{debug, info};

    use super::{decode_output, DecodeParams};
    use crate::error::VisionError;
    use crate::frame::Frame;
    use crate::utils::frame_to_chw_tensor;
    use fieldbot_core::Detection;

    /// YOLOv8 detector backed by an ONNX Runtime session
    pub struct YoloModel {
        session: Mutex<Session>,
        input_size: u32,
        min_score: f32,
        nms_iou: f32,
    }

    impl YoloModel {
        pub fn load(model_path: &Path, input_size: u32, min_score: f32, nms_iou: f32) -> Result<Self, VisionError> {
            if !model_path.exists() {
                return Err(VisionError::Model(format!("Model file {:?} not found", model_path)));
            }

            let session = Session::builder()
                .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
                .and_then(|b| b.commit_from_file(model_path))
                .map_err(|e| VisionError::Ort(format!("Failed to load YOLO model: {}", e)))?;

            info!("YOLO model loaded from {:?}", model_path);

            Ok(Self {
                session: Mutex::new(session),
                input_size,
                min_score,
                nms_iou,
            })
        }

        pub fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, VisionError> {
            let (input, letterbox) = frame_to_chw_tensor(frame, self.input_size)?;
            let side = self.input_size as usize;
            let tensor = Tensor::from_array(([1usize, 3, side, side], input.into_boxed_slice()))
                .map_err(|e| VisionError::Ort(format!("Failed to create input tensor: {}", e)))?;

            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![tensor])
                .map_err(|e| VisionError::Ort(format!("YOLO inference failed: {}", e)))?;

            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| VisionError::Ort(format!("Failed to extract output tensor: {}", e)))?;
            let shape: Vec<usize> = shape.iter().map(|d| (*d).max(0) as usize).collect();
            debug!("YOLO output shape: {:?}", shape);

            let params = DecodeParams {
                min_score: self.min_score,
                nms_iou: self.nms_iou,
                frame_width: frame.width() as f32,
                frame_height: frame.height() as f32,
            };
            Ok(decode_output(data, &shape, letterbox, params))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY: Letterbox = Letterbox {
        scale: 1.0,
        pad_x: 0.0,
        pad_y: 0.0,
    };

    fn params() -> DecodeParams {
        DecodeParams {
            min_score: 0.25,
            nms_iou: 0.45,
            frame_width: 640.0,
            frame_height: 480.0,
        }
    }

    /// Output tensor with `anchors` columns, each (cx, cy, w, h, class, score)
    fn output(anchors: &[(f32, f32, f32, f32, usize, f32)]) -> (Vec<f32>, Vec<usize>) {
        let rows = 4 + COCO_CLASSES.len();
        let n = anchors.len();
        let mut data = vec![0.0; rows * n];
        for (i, &(cx, cy, w, h, class, score)) in anchors.iter().enumerate() {
            data[i] = cx;
            data[n + i] = cy;
            data[2 * n + i] = w;
            data[3 * n + i] = h;
            data[(4 + class) * n + i] = score;
        }
        (data, vec![1, rows, n])
    }

    #[test]
    fn test_decode_single_box() {
        let (data, shape) = output(&[(100.0, 100.0, 40.0, 20.0, 58, 0.9)]);
        let detections = decode_output(&data, &shape, IDENTITY, params());
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_label, "potted plant");
        assert!((detections[0].confidence - 90.0).abs() < 1e-3);
        assert_eq!(detections[0].bbox, BoundingBox::new(80.0, 90.0, 120.0, 110.0));
    }

    #[test]
    fn test_decode_drops_low_scores() {
        let (data, shape) = output(&[(100.0, 100.0, 40.0, 20.0, 0, 0.1)]);
        assert!(decode_output(&data, &shape, IDENTITY, params()).is_empty());
    }

    #[test]
    fn test_decode_suppresses_overlaps_of_same_class() {
        let (data, shape) = output(&[
            (100.0, 100.0, 40.0, 40.0, 0, 0.8),
            (102.0, 100.0, 40.0, 40.0, 0, 0.9),
            (102.0, 100.0, 40.0, 40.0, 41, 0.7),
        ]);
        let detections = decode_output(&data, &shape, IDENTITY, params());
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].class_label, "person");
        assert!((detections[0].confidence - 90.0).abs() < 1e-3);
        assert_eq!(detections[1].class_label, "cup");
    }

    #[test]
    fn test_decode_maps_through_letterbox() {
        let letterbox = Letterbox {
            scale: 0.5,
            pad_x: 0.0,
            pad_y: 80.0,
        };
        let (data, shape) = output(&[(50.0, 130.0, 20.0, 20.0, 0, 0.5)]);
        let detections = decode_output(&data, &shape, letterbox, params());
        assert_eq!(detections[0].bbox, BoundingBox::new(80.0, 80.0, 120.0, 120.0));
    }

    #[test]
    fn test_bad_shape_is_empty() {
        assert!(decode_output(&[0.0; 8], &[2, 4], IDENTITY, params()).is_empty());
        assert!(decode_output(&[], &[1, 84, 10], IDENTITY, params()).is_empty());
    }
}
