//! Edge case tests for fieldbot-eye

use fieldbot_core::{BoundingBox, Detection};
use fieldbot_eye::config::{CameraConfig, DetectionConfig};
use fieldbot_eye::models::apply_nms;
use fieldbot_eye::processing::{encode_jpeg, Annotator};
use fieldbot_eye::utils::frame_to_chw_tensor;
use fieldbot_eye::Frame;

fn detection(label: &str, confidence: f32, bbox: (f32, f32, f32, f32)) -> Detection {
    Detection::new(label, confidence, BoundingBox::new(bbox.0, bbox.1, bbox.2, bbox.3))
}

#[test]
fn test_config_edge_cases() {
    // Minimum valid values
    let mut config = CameraConfig::default();
    config.width = 1;
    config.height = 1;
    config.source = 0;
    assert!(config.validate().is_ok());

    // Maximum valid values
    config.width = 7680;
    config.height = 4320;
    config.source = 100;
    assert!(config.validate().is_ok());
}

#[test]
fn test_detection_config_bounds() {
    let mut config = DetectionConfig::default();
    config.demo_hit_rate = 0.0;
    assert!(config.validate().is_ok());
    config.demo_hit_rate = 1.0;
    assert!(config.validate().is_ok());
    config.nms_iou = -0.1;
    assert!(config.validate().is_err());
}

#[test]
fn test_nms_empty() {
    assert!(apply_nms(Vec::new(), 0.5).is_empty());
}

#[test]
fn test_nms_keeps_disjoint_boxes() {
    let kept = apply_nms(
        vec![
            detection("person", 90.0, (0.0, 0.0, 10.0, 10.0)),
            detection("person", 80.0, (50.0, 50.0, 60.0, 60.0)),
        ],
        0.5,
    );
    assert_eq!(kept.len(), 2);
}

#[test]
fn test_nms_single_pixel_bbox() {
    let kept = apply_nms(vec![detection("cup", 90.0, (10.0, 10.0, 11.0, 11.0))], 0.5);
    assert_eq!(kept.len(), 1);
}

#[test]
fn test_nms_nan_box_does_not_suppress() {
    let kept = apply_nms(
        vec![
            detection("cup", 90.0, (f32::NAN, 0.0, 10.0, 10.0)),
            detection("cup", 80.0, (0.0, 0.0, 10.0, 10.0)),
        ],
        0.5,
    );
    assert_eq!(kept.len(), 2);
}

#[test]
fn test_one_pixel_frame_through_the_pipeline() {
    let mut frame = Frame::filled(1, 1, [1, 2, 3]).unwrap();
    Annotator::new("Weed").annotate(
        &mut frame,
        &[detection("Weed", 99.0, (0.0, 0.0, 10000.0, 10000.0))],
    );
    assert!(encode_jpeg(&frame, 90).is_ok());
    let (tensor, _) = frame_to_chw_tensor(&frame, 32).unwrap();
    assert_eq!(tensor.len(), 3 * 32 * 32);
}

#[test]
fn test_inverted_box_is_ignored_by_annotator() {
    let mut frame = Frame::filled(20, 20, [0, 0, 0]).unwrap();
    let before = frame.clone();
    Annotator::new("Weed").annotate(&mut frame, &[detection("Weed", 50.0, (15.0, 15.0, 5.0, 5.0))]);
    // only the caption may be drawn, no rectangle edges at the box corners
    assert_eq!(frame.pixel(15, 15), before.pixel(15, 15));
}

#[test]
fn test_confidence_is_clamped() {
    assert_eq!(detection("cup", 150.0, (0.0, 0.0, 1.0, 1.0)).confidence, 100.0);
    assert_eq!(detection("cup", -3.0, (0.0, 0.0, 1.0, 1.0)).confidence, 0.0);
}
