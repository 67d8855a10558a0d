//! Configuration for fieldbot-eye

use fieldbot_core::LabelMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Which capture backends the frame source may try
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Platform camera backends in fixed order (needs the `opencv` feature)
    Auto,
    /// Built-in moving test pattern, no hardware required
    TestPattern,
}

/// Camera and capture loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Camera device index (0, 1, 2, etc.)
    pub source: u32,
    /// Requested frame width
    pub width: u32,
    /// Requested frame height
    pub height: u32,
    pub backend: BackendKind,
    /// Sleep after a failed grab, milliseconds
    pub retry_backoff_ms: u64,
    /// Sleep after each captured frame, milliseconds
    pub pace_ms: u64,
    /// Upper bound on joining the capture thread, milliseconds
    pub stop_timeout_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: 0,
            width: 640,
            height: 480,
            backend: BackendKind::Auto,
            retry_backoff_ms: 1000,
            pace_ms: 10,
            stop_timeout_ms: 1000,
        }
    }
}

impl CameraConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err("Resolution must be non-zero".to_string());
        }

        if self.width > 7680 || self.height > 4320 {
            return Err("Resolution too large (max 8K)".to_string());
        }

        if self.source > 100 {
            return Err("Camera source index too large (max 100)".to_string());
        }

        if self.retry_backoff_ms == 0 {
            return Err("retry_backoff_ms must be positive".to_string());
        }

        if self.pace_ms == 0 {
            return Err("pace_ms must be positive".to_string());
        }

        if self.stop_timeout_ms == 0 {
            return Err("stop_timeout_ms must be positive".to_string());
        }

        Ok(())
    }
}

/// Detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Use the mock detector instead of the model
    pub demo: bool,
    /// ONNX model used in live mode
    pub model_path: PathBuf,
    /// Square model input size in pixels
    pub input_size: u32,
    /// Minimum raw score kept by the model postprocessing, 0-1
    pub min_score: f32,
    /// IoU above which overlapping boxes are suppressed
    pub nms_iou: f32,
    /// Per-frame probability of a mock detection
    pub demo_hit_rate: f64,
    /// Raw class name to field label
    pub label_map: LabelMap,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            demo: true,
            model_path: PathBuf::from("yolov8n.onnx"),
            input_size: 640,
            min_score: 0.25,
            nms_iou: 0.45,
            demo_hit_rate: 0.15,
            label_map: LabelMap::default(),
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.demo_hit_rate) {
            return Err("demo_hit_rate must be between 0 and 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_score) || !(0.0..=1.0).contains(&self.nms_iou) {
            return Err("min_score and nms_iou must be between 0 and 1".to_string());
        }
        if self.input_size == 0 || self.input_size % 32 != 0 {
            return Err("input_size must be a positive multiple of 32".to_string());
        }
        Ok(())
    }
}
