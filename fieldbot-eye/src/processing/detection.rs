//! Object detection pipeline

use fieldbot_core::labels::{PADDY_LABEL, WEED_LABEL};
use fieldbot_core::{BoundingBox, Detection, LabelMap};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::DetectionConfig;
use crate::error::VisionError;
use crate::frame::Frame;

/// Side length of the square box the mock detector reports
const DEMO_BOX_SIZE: u32 = 100;
/// Share of mock detections labelled as crop
const DEMO_PADDY_SHARE: f64 = 0.6;

/// Whether detections come from the mock or from a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectorMode {
    Demo,
    Live,
}

impl DetectorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorMode::Demo => "DEMO",
            DetectorMode::Live => "LIVE",
        }
    }
}

impl fmt::Display for DetectorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finds objects in a frame. Confidence is reported on a 0-100 scale.
pub trait Detector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, VisionError>;

    fn mode(&self) -> DetectorMode;
}

/// Mock detector: with probability `hit_rate` reports one 100x100 box
/// labelled Paddy or Weed.
pub struct DemoDetector {
    hit_rate: f64,
    rng: Mutex<StdRng>,
}

impl DemoDetector {
    pub fn new(hit_rate: f64) -> Self {
        Self {
            hit_rate: hit_rate.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic sequence for tests and replays
    pub fn seeded(hit_rate: f64, seed: u64) -> Self {
        Self {
            hit_rate: hit_rate.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for DemoDetector {
    fn default() -> Self {
        Self::new(DetectionConfig::default().demo_hit_rate)
    }
}

impl Detector for DemoDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, VisionError> {
        let mut rng = self.rng.lock();
        if rng.gen::<f64>() >= self.hit_rate {
            return Ok(Vec::new());
        }

        let x1 = rng.gen_range(0..=frame.width().saturating_sub(DEMO_BOX_SIZE)) as f32;
        let y1 = rng.gen_range(0..=frame.height().saturating_sub(DEMO_BOX_SIZE)) as f32;
        let label = if rng.gen::<f64>() < DEMO_PADDY_SHARE {
            PADDY_LABEL
        } else {
            WEED_LABEL
        };
        let confidence = (0.85 + rng.gen::<f32>() * 0.1) * 100.0;
        let size = DEMO_BOX_SIZE as f32;

        Ok(vec![Detection::new(
            label,
            confidence,
            BoundingBox::new(x1, y1, x1 + size, y1 + size),
        )])
    }

    fn mode(&self) -> DetectorMode {
        DetectorMode::Demo
    }
}

#[cfg(feature = "onnx")]
impl Detector for crate::models::YoloModel {
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, VisionError> {
        crate::models::YoloModel::detect(self, frame)
    }

    fn mode(&self) -> DetectorMode {
        DetectorMode::Live
    }
}

/// Build the configured detector. Live mode falls back to the mock when the
/// model cannot be loaded.
pub fn build_detector(config: &DetectionConfig) -> Arc<dyn Detector> {
    if config.demo {
        info!("Detector running in DEMO mode");
        return Arc::new(DemoDetector::new(config.demo_hit_rate));
    }

    match load_model(config) {
        Ok(detector) => {
            info!("Detector running in LIVE mode with {:?}", config.model_path);
            detector
        }
        Err(e) => {
            warn!("Failed to load YOLO model: {}. Switching to DEMO mode.", e);
            Arc::new(DemoDetector::new(config.demo_hit_rate))
        }
    }
}

#[cfg(feature = "onnx")]
fn load_model(config: &DetectionConfig) -> Result<Arc<dyn Detector>, VisionError> {
    let model = crate::models::YoloModel::load(
        &config.model_path,
        config.input_size,
        config.min_score,
        config.nms_iou,
    )?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "onnx"))]
fn load_model(_config: &DetectionConfig) -> Result<Arc<dyn Detector>, VisionError> {
    Err(VisionError::Model(
        "built without the `onnx` feature".to_string(),
    ))
}

/// Detector plus the class-to-field-label renaming
#[derive(Clone)]
pub struct DetectionPipeline {
    detector: Arc<dyn Detector>,
    labels: LabelMap,
}

impl DetectionPipeline {
    pub fn new(detector: Arc<dyn Detector>, labels: LabelMap) -> Self {
        Self { detector, labels }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(build_detector(config), config.label_map.clone())
    }

    /// Detect objects in a frame and rename them to field labels
    pub fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, VisionError> {
        let detections = self.labels.apply(self.detector.detect(frame)?);
        debug!("Detected {} objects", detections.len());
        Ok(detections)
    }

    pub fn mode(&self) -> DetectorMode {
        self.detector.mode()
    }
}
