use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Axis-aligned box in frame pixel coordinates, serialized as `[x1, y1, x2, y2]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union, 0.0 for degenerate or non-finite boxes
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let coords = [
            self.x1, self.y1, self.x2, self.y2, other.x1, other.y1, other.x2, other.y2,
        ];
        if coords.iter().any(|c| !c.is_finite()) {
            return 0.0;
        }

        let inter_w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let inter_h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = inter_w * inter_h;
        let union = self.area() + other.area() - inter;

        if union <= 0.0 {
            return 0.0;
        }
        (inter / union).clamp(0.0, 1.0)
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(raw: [f32; 4]) -> Self {
        Self::new(raw[0], raw[1], raw[2], raw[3])
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(bbox: BoundingBox) -> Self {
        [bbox.x1, bbox.y1, bbox.x2, bbox.y2]
    }
}

/// One detector hit. Confidence is on a 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "class")]
    pub class_label: String,
    pub confidence: f32,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class_label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class_label: class_label.into(),
            confidence: confidence.clamp(0.0, 100.0),
            bbox,
        }
    }
}

/// Keep the detections whose confidence reaches `threshold_fraction * 100`.
pub fn filter_by_confidence(detections: Vec<Detection>, threshold_fraction: f64) -> Vec<Detection> {
    let cutoff = threshold_fraction * 100.0;
    detections
        .into_iter()
        .filter(|d| f64::from(d.confidence) >= cutoff)
        .collect()
}

/// Detection counters. Only ever incremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_detections: u64,
    pub weeds_found: u64,
    pub other_objects: u64,
}

fn default_threshold_value() -> f64 {
    50.0
}

/// Inbound control message, e.g. `{"command": "SET_THRESHOLD", "value": 65}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Start,
    Stop,
    SetThreshold {
        /// Percentage, 0-100
        #[serde(default = "default_threshold_value")]
        value: f64,
    },
}

impl Command {
    /// Parse and validate one control message
    pub fn parse(text: &str) -> Result<Self> {
        let command: Command = serde_json::from_str(text)
            .map_err(|e| Error::MalformedCommand(e.to_string()))?;
        command.validate()?;
        Ok(command)
    }

    pub fn validate(&self) -> Result<()> {
        if let Command::SetThreshold { value } = self {
            if !value.is_finite() || !(0.0..=100.0).contains(value) {
                return Err(Error::MalformedCommand(format!(
                    "threshold {} outside 0-100",
                    value
                )));
            }
        }
        Ok(())
    }

    /// Short name used for logs and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Start => "START",
            Command::Stop => "STOP",
            Command::SetThreshold { .. } => "SET_THRESHOLD",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetThreshold { value } => write!(f, "{} {}", self.kind(), value),
            _ => f.write_str(self.kind()),
        }
    }
}
