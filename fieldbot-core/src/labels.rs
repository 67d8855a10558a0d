//! Mapping from detector class names to field labels

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::Detection;

/// Label the controller treats as a weed
pub const WEED_LABEL: &str = "Weed";
/// Crop label
pub const PADDY_LABEL: &str = "Paddy";

const DEFAULT_WEED_CLASSES: &[&str] = &["potted plant", "vase", "bottle", "cup"];
const DEFAULT_PADDY_CLASSES: &[&str] = &["person", "chair", "cell phone", "laptop"];

/// Renames raw detector classes. Unmapped classes pass through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelMap(HashMap<String, String>);

impl LabelMap {
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.0.insert(from.into(), to.into());
    }

    pub fn resolve<'a>(&'a self, class_label: &'a str) -> &'a str {
        self.0.get(class_label).map(String::as_str).unwrap_or(class_label)
    }

    pub fn apply(&self, detections: Vec<Detection>) -> Vec<Detection> {
        if self.0.is_empty() {
            return detections;
        }
        detections
            .into_iter()
            .map(|mut d| {
                if let Some(mapped) = self.0.get(&d.class_label) {
                    d.class_label = mapped.clone();
                }
                d
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for LabelMap {
    fn default() -> Self {
        let mut map = Self::empty();
        for class in DEFAULT_WEED_CLASSES {
            map.insert(*class, WEED_LABEL);
        }
        for class in DEFAULT_PADDY_CLASSES {
            map.insert(*class, PADDY_LABEL);
        }
        map
    }
}
