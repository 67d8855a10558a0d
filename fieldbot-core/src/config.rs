// Controller configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::labels::WEED_LABEL;

/// Operational controller settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Minimum dwell in ACTION_TRIGGERED, milliseconds
    pub action_hold_ms: u64,
    /// Detection class that triggers an action
    pub target_label: String,
    /// Initial confidence threshold as a fraction in [0, 1]
    pub confidence_threshold: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            action_hold_ms: 3000,
            target_label: WEED_LABEL.to_string(),
            confidence_threshold: 0.5,
        }
    }
}

impl ControllerConfig {
    pub fn action_hold(&self) -> Duration {
        Duration::from_millis(self.action_hold_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.action_hold_ms == 0 {
            return Err(Error::Configuration("action_hold_ms must be positive".to_string()));
        }
        if self.target_label.trim().is_empty() {
            return Err(Error::Configuration("target_label cannot be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::Configuration(format!(
                "confidence_threshold {} must be a fraction between 0 and 1",
                self.confidence_threshold
            )));
        }
        Ok(())
    }
}
