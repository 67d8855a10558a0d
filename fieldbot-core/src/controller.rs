//! Operational controller shared by every streaming session

use metrics::counter;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::config::ControllerConfig;
use crate::state::{RobotState, TickInput};
use crate::telemetry::PowerTelemetry;
use crate::types::{Detection, Statistics};

/// Counter bumped on every transition into ACTION_TRIGGERED
pub const ACTIONS_TRIGGERED: &str = "fieldbot_actions_triggered_total";

/// Point-in-time view of the controller, rebuilt on every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub state: RobotState,
    pub stats: Statistics,
    pub power: PowerTelemetry,
    /// Integer percentage, 0-100
    pub confidence_threshold: u8,
}

#[derive(Debug)]
struct ControllerState {
    state: RobotState,
    active: bool,
    stats: Statistics,
    last_action: Option<Instant>,
    threshold: f64,
}

/// Owns robot state, the activity flag, statistics, the action timer and the
/// confidence threshold. Each method is one critical section.
pub struct OperationalController {
    clock: Arc<dyn Clock>,
    hold: Duration,
    target_label: String,
    inner: Mutex<ControllerState>,
}

impl OperationalController {
    pub fn new(config: &ControllerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &ControllerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            hold: config.action_hold(),
            target_label: config.target_label.clone(),
            inner: Mutex::new(ControllerState {
                state: RobotState::Idle,
                active: false,
                stats: Statistics::default(),
                last_action: None,
                threshold: config.confidence_threshold.clamp(0.0, 1.0),
            }),
        }
    }

    /// Enable detection and enter RUNNING
    pub fn start(&self) {
        let mut inner = self.inner.lock();
        inner.active = true;
        inner.state = RobotState::Running;
        info!("Robot started");
    }

    /// Disable detection and enter STOPPED
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        inner.active = false;
        inner.state = RobotState::Stopped;
        info!("Robot stopped");
    }

    /// Feed one tick of filtered detections. Does nothing while inactive.
    pub fn update(&self, detections: &[Detection]) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        if !inner.active {
            return;
        }

        inner.stats.total_detections += detections.len() as u64;
        for d in detections {
            if d.class_label == self.target_label {
                inner.stats.weeds_found += 1;
            } else {
                inner.stats.other_objects += 1;
            }
        }

        let transition = inner.state.next(&TickInput {
            detections,
            target_label: &self.target_label,
            active: inner.active,
            since_last_action: inner.last_action.map(|t| now.saturating_duration_since(t)),
            hold: self.hold,
        });

        if transition.trigger_action {
            inner.last_action = Some(now);
            counter!(ACTIONS_TRIGGERED).increment(1);
            info!("Action triggered on {}", self.target_label);
        }
        if transition.next != inner.state {
            debug!("Robot state {} -> {}", inner.state, transition.next);
            inner.state = transition.next;
        }
    }

    /// Set the confidence threshold from a 0-100 percentage
    pub fn set_threshold_percent(&self, percent: f64) {
        let fraction = (percent / 100.0).clamp(0.0, 1.0);
        self.inner.lock().threshold = fraction;
        info!("Confidence threshold set to {:.0}%", fraction * 100.0);
    }

    /// Threshold as a fraction in [0, 1]
    pub fn threshold(&self) -> f64 {
        self.inner.lock().threshold
    }

    pub fn threshold_percent(&self) -> u8 {
        (self.threshold() * 100.0).round() as u8
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().active
    }

    pub fn state(&self) -> RobotState {
        self.inner.lock().state
    }

    pub fn stats(&self) -> Statistics {
        self.inner.lock().stats
    }

    pub fn last_action(&self) -> Option<Instant> {
        self.inner.lock().last_action
    }

    pub fn hold_duration(&self) -> Duration {
        self.hold
    }

    pub fn target_label(&self) -> &str {
        &self.target_label
    }

    pub fn get_status(&self) -> StatusSnapshot {
        let (state, stats, threshold) = {
            let inner = self.inner.lock();
            (inner.state, inner.stats, inner.threshold)
        };
        StatusSnapshot {
            state,
            stats,
            power: PowerTelemetry::synthesize(self.clock.unix_time()),
            confidence_threshold: (threshold * 100.0).round() as u8,
        }
    }
}
