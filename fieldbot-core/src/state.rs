//! Robot state machine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::types::Detection;

/// Operational state of the robot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RobotState {
    #[default]
    Idle,
    Running,
    Stopped,
    Detecting,
    ActionTriggered,
}

impl RobotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RobotState::Idle => "IDLE",
            RobotState::Running => "RUNNING",
            RobotState::Stopped => "STOPPED",
            RobotState::Detecting => "DETECTING",
            RobotState::ActionTriggered => "ACTION_TRIGGERED",
        }
    }

    /// Compute the next state for one tick.
    ///
    /// While holding `ActionTriggered` the detections of the tick are ignored:
    /// the state only relaxes to `Running` once strictly more than `hold` has
    /// elapsed since the last trigger. Otherwise a target detection triggers an
    /// action, any other detection means `Detecting`, and nothing means `Running`.
    pub fn next(self, input: &TickInput<'_>) -> Transition {
        if !input.active {
            return Transition::stay(self);
        }

        if self == RobotState::ActionTriggered {
            let expired = match input.since_last_action {
                Some(elapsed) => elapsed > input.hold,
                None => true,
            };
            return if expired {
                Transition::stay(RobotState::Running)
            } else {
                Transition::stay(self)
            };
        }

        let has_target = input
            .detections
            .iter()
            .any(|d| d.class_label == input.target_label);

        if has_target {
            Transition {
                next: RobotState::ActionTriggered,
                trigger_action: true,
            }
        } else if !input.detections.is_empty() {
            Transition::stay(RobotState::Detecting)
        } else {
            Transition::stay(RobotState::Running)
        }
    }
}

impl fmt::Display for RobotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a transition may depend on
#[derive(Debug, Clone, Copy)]
pub struct TickInput<'a> {
    pub detections: &'a [Detection],
    pub target_label: &'a str,
    pub active: bool,
    pub since_last_action: Option<Duration>,
    pub hold: Duration,
}

/// Result of [`RobotState::next`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: RobotState,
    /// The action fired on this tick and the hold timer must restart
    pub trigger_action: bool,
}

impl Transition {
    fn stay(next: RobotState) -> Self {
        Self {
            next,
            trigger_action: false,
        }
    }
}
