pub mod types;
pub mod error;
pub mod state;
pub mod clock;
pub mod controller;
pub mod telemetry;
pub mod labels;
pub mod config;

pub use error::{Error, Result};
pub use types::{BoundingBox, Command, Detection, Statistics, filter_by_confidence};
pub use state::{RobotState, TickInput, Transition};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{OperationalController, StatusSnapshot, ACTIONS_TRIGGERED};
pub use telemetry::{BatteryReading, PowerTelemetry, SolarReading};
pub use labels::LabelMap;
pub use config::ControllerConfig;
