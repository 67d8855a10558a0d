//! Synthetic power telemetry
//!
//! There is no power sensor on the demo rig; readings are a deterministic
//! function of wall time so dashboards have something that moves.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolarReading {
    pub v: f64,
    pub a: f64,
    pub w: f64,
    pub charging: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryReading {
    pub percentage: f64,
    pub v: f64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerTelemetry {
    pub solar: SolarReading,
    pub battery: BatteryReading,
}

const BATTERY_VOLTS: f64 = 12.4;
const LOW_BATTERY_PCT: f64 = 20.0;

impl PowerTelemetry {
    /// Readings at `unix_time` seconds
    pub fn synthesize(unix_time: f64) -> Self {
        let solar_v = 18.5 + (unix_time % 10.0) * 0.1;
        let solar_a = 2.1 + (unix_time % 5.0) * 0.05;
        // one percent every ten minutes, wrapping hourly
        let battery_pct = 85.0 - (unix_time % 3600.0) / 600.0;

        Self {
            solar: SolarReading {
                v: round_to(solar_v, 2),
                a: round_to(solar_a, 2),
                w: round_to(solar_v * solar_a, 2),
                charging: solar_a > 0.5,
            },
            battery: BatteryReading {
                percentage: round_to(battery_pct, 1),
                v: BATTERY_VOLTS,
                status: if battery_pct > LOW_BATTERY_PCT { "GOOD" } else { "LOW" }.to_string(),
            },
        }
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
