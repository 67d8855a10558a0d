//! Time sources for the controller

use parking_lot::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Monotonic and wall time, injectable so hold timing can be simulated
pub trait Clock: Send + Sync {
    /// Monotonic instant used for action timing
    fn now(&self) -> Instant;

    /// Seconds since the Unix epoch, used for synthetic telemetry
    fn unix_time(&self) -> f64;
}

/// Reads the real clocks
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_time(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    unix_origin: f64,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::at_unix_time(0.0)
    }

    pub fn at_unix_time(unix_origin: f64) -> Self {
        Self {
            origin: Instant::now(),
            unix_origin,
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock() += by;
    }

    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock()
    }

    fn unix_time(&self) -> f64 {
        self.unix_origin + self.elapsed.lock().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances_both_views() {
        let clock = ManualClock::at_unix_time(100.0);
        let start = clock.now();
        clock.advance(Duration::from_millis(3100));
        assert_eq!(clock.now() - start, Duration::from_millis(3100));
        assert!((clock.unix_time() - 103.1).abs() < 1e-9);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
        assert!(clock.unix_time() > 0.0);
    }
}
