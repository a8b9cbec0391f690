//! Wall-clock abstraction.
//!
//! Cart stamping, challenge expiry and undo capture read time through
//! [`Clock`] so tests can drive it deterministically.

use chrono::{DateTime, Duration, Local, NaiveTime, Timelike};
use std::sync::{Arc, Mutex};

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    /// Current local time of day truncated to whole seconds.
    fn time_of_day(&self) -> NaiveTime {
        let time = self.now().time();
        time.with_nanosecond(0).unwrap_or(time)
    }
}

/// Shared clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// System wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Manually advanced clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut current) = self.current.lock() {
            *current += by;
        }
    }

    pub fn set(&self, to: DateTime<Local>) {
        if let Ok(mut current) = self.current.lock() {
            *current = to;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        self.current
            .lock()
            .map(|current| *current)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, ManualClock};
    use chrono::{Duration, Local, NaiveTime, TimeZone};

    #[test]
    fn manual_clock_advances_and_truncates_time_of_day() {
        let start = Local
            .with_ymd_and_hms(2025, 3, 2, 9, 15, 0)
            .single()
            .expect("unambiguous local time");
        let clock = ManualClock::new(start);
        clock.advance(Duration::milliseconds(61_500));
        assert_eq!(
            clock.time_of_day(),
            NaiveTime::from_hms_opt(9, 16, 1).expect("valid time")
        );
    }
}
