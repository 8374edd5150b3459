use crate::environment::Clock;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::{Mutex, PoisonError};

/// 2025-01-01T00:00:00Z
const DEFAULT_EPOCH_SECS: i64 = 1_735_689_600;

/// Clock that returns a fixed instant until told otherwise.
///
/// # Example
///
/// ```
/// use pasajes_core::environment::Clock;
/// use pasajes_core::mocks::FixedClock;
/// use chrono::TimeDelta;
///
/// let clock = FixedClock::default();
/// let start = clock.now();
/// clock.advance(TimeDelta::days(2));
/// assert_eq!(clock.now() - start, TimeDelta::days(2));
/// ```
#[derive(Debug)]
pub struct FixedClock {
    time: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Create a clock stopped at `time`.
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: Mutex::new(time),
        }
    }

    /// Move the clock to `time`.
    pub fn set(&self, time: DateTime<Utc>) {
        *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
        let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
        *time += delta;
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::new(DateTime::from_timestamp(DEFAULT_EPOCH_SECS, 0).unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
