//! Mock implementations for testing.

use crate::Clock;
use std::{
    sync::{Arc, Mutex},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// A [Clock] that only moves when told to.
///
/// Clones share the same underlying time, so a test can keep one handle while the component
/// under test owns another.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<Mutex<SystemTime>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(UNIX_EPOCH + Duration::from_secs(1_000))
    }
}

impl ManualClock {
    /// Create a new clock starting at `start`.
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += duration;
    }

    /// Set the clock to an arbitrary time (may move backwards).
    pub fn set(&self, time: SystemTime) {
        *self.now.lock().unwrap() = time;
    }
}

impl Clock for ManualClock {
    fn current(&self) -> SystemTime {
        *self.now.lock().unwrap()
    }
}
