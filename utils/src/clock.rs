use std::time::SystemTime;

/// Interface that any time-aware component can rely on to learn the current time.
///
/// Components take a [Clock] instead of calling [SystemTime::now] directly so that tests can
/// drive time deterministically (see [crate::mocks::ManualClock]).
pub trait Clock: Clone + Send + Sync + 'static {
    /// Returns the current time.
    fn current(&self) -> SystemTime;
}

/// A [Clock] backed by the operating system's wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn current(&self) -> SystemTime {
        SystemTime::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock;
        let first = clock.current();
        let second = clock.current();
        assert!(second >= first);
    }
}
