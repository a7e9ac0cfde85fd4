use std::time::{Duration, SystemTime};

/// Extension trait to add methods to `std::time::SystemTime`
pub trait SystemTimeExt {
    /// Returns the time elapsed since `earlier`, or zero if `earlier` is in the future.
    ///
    /// Wall clocks may step backwards, so callers comparing stored timestamps against
    /// [SystemTime::now] should prefer this over [SystemTime::duration_since].
    fn elapsed_since(&self, earlier: SystemTime) -> Duration;
}

impl SystemTimeExt for SystemTime {
    fn elapsed_since(&self, earlier: SystemTime) -> Duration {
        self.duration_since(earlier).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    #[test]
    fn test_elapsed_since() {
        let earlier = UNIX_EPOCH + Duration::from_secs(10);
        let later = earlier + Duration::from_millis(250);
        assert_eq!(later.elapsed_since(earlier), Duration::from_millis(250));

        // Clock stepped backwards
        assert_eq!(earlier.elapsed_since(later), Duration::ZERO);
    }
}
