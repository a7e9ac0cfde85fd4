use ella_utils::NZU64;
use std::{num::NonZeroU64, time::Duration};

/// Number of indices fetched per request unless configured otherwise.
pub const DEFAULT_WINDOW_SIZE: NonZeroU64 = NZU64!(10);

/// How long a slot's content is considered fresh unless configured otherwise (10 hours).
pub const DEFAULT_TTL: Duration = Duration::from_millis(36_000_000);

/// Configuration for a [crate::Cache].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// The number of indices fetched together in a single request.
    pub window_size: NonZeroU64,

    /// The time-to-live inherited by newly created slots.
    pub ttl: Duration,

    /// Whether accessing an index triggers fetching its window.
    ///
    /// When disabled, access only returns cached state.
    pub streaming: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            ttl: DEFAULT_TTL,
            streaming: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.window_size.get(), 10);
        assert_eq!(cfg.ttl.as_millis(), 36_000_000);
        assert!(cfg.streaming);
    }
}
