use ella_utils::SystemTimeExt;
use std::time::{Duration, SystemTime};

/// The cache entry for a single index.
///
/// A slot is created (without content) the first time its index is accessed and lives as long
/// as the [crate::Cache] that owns it.
#[derive(Clone, Debug)]
pub struct Slot<V> {
    content: Option<V>,

    /// When content was last delivered.
    updated_at: Option<SystemTime>,

    /// The expiry marker in effect when content was last delivered.
    epoch: Option<u64>,

    time_to_live: Duration,
    loading: bool,
}

impl<V> Slot<V> {
    pub(crate) fn new(time_to_live: Duration) -> Self {
        Self {
            content: None,
            updated_at: None,
            epoch: None,
            time_to_live,
            loading: false,
        }
    }

    /// Returns the cached record, if any.
    pub fn content(&self) -> Option<&V> {
        self.content.as_ref()
    }

    /// Returns when content was last delivered to this slot.
    ///
    /// Clearing content (see [crate::Cache::unset]) does not reset this value.
    pub fn updated_at(&self) -> Option<SystemTime> {
        self.updated_at
    }

    pub fn time_to_live(&self) -> Duration {
        self.time_to_live
    }

    /// Override the time-to-live inherited from the cache.
    pub fn set_time_to_live(&mut self, time_to_live: Duration) {
        self.time_to_live = time_to_live;
    }

    /// Returns whether a fetch covering this slot is outstanding.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Returns whether the slot has no content or its content outlived its time-to-live.
    pub fn is_stale(&self, now: SystemTime) -> bool {
        match (&self.content, self.updated_at) {
            (Some(_), Some(updated_at)) => now.elapsed_since(updated_at) > self.time_to_live,
            _ => true,
        }
    }

    /// Returns whether the slot was last delivered before the expiry `marker` advanced past it
    /// (or never delivered at all).
    ///
    /// A slot that is loading is never expired.
    pub fn is_expired_at(&self, marker: u64) -> bool {
        if self.loading {
            return false;
        }
        match self.epoch {
            Some(epoch) => epoch < marker,
            None => true,
        }
    }

    /// Returns whether the slot can be served without fetching.
    pub fn is_fresh(&self, now: SystemTime, marker: u64) -> bool {
        !self.is_stale(now) && !self.is_expired_at(marker)
    }

    pub(crate) fn deliver(&mut self, content: V, now: SystemTime, epoch: u64) {
        self.content = Some(content);
        self.updated_at = Some(now);
        self.epoch = Some(epoch);
        self.loading = false;
    }

    /// Clears content, returning whether there was any.
    pub(crate) fn invalidate(&mut self) -> bool {
        self.content.take().is_some()
    }

    pub(crate) fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    const TTL: Duration = Duration::from_millis(50);

    fn now() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_000)
    }

    #[test]
    fn test_new_slot_is_stale_and_expired() {
        let slot: Slot<u32> = Slot::new(TTL);
        assert!(slot.content().is_none());
        assert!(slot.updated_at().is_none());
        assert!(!slot.is_loading());
        assert!(slot.is_stale(now()));
        assert!(slot.is_expired_at(0));
        assert!(!slot.is_fresh(now(), 0));
    }

    #[test]
    fn test_staleness_follows_time_to_live() {
        let mut slot = Slot::new(TTL);
        slot.deliver(7u32, now(), 0);
        assert_eq!(slot.content(), Some(&7));
        assert!(!slot.is_stale(now()));
        assert!(!slot.is_stale(now() + TTL));
        assert!(slot.is_stale(now() + TTL + Duration::from_millis(1)));

        // Shrinking the time-to-live makes existing content stale
        slot.set_time_to_live(Duration::from_millis(10));
        assert_eq!(slot.time_to_live(), Duration::from_millis(10));
        assert!(slot.is_stale(now() + Duration::from_millis(20)));

        // A clock that stepped backwards does not make content stale
        assert!(!slot.is_stale(now() - Duration::from_secs(1)));
    }

    #[test]
    fn test_loading_slot_is_never_expired() {
        let mut slot: Slot<u32> = Slot::new(TTL);
        slot.set_loading(true);
        assert!(!slot.is_expired_at(0));
        assert!(!slot.is_expired_at(u64::MAX));

        slot.deliver(1, now(), 3);
        assert!(!slot.is_loading());
        assert!(!slot.is_expired_at(3));
        assert!(slot.is_expired_at(4));
    }

    #[test]
    fn test_invalidate_keeps_update_time() {
        let mut slot = Slot::new(TTL);
        slot.deliver("record", now(), 0);
        assert!(slot.invalidate());
        assert!(!slot.invalidate());
        assert!(slot.content().is_none());
        assert_eq!(slot.updated_at(), Some(now()));
        assert!(slot.is_stale(now()));

        // Expiry is still judged by the last delivery
        assert!(!slot.is_expired_at(0));
        assert!(slot.is_expired_at(1));
    }
}
